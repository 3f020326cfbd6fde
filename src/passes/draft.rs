//! Pass 1: write the full first draft.
//!
//! The only pass that can fail the run: without a draft nothing downstream
//! has anything to work on.

use crate::config::PassId;
use crate::errors::PipelineError;
use crate::passes::{PassCtx, PassOutcome};
use crate::prompts;
use crate::store::keys;
use tracing::info;

pub async fn run(ctx: &PassCtx<'_>) -> Result<PassOutcome, PipelineError> {
    let stage_ctx = ctx.assembler.assemble_draft();
    let prompt = prompts::DRAFT.fill(&stage_ctx)?;
    let request = ctx.request(PassId::Draft, prompt);

    let output = ctx
        .generator
        .generate(&request)
        .await
        .map_err(|e| PipelineError::Other(e.into()))?;

    if output.trim().is_empty() {
        return Err(PipelineError::DraftFailed);
    }

    ctx.store.write(keys::ARTICLE_DRAFT, output.trim())?;
    info!(chars = output.trim().chars().count(), "draft written");
    Ok(PassOutcome::clean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GenerationRequest;
    use crate::config::{CliOverrides, QuillConfig};
    use crate::context::ContextAssembler;
    use crate::errors::ClientError;
    use crate::store::ArtifactStore;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FixedGenerator(String);

    #[async_trait]
    impl crate::client::Generator for FixedGenerator {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, ClientError> {
            Ok(self.0.clone())
        }
    }

    fn fixture(dir: &std::path::Path) -> (ArtifactStore, ContextAssembler, QuillConfig) {
        let topic = dir.join("topic");
        std::fs::create_dir_all(&topic).unwrap();
        (
            ArtifactStore::new(&topic),
            ContextAssembler::new(dir, &topic, "alice", None),
            QuillConfig::load(dir, CliOverrides::default()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_draft_written_on_success() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        let generator = FixedGenerator("A fine draft.".into());
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = run(&ctx).await.unwrap();
        assert!(outcome.degraded.is_empty());
        assert_eq!(store.read(keys::ARTICLE_DRAFT).as_deref(), Some("A fine draft."));
    }

    #[tokio::test]
    async fn test_empty_draft_is_fatal() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        let generator = FixedGenerator("   \n".into());
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        assert!(matches!(run(&ctx).await.unwrap_err(), PipelineError::DraftFailed));
        assert!(!store.exists(keys::ARTICLE_DRAFT));
    }
}
