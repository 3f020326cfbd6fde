//! Pass 5: the weakness-driven iterate loop.
//!
//! Each round scans the current version for weak sections, researches fixes,
//! rewrites into the next `article_v{n}`, and compares the two versions. The
//! loop stops on an ALL_STRONG scan verdict, a CONVERGED comparison verdict,
//! a degraded sub-step, or the round cap. Earlier versions are never
//! overwritten; every comparison appends to a cumulative log.

use crate::client::generate_lenient;
use crate::config::PassId;
use crate::errors::PipelineError;
use crate::parser;
use crate::passes::{PassCtx, PassOutcome};
use crate::prompts::{self, markers, sections};
use crate::store::{keys, research_key, version_key, weakness_key};
use tracing::{info, warn};

const RESEARCH_TOOLS: &str = "WebSearch,WebFetch,Read";

/// Final line of a comparison, interpreted leniently.
fn comparison_converged(comparison: &str) -> bool {
    // NOT_CONVERGED contains CONVERGED as a substring, so check it first.
    if comparison.contains(markers::NOT_CONVERGED) {
        return false;
    }
    comparison.contains(markers::CONVERGED)
}

pub async fn run(ctx: &PassCtx<'_>) -> Result<PassOutcome, PipelineError> {
    let mut outcome = PassOutcome::clean();

    let input = ctx
        .store
        .read(keys::ARTICLE_REVIEWED)
        .or_else(|| ctx.store.read(keys::ARTICLE_FACTCHECKED))
        .or_else(|| ctx.store.read(keys::ARTICLE))
        .or_else(|| ctx.store.read(keys::ARTICLE_DRAFT))
        .unwrap_or_default();

    // Seed v1 from the loop input; resumed runs keep their existing chain.
    let mut version = match ctx.store.latest_article_version() {
        Some(v) => v,
        None => {
            ctx.store.write(&version_key(1), &input)?;
            1
        }
    };

    for round in 1..=ctx.config.iteration.max_rounds {
        let current = ctx.store.read_or(&version_key(version), &input);
        info!(round, version, "iterate round");

        let stage_ctx = ctx.assembler.assemble_iterate_weakness(&current);
        let prompt = prompts::ITERATE_WEAKNESS.fill(&stage_ctx)?;
        let request = ctx.request(PassId::Iterate, prompt);
        let weakness = generate_lenient(ctx.generator, &request, "iterate/weakness").await;
        if weakness.trim().is_empty() {
            outcome.note(format!("iterate round {} weakness scan produced no output", round));
            break;
        }
        if weakness.contains(markers::ALL_STRONG) {
            info!(round, "weakness scan found nothing to improve");
            break;
        }
        ctx.store.write(&weakness_key(version), weakness.trim())?;

        let stage_ctx = ctx.assembler.assemble_iterate_research(&current, &weakness);
        let prompt = prompts::ITERATE_RESEARCH.fill(&stage_ctx)?;
        let request = ctx.request_with_tools(PassId::Iterate, RESEARCH_TOOLS, prompt);
        let research = generate_lenient(ctx.generator, &request, "iterate/research").await;
        if !research.trim().is_empty() {
            ctx.store.write(&research_key(version), research.trim())?;
        }

        let stage_ctx = ctx
            .assembler
            .assemble_iterate_rewrite(&current, &weakness, &research);
        let prompt = prompts::ITERATE_REWRITE.fill(&stage_ctx)?;
        let request = ctx.request(PassId::Iterate, prompt);
        let output = generate_lenient(ctx.generator, &request, "iterate/rewrite").await;
        let parsed = parser::parse(&output, &[sections::ARTICLE]);
        let rewritten = parsed.get_or_empty(sections::ARTICLE);
        if rewritten.is_empty() {
            outcome.note(format!("iterate round {} rewrite produced no article", round));
            break;
        }

        let next = version + 1;
        ctx.store.write(&version_key(next), rewritten)?;

        let stage_ctx = ctx.assembler.assemble_iterate_compare(&current, rewritten);
        let prompt = prompts::ITERATE_COMPARE.fill(&stage_ctx)?;
        let request = ctx.request(PassId::Iterate, prompt);
        let comparison = generate_lenient(ctx.generator, &request, "iterate/compare").await;
        ctx.store.append(
            keys::ITERATION_COMPARISON,
            &format!("\n## v{} vs v{}\n\n{}\n", version, next, comparison.trim()),
        )?;

        version = next;

        if comparison.trim().is_empty() {
            warn!(round, "comparison produced no verdict, stopping the loop");
            outcome.note(format!("iterate round {} comparison produced no verdict", round));
            break;
        }
        if comparison_converged(&comparison) {
            info!(round, version, "versions converged");
            break;
        }
    }

    let latest = ctx.store.read_or(&version_key(version), &input);
    ctx.store.write(keys::ARTICLE_ITERATED, &latest)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{GenerationRequest, Generator};
    use crate::config::{CliOverrides, QuillConfig};
    use crate::context::ContextAssembler;
    use crate::errors::ClientError;
    use crate::store::ArtifactStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct ScriptedGenerator(Mutex<VecDeque<String>>);

    impl ScriptedGenerator {
        fn new(responses: &[&str]) -> Self {
            Self(Mutex::new(responses.iter().map(|s| s.to_string()).collect()))
        }

        fn remaining(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, ClientError> {
            Ok(self.0.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn fixture(dir: &std::path::Path) -> (ArtifactStore, ContextAssembler, QuillConfig) {
        let topic = dir.join("topic");
        std::fs::create_dir_all(&topic).unwrap();
        let store = ArtifactStore::new(&topic);
        store.write(keys::ARTICLE_REVIEWED, "reviewed article").unwrap();
        (
            store,
            ContextAssembler::new(dir, &topic, "alice", None),
            QuillConfig::load(dir, CliOverrides::default()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_converged_round_one_stops_at_v2() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        let generator = ScriptedGenerator::new(&[
            "section two is thin",
            "found a better example",
            "===ARTICLE===\nstronger article",
            "little substantive change.\nCONVERGED",
        ]);
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = run(&ctx).await.unwrap();
        assert!(outcome.degraded.is_empty());
        assert_eq!(generator.remaining(), 0);
        assert_eq!(store.read(&version_key(1)).as_deref(), Some("reviewed article"));
        assert_eq!(store.read(&version_key(2)).as_deref(), Some("stronger article"));
        assert!(!store.exists(&version_key(3)));
        assert_eq!(store.read(keys::ARTICLE_ITERATED).as_deref(), Some("stronger article"));
        assert!(store.read(keys::ITERATION_COMPARISON).unwrap().contains("## v1 vs v2"));
    }

    #[tokio::test]
    async fn test_all_strong_short_circuits_before_rewrite() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        let generator = ScriptedGenerator::new(&["VERDICT: ALL_STRONG"]);
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = run(&ctx).await.unwrap();
        assert!(outcome.degraded.is_empty());
        assert!(!store.exists(&version_key(2)));
        assert_eq!(store.read(keys::ARTICLE_ITERATED).as_deref(), Some("reviewed article"));
    }

    #[tokio::test]
    async fn test_not_converged_runs_to_round_cap() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        assert_eq!(config.iteration.max_rounds, 2);
        let generator = ScriptedGenerator::new(&[
            "weak spot a",
            "research a",
            "===ARTICLE===\nv2 text",
            "real improvements.\nNOT_CONVERGED",
            "weak spot b",
            "research b",
            "===ARTICLE===\nv3 text",
            "still moving.\nNOT_CONVERGED",
        ]);
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = run(&ctx).await.unwrap();
        assert!(outcome.degraded.is_empty());
        // Round cap, not a third rewrite
        assert_eq!(generator.remaining(), 0);
        assert_eq!(store.read(&version_key(3)).as_deref(), Some("v3 text"));
        assert!(!store.exists(&version_key(4)));
        assert_eq!(store.read(keys::ARTICLE_ITERATED).as_deref(), Some("v3 text"));
        let log = store.read(keys::ITERATION_COMPARISON).unwrap();
        assert!(log.contains("## v1 vs v2"));
        assert!(log.contains("## v2 vs v3"));
    }

    #[tokio::test]
    async fn test_failed_rewrite_degrades_and_keeps_latest() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        let generator = ScriptedGenerator::new(&["weak spot", "research", ""]);
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = run(&ctx).await.unwrap();
        assert_eq!(outcome.degraded.len(), 1);
        assert!(!store.exists(&version_key(2)));
        assert_eq!(store.read(keys::ARTICLE_ITERATED).as_deref(), Some("reviewed article"));
    }

    #[tokio::test]
    async fn test_resume_continues_existing_version_chain() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        store.write(&version_key(1), "old v1").unwrap();
        store.write(&version_key(2), "old v2").unwrap();
        let generator = ScriptedGenerator::new(&[
            "weakness in v2",
            "research",
            "===ARTICLE===\nv3 from resume",
            "CONVERGED",
        ]);
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        run(&ctx).await.unwrap();
        // Chain continued from v2, earlier versions untouched
        assert_eq!(store.read(&version_key(1)).as_deref(), Some("old v1"));
        assert_eq!(store.read(&version_key(2)).as_deref(), Some("old v2"));
        assert_eq!(store.read(&version_key(3)).as_deref(), Some("v3 from resume"));
    }

    #[test]
    fn test_comparison_verdict_parsing() {
        assert!(comparison_converged("analysis...\nCONVERGED"));
        assert!(!comparison_converged("analysis...\nNOT_CONVERGED"));
        assert!(!comparison_converged("no verdict at all"));
    }
}
