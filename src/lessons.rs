//! Cross-run lessons: carry the review's forward-looking notes into the
//! series lessons log.
//!
//! The log at `<project_root>/series/<series>/lessons.md` feeds the next
//! run's shared baseline, so each article benefits from the review history
//! of the ones before it. Only the "next article" portion of the review is
//! carried, and items the negotiation already resolved are dropped. No
//! generation happens here. Standalone articles (no series) skip this step.

use crate::errors::PipelineError;
use crate::passes::{PassCtx, PassOutcome};
use crate::review::{self, FORWARD_HEADING};
use crate::store::keys;
use std::io::Write;
use std::path::Path;
use tracing::info;

// Same match width as the orphan lint.
const RESOLVED_MATCH_CHARS: usize = 30;

/// Forward-looking review items not already settled in the consensus
/// document.
fn forward_lessons(review: &str, consensus: &str) -> Vec<String> {
    let Some(forward) = review::section(review, FORWARD_HEADING) else {
        return Vec::new();
    };
    let consensus = review::normalize(consensus);
    forward
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let needle: String = review::normalize(line)
                .chars()
                .filter(|c| *c != '-' && *c != '*')
                .collect::<String>()
                .trim()
                .chars()
                .take(RESOLVED_MATCH_CHARS)
                .collect();
            needle.is_empty() || !consensus.contains(&needle)
        })
        .map(str::to_string)
        .collect()
}

pub fn stamp(ctx: &PassCtx<'_>, series: Option<&str>) -> Result<PassOutcome, PipelineError> {
    let mut outcome = PassOutcome::clean();
    let Some(series) = series else {
        return Ok(PassOutcome::skipped());
    };

    let review = ctx.store.read_or(keys::REVIEW_REPORT, "");
    let consensus = ctx.store.read_or(keys::CONSENSUS_DOC, "");
    let lessons = forward_lessons(&review, &consensus);
    if lessons.is_empty() {
        outcome.note("review carried no forward-looking notes; lessons not stamped");
        return Ok(outcome);
    }

    let topic = ctx
        .store
        .root()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "article".to_string());
    append_entry(&ctx.config.project_root, series, &topic, &lessons.join("\n"))
        .map_err(PipelineError::Other)?;

    info!(series, count = lessons.len(), "lessons stamped");
    Ok(outcome)
}

fn append_entry(
    project_root: &Path,
    series: &str,
    topic: &str,
    lessons: &str,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let dir = project_root.join("series").join(series);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create series directory: {}", dir.display()))?;
    let path = dir.join("lessons.md");

    let date = chrono::Local::now().format("%Y-%m-%d");
    let entry = format!("\n## {} — {}\n\n{}\n", date, topic, lessons);

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open lessons log: {}", path.display()))?
        .write_all(entry.as_bytes())
        .with_context(|| format!("Failed to append to lessons log: {}", path.display()))?;
    Ok(())
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
    use tempfile::tempdir;

    struct NeverGenerator;

    #[async_trait]
    impl Generator for NeverGenerator {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, ClientError> {
            panic!("lessons must not generate");
        }
    }

    const REVIEW: &str = "\
1. 🔍 Date wrong.

### Fixes required (this article)
- fix the date

### Notes for the next article
- Open with the anecdote, not the definition.
- Keep the cost table to one currency.
";

    fn fixture(dir: &std::path::Path) -> (ArtifactStore, ContextAssembler, QuillConfig) {
        let topic = dir.join("robot-dogs");
        std::fs::create_dir_all(&topic).unwrap();
        let store = ArtifactStore::new(&topic);
        store.write(keys::REVIEW_REPORT, REVIEW).unwrap();
        (
            store,
            ContextAssembler::new(dir, &topic, "alice", Some("robots".into())),
            QuillConfig::load(dir, CliOverrides::default()).unwrap(),
        )
    }

    #[test]
    fn test_forward_lessons_drop_resolved_items() {
        let consensus = "- resolved: keep the cost table to one currency going forward";
        let lessons = forward_lessons(REVIEW, consensus);
        assert_eq!(lessons.len(), 1);
        assert!(lessons[0].contains("anecdote"));

        let untouched = forward_lessons(REVIEW, "");
        assert_eq!(untouched.len(), 2);
    }

    #[test]
    fn test_forward_lessons_need_the_section() {
        assert!(forward_lessons("1. 🔍 Date wrong.", "").is_empty());
        assert!(forward_lessons("", "").is_empty());
    }

    #[tokio::test]
    async fn test_lessons_appended_with_topic_header() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        let generator = NeverGenerator;
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = stamp(&ctx, Some("robots")).unwrap();
        assert!(outcome.degraded.is_empty());

        let log = std::fs::read_to_string(dir.path().join("series/robots/lessons.md")).unwrap();
        assert!(log.contains("robot-dogs"));
        assert!(log.contains("anecdote"));
        assert!(log.contains("cost table"));
        assert!(!log.contains("fix the date"));

        // A second run appends rather than replacing
        stamp(&ctx, Some("robots")).unwrap();
        let log2 = std::fs::read_to_string(dir.path().join("series/robots/lessons.md")).unwrap();
        assert_eq!(log2.matches("anecdote").count(), 2);
    }

    #[tokio::test]
    async fn test_no_series_skips() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        let generator = NeverGenerator;
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = stamp(&ctx, None).unwrap();
        assert!(outcome.skipped);
        assert!(!dir.path().join("series").exists());
    }

    #[tokio::test]
    async fn test_missing_forward_notes_degrade() {
        let dir = tempdir().unwrap();
        let (store, assembler, config) = fixture(dir.path());
        store.write(keys::REVIEW_REPORT, "1. 🔍 Date wrong.").unwrap();
        let generator = NeverGenerator;
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: &generator,
            config: &config,
        };

        let outcome = stamp(&ctx, Some("robots")).unwrap();
        assert_eq!(outcome.degraded.len(), 1);
        assert!(!dir.path().join("series/robots/lessons.md").exists());
    }
}
