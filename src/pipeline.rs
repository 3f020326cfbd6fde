//! The pipeline driver: runs the passes in order against one topic
//! directory and aggregates their outcomes.
//!
//! Pass order is 1 (draft), 2 (factcheck), 3 (critique), 3.5 (negotiate),
//! 5 (iterate), 4 (assemble), then the non-generative postprocess steps:
//! lessons stamping and the optional illustration hand-off. Resuming from a
//! later pass re-reads the checkpointed
//! artifacts instead of regenerating them; a resume start between 2 and 4
//! requires `article_draft`, and 5 accepts a final `article` as fallback.

use crate::client::Generator;
use crate::config::QuillConfig;
use crate::context::ContextAssembler;
use crate::errors::PipelineError;
use crate::illustrate::{self, IllustrationOutcome};
use crate::lessons;
use crate::passes::{self, PassCtx, PassOutcome};
use crate::store::{keys, ArtifactStore};
use std::path::PathBuf;
use tracing::{info, warn};

/// One run request.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub topic_dir: PathBuf,
    pub persona: String,
    pub series: Option<String>,
    pub start_pass: u8,
    /// Run the iterate loop between negotiation and final assembly.
    /// Implied when resuming directly at pass 5.
    pub iterate: bool,
}

/// How the run ended. A degraded run still produced a final article; the
/// report lists what needs human attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Complete,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub degraded: Vec<String>,
    pub skipped: Vec<String>,
    pub illustration: IllustrationOutcome,
}

pub struct Pipeline<'a> {
    config: &'a QuillConfig,
    generator: &'a dyn Generator,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a QuillConfig, generator: &'a dyn Generator) -> Self {
        Self { config, generator }
    }

    pub async fn run(&self, params: &RunParams) -> Result<RunReport, PipelineError> {
        let start = params.start_pass;
        if !(1..=5).contains(&start) {
            return Err(PipelineError::InvalidStartPass(start));
        }

        let store = ArtifactStore::new(&params.topic_dir);
        if start == 1 {
            std::fs::create_dir_all(&params.topic_dir)
                .map_err(|e| PipelineError::Other(e.into()))?;
        } else {
            if !params.topic_dir.is_dir() {
                return Err(PipelineError::TopicDirMissing(params.topic_dir.clone()));
            }
            self.check_resume_artifacts(&store, start)?;
        }

        let assembler = ContextAssembler::new(
            &self.config.project_root,
            &params.topic_dir,
            &params.persona,
            params.series.clone(),
        );
        let ctx = PassCtx {
            store: &store,
            assembler: &assembler,
            generator: self.generator,
            config: self.config,
        };

        let mut report = RunReport {
            outcome: RunOutcome::Complete,
            degraded: Vec::new(),
            skipped: Vec::new(),
            illustration: IllustrationOutcome::Skipped,
        };

        if start <= 1 {
            info!("pass 1: draft");
            merge(&mut report, "draft", passes::draft::run(&ctx).await?);
        }
        if start <= 2 {
            info!("pass 2: factcheck");
            merge(&mut report, "factcheck", passes::factcheck::run(&ctx).await?);
        }
        if start <= 3 {
            info!("pass 3: critique");
            merge(&mut report, "critique", passes::critique::run(&ctx).await?);
            info!("pass 3.5: negotiate");
            merge(&mut report, "negotiate", passes::negotiate::run(&ctx).await?);
        }
        if (start <= 3 && params.iterate) || start == 5 {
            info!("pass 5: iterate");
            merge(&mut report, "iterate", passes::iterate::run(&ctx).await?);
        }
        if start <= 4 {
            if !report.degraded.is_empty() {
                warn!(
                    stages = ?report.degraded,
                    "assembling from degraded inputs"
                );
            }
            info!("pass 4: assemble");
            merge(&mut report, "assemble", passes::assemble::run(&ctx).await?);
        }

        info!("postprocess");
        merge(
            &mut report,
            "lessons",
            lessons::stamp(&ctx, params.series.as_deref())?,
        );
        report.illustration =
            illustrate::generate_cover(&self.config.illustration, &params.topic_dir).await;

        if !report.degraded.is_empty() {
            report.outcome = RunOutcome::Degraded;
        }
        Ok(report)
    }

    fn check_resume_artifacts(
        &self,
        store: &ArtifactStore,
        start: u8,
    ) -> Result<(), PipelineError> {
        let missing = |artifact: &str| PipelineError::MissingResumeArtifact {
            start_pass: start,
            artifact: artifact.to_string(),
        };
        match start {
            2..=4 => {
                if !store.exists(keys::ARTICLE_DRAFT) {
                    return Err(missing(keys::ARTICLE_DRAFT));
                }
            }
            5 => {
                if !store.exists(keys::ARTICLE_DRAFT) && !store.exists(keys::ARTICLE) {
                    return Err(missing(keys::ARTICLE_DRAFT));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn merge(report: &mut RunReport, pass: &str, outcome: PassOutcome) {
    if outcome.skipped {
        report.skipped.push(pass.to_string());
    }
    for note in outcome.degraded {
        report.degraded.push(format!("{}: {}", pass, note));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GenerationRequest;
    use crate::config::{CliOverrides, QuillConfig};
    use crate::errors::ClientError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct ScriptedGenerator(Mutex<VecDeque<String>>);

    impl ScriptedGenerator {
        fn new(responses: &[&str]) -> Self {
            Self(Mutex::new(responses.iter().map(|s| s.to_string()).collect()))
        }
    }

    #[async_trait]
    impl crate::client::Generator for ScriptedGenerator {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, ClientError> {
            Ok(self.0.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn params(dir: &std::path::Path, start: u8) -> RunParams {
        RunParams {
            topic_dir: dir.join("topic"),
            persona: "alice".into(),
            series: None,
            start_pass: start,
            iterate: true,
        }
    }

    #[tokio::test]
    async fn test_invalid_start_pass_rejected() {
        let dir = tempdir().unwrap();
        let config = QuillConfig::load(dir.path(), CliOverrides::default()).unwrap();
        let generator = ScriptedGenerator::new(&[]);
        let pipeline = Pipeline::new(&config, &generator);

        for bad in [0u8, 6] {
            let err = pipeline.run(&params(dir.path(), bad)).await.unwrap_err();
            assert!(matches!(err, PipelineError::InvalidStartPass(p) if p == bad));
        }
    }

    #[tokio::test]
    async fn test_resume_missing_topic_dir_rejected() {
        let dir = tempdir().unwrap();
        let config = QuillConfig::load(dir.path(), CliOverrides::default()).unwrap();
        let generator = ScriptedGenerator::new(&[]);
        let pipeline = Pipeline::new(&config, &generator);

        let err = pipeline.run(&params(dir.path(), 3)).await.unwrap_err();
        assert!(matches!(err, PipelineError::TopicDirMissing(_)));
    }

    #[tokio::test]
    async fn test_resume_missing_draft_rejected() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("topic")).unwrap();
        let config = QuillConfig::load(dir.path(), CliOverrides::default()).unwrap();
        let generator = ScriptedGenerator::new(&[]);
        let pipeline = Pipeline::new(&config, &generator);

        let err = pipeline.run(&params(dir.path(), 3)).await.unwrap_err();
        match err {
            PipelineError::MissingResumeArtifact { start_pass, artifact } => {
                assert_eq!(start_pass, 3);
                assert_eq!(artifact, "article_draft");
            }
            other => panic!("Expected MissingResumeArtifact, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resume_from_five_accepts_final_article() {
        let dir = tempdir().unwrap();
        let topic = dir.path().join("topic");
        std::fs::create_dir_all(&topic).unwrap();
        let store = ArtifactStore::new(&topic);
        store.write(keys::ARTICLE, "published once already").unwrap();

        let config = QuillConfig::load(dir.path(), CliOverrides::default()).unwrap();
        // iterate only: the weakness probe reports nothing to fix
        let generator = ScriptedGenerator::new(&["VERDICT: ALL_STRONG"]);
        let pipeline = Pipeline::new(&config, &generator);

        let report = pipeline.run(&params(dir.path(), 5)).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Complete);
        // Pass 4 did not run; article untouched
        assert_eq!(store.read(keys::ARTICLE).as_deref(), Some("published once already"));
        assert_eq!(
            store.read(keys::ARTICLE_ITERATED).as_deref(),
            Some("published once already")
        );
    }

    #[tokio::test]
    async fn test_iterate_flag_off_skips_the_loop() {
        let dir = tempdir().unwrap();
        let config = QuillConfig::load(dir.path(), CliOverrides::default()).unwrap();
        let generator = ScriptedGenerator::new(&[
            "the draft",
            "===FACTCHECK_REPORT===\nok\n===CORRECTED_ARTICLE===\nchecked",
            "no marked findings",
            "===ARTICLE===\nfinal\n===ARTICLE_FORMATTED===\nf\n===POLL===\np\n===PUBLISH_GUIDE===\ng\n===DESCRIPTION_OPTIONS===\nd",
        ]);
        let pipeline = Pipeline::new(&config, &generator);

        let mut p = params(dir.path(), 1);
        p.iterate = false;
        let report = pipeline.run(&p).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Complete, "notes: {:?}", report.degraded);

        let store = ArtifactStore::new(dir.path().join("topic"));
        assert!(!store.exists(keys::ARTICLE_ITERATED));
        assert!(store.latest_article_version().is_none());
        assert_eq!(store.read(keys::ARTICLE).as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn test_degraded_notes_roll_up_into_report() {
        let dir = tempdir().unwrap();
        let config = QuillConfig::load(dir.path(), CliOverrides::default()).unwrap();
        // Draft succeeds; everything after returns nothing
        let generator = ScriptedGenerator::new(&["the draft"]);
        let pipeline = Pipeline::new(&config, &generator);

        let report = pipeline.run(&params(dir.path(), 1)).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Degraded);
        assert!(report.degraded.iter().any(|n| n.starts_with("factcheck:")));
        // Negotiation skipped (no findings), not degraded
        assert!(report.skipped.contains(&"negotiate".to_string()));

        // The pipeline still promoted a final article
        let store = ArtifactStore::new(dir.path().join("topic"));
        assert_eq!(store.read(keys::ARTICLE).as_deref(), Some("the draft"));
    }
}
