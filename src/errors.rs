//! Typed error hierarchy for the quill orchestrator.
//!
//! Two top-level enums cover the two subsystems:
//! - `ClientError` — generation client failures (spawn, rate-limit, timeout)
//! - `PipelineError` — pipeline driver failures (fatal stages, bad resume)
//!
//! Lower-level components (client, parser, assembler) never abort the run on
//! their own; they surface typed errors or fallback values and the driver
//! decides fatal vs degraded.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the generation client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Failed to spawn generator command '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Generator exited with code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    /// Transient overload signal. Handled inside the client's retry loop;
    /// callers only see it if a single attempt is run outside the loop.
    #[error("Generator rate limited: {stderr}")]
    RateLimited { stderr: String },

    #[error("Rate limited after {attempts} attempts across both retry cycles")]
    RateLimitExhausted { attempts: u32 },

    #[error("Generation timed out after {timeout_secs}s; process tree terminated")]
    TimedOut { timeout_secs: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Transient failures are retried by the client; everything else is
    /// returned immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Errors from the pipeline driver.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pass 1 (draft) produced no output; aborting the run")]
    DraftFailed,

    #[error("Cannot resume from pass {start_pass}: required artifact '{artifact}' is missing")]
    MissingResumeArtifact { start_pass: u8, artifact: String },

    #[error("Start pass must be between 1 and 5, got {0}")]
    InvalidStartPass(u8),

    #[error("Topic directory does not exist: {}", .0.display())]
    TopicDirMissing(PathBuf),

    #[error("Failed to write artifact '{key}': {source}")]
    ArtifactWriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Prompt template '{template}' is missing required context key '{key}'")]
    MissingContextKey { template: String, key: String },

    #[error("Prompt template '{template}' contains an unresolved placeholder: {placeholder}")]
    UnresolvedPlaceholder { template: String, placeholder: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_rate_limited_is_transient() {
        let err = ClientError::RateLimited {
            stderr: "429 too many requests".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_error_non_zero_exit_is_not_transient() {
        let err = ClientError::NonZeroExit {
            exit_code: 2,
            stderr: "bad flag".into(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("2"));
    }

    #[test]
    fn client_error_spawn_failed_carries_command() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err = ClientError::SpawnFailed {
            command: "claude".into(),
            source: io_err,
        };
        assert!(err.to_string().contains("claude"));
        assert!(!err.is_transient());
    }

    #[test]
    fn pipeline_error_missing_resume_artifact_carries_fields() {
        let err = PipelineError::MissingResumeArtifact {
            start_pass: 3,
            artifact: "article_draft".into(),
        };
        match &err {
            PipelineError::MissingResumeArtifact {
                start_pass,
                artifact,
            } => {
                assert_eq!(*start_pass, 3);
                assert_eq!(artifact, "article_draft");
            }
            _ => panic!("Expected MissingResumeArtifact"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ClientError::EmptyPrompt);
        assert_std_error(&PipelineError::DraftFailed);
    }
}
