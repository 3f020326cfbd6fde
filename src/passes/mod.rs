//! The pipeline's passes.
//!
//! | Pass | Module | Reads | Writes |
//! |------|-------------|----------------------------------|----------------------------------|
//! | 1 | `draft` | materials, persona, lessons | `article_draft` |
//! | 2 | `factcheck` | `article_draft` | `factcheck_report`, `article_factchecked` |
//! | 3 | `critique` | `article_factchecked` | `review_report`, `orphaned_recommendations` |
//! | 3.5 | `negotiate` | `review_report`, article | `consensus_doc`, `article_reviewed`, `verification_report` |
//! | 5 | `iterate` | latest article | `article_v{n}`, `iteration_*`, `article_iterated` |
//! | 4 | `assemble` | everything above | `article`, publication deliverables |
//!
//! Each pass receives a [`PassCtx`] and reports degraded-mode notes through
//! its [`PassOutcome`]; only the draft pass can fail the run outright.

pub mod assemble;
pub mod critique;
pub mod draft;
pub mod factcheck;
pub mod iterate;
pub mod negotiate;

use crate::client::{GenerationRequest, Generator};
use crate::config::{PassId, QuillConfig};
use crate::context::ContextAssembler;
use crate::store::ArtifactStore;

/// Everything a pass needs: the job's store and assembler, the generator,
/// and the resolved configuration.
pub struct PassCtx<'a> {
    pub store: &'a ArtifactStore,
    pub assembler: &'a ContextAssembler,
    pub generator: &'a dyn Generator,
    pub config: &'a QuillConfig,
}

impl PassCtx<'_> {
    /// Build a request with the pass's configured settings.
    pub fn request(&self, pass: PassId, prompt: String) -> GenerationRequest {
        let settings = self.config.pass(pass);
        GenerationRequest {
            prompt,
            model: self.config.model.clone(),
            tools: settings.tools.clone(),
            effort: settings.effort.clone(),
            timeout: settings.timeout(),
        }
    }

    /// Same, with a widened or narrowed toolset for one sub-step.
    pub fn request_with_tools(
        &self,
        pass: PassId,
        tools: &str,
        prompt: String,
    ) -> GenerationRequest {
        let settings = self.config.pass(pass).with_tools(tools);
        let timeout = settings.timeout();
        GenerationRequest {
            prompt,
            model: self.config.model.clone(),
            tools: settings.tools,
            effort: settings.effort,
            timeout,
        }
    }
}

/// What a pass reports back to the driver.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    /// Human-readable notes about sub-steps that produced no usable output.
    /// Empty means the pass ran clean.
    pub degraded: Vec<String>,
    /// The pass decided it had nothing to do (e.g. no findings to
    /// negotiate). Not a degradation.
    pub skipped: bool,
}

impl PassOutcome {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn skipped() -> Self {
        Self {
            degraded: Vec::new(),
            skipped: true,
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.degraded.push(note.into());
    }
}
