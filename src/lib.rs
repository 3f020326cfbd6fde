//! quill — a pass-pipeline orchestrator for long-form content production.
//!
//! A run drives one topic through ordered passes: draft, fact-check,
//! critique, negotiation to consensus, the iterate loop, and final assembly
//! into the article plus its publication deliverables, with lessons
//! stamping and an illustration hand-off at the end. Every pass checkpoints
//! its outputs as named artifacts in the topic directory, so an interrupted
//! run resumes from any pass boundary.

pub mod client;
pub mod config;
pub mod consensus;
pub mod context;
pub mod errors;
pub mod illustrate;
pub mod lessons;
pub mod parser;
pub mod passes;
pub mod pipeline;
pub mod prompts;
pub mod review;
pub mod store;
pub mod ui;

pub use client::{CliGenerator, GenerationRequest, Generator};
pub use config::{CliOverrides, QuillConfig};
pub use errors::{ClientError, PipelineError};
pub use pipeline::{Pipeline, RunOutcome, RunParams, RunReport};
pub use store::ArtifactStore;
