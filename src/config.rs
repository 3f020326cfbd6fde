//! Unified configuration for quill.
//!
//! Reads from an optional `quill.toml` in the project directory and layers
//! CLI overrides on top. The result is one explicit [`QuillConfig`] struct
//! constructed at startup and passed into every component; nothing reads
//! ambient global state.
//!
//! # Configuration file format
//!
//! ```toml
//! [project]
//! generator_cmd = "claude"
//! model = "opus"
//!
//! [passes.draft]
//! effort = "high"
//! tools = "Read,Grep,Glob,WebSearch,WebFetch"
//! timeout_secs = 900
//!
//! [consensus]
//! max_rounds = 2
//!
//! [iteration]
//! max_rounds = 2
//!
//! [retry]
//! max_attempts = 3
//! short_wait_secs = 60
//! cooldown_secs = 300
//!
//! [illustration]
//! command = "genimage"
//! timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "quill.toml";

/// The ordered passes of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassId {
    Draft,
    FactCheck,
    Critique,
    Negotiate,
    Iterate,
    Assemble,
}

impl std::fmt::Display for PassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PassId::Draft => "draft",
            PassId::FactCheck => "factcheck",
            PassId::Critique => "critique",
            PassId::Negotiate => "negotiate",
            PassId::Iterate => "iterate",
            PassId::Assemble => "assemble",
        };
        write!(f, "{}", s)
    }
}

/// Generator settings for one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSettings {
    #[serde(default = "default_effort")]
    pub effort: String,
    #[serde(default = "default_tools_readonly")]
    pub tools: String,
    #[serde(default = "default_pass_timeout_secs")]
    pub timeout_secs: u64,
}

impl PassSettings {
    fn new(effort: &str, tools: &str, timeout_secs: u64) -> Self {
        Self {
            effort: effort.to_string(),
            tools: tools.to_string(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The same settings with a different allowed-tools list. Negotiation
    /// and iterate sub-steps that need web research widen their toolset
    /// without a separate config entry.
    pub fn with_tools(&self, tools: &str) -> Self {
        Self {
            effort: self.effort.clone(),
            tools: tools.to_string(),
            timeout_secs: self.timeout_secs,
        }
    }
}

fn default_effort() -> String {
    "high".to_string()
}

fn default_tools_readonly() -> String {
    "Read".to_string()
}

fn default_pass_timeout_secs() -> u64 {
    900
}

/// Per-pass settings table with research-heavy defaults for the passes that
/// verify facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassTable {
    pub draft: PassSettings,
    pub factcheck: PassSettings,
    pub critique: PassSettings,
    pub negotiate: PassSettings,
    pub iterate: PassSettings,
    pub assemble: PassSettings,
}

impl Default for PassTable {
    fn default() -> Self {
        Self {
            draft: PassSettings::new("high", "Read,Grep,Glob,WebSearch,WebFetch", 900),
            factcheck: PassSettings::new("high", "WebSearch,WebFetch,Read", 1200),
            critique: PassSettings::new("high", "WebSearch,WebFetch,Read", 1200),
            negotiate: PassSettings::new("high", "Read", 900),
            iterate: PassSettings::new("high", "Read", 900),
            assemble: PassSettings::new("medium", "Read", 600),
        }
    }
}

impl PassTable {
    pub fn get(&self, pass: PassId) -> &PassSettings {
        match pass {
            PassId::Draft => &self.draft,
            PassId::FactCheck => &self.factcheck,
            PassId::Critique => &self.critique,
            PassId::Negotiate => &self.negotiate,
            PassId::Iterate => &self.iterate,
            PassId::Assemble => &self.assemble,
        }
    }
}

/// Negotiation round loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_consensus_rounds")]
    pub max_rounds: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_consensus_rounds(),
        }
    }
}

fn default_consensus_rounds() -> u32 {
    2
}

/// Iterate-loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationConfig {
    #[serde(default = "default_iteration_rounds")]
    pub max_rounds: u32,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_iteration_rounds(),
        }
    }
}

fn default_iteration_rounds() -> u32 {
    2
}

/// Retry behaviour for transient rate-limit failures: `max_attempts` short
/// waits, one long cooldown, one more cycle of `max_attempts`, then failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_short_wait_secs")]
    pub short_wait_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Lowercase substrings of stderr that identify a transient overload.
    #[serde(default = "default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            short_wait_secs: default_short_wait_secs(),
            cooldown_secs: default_cooldown_secs(),
            rate_limit_markers: default_rate_limit_markers(),
        }
    }
}

impl RetryPolicy {
    pub fn short_wait(&self) -> Duration {
        Duration::from_secs(self.short_wait_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Whether a stderr blob carries a transient overload marker.
    pub fn is_rate_limited(&self, stderr: &str) -> bool {
        let lower = stderr.to_lowercase();
        self.rate_limit_markers.iter().any(|m| lower.contains(m))
    }

    /// A policy with zero waits, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            short_wait_secs: 0,
            cooldown_secs: 0,
            rate_limit_markers: default_rate_limit_markers(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_short_wait_secs() -> u64 {
    60
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_rate_limit_markers() -> Vec<String> {
    ["rate limit", "429", "overloaded", "too many requests"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Illustration collaborator settings. Optional; when `command` is unset the
/// postprocess step skips cover generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IllustrationConfig {
    #[serde(default)]
    pub command: Option<String>,
    /// Second hook, run after cover generation, for collecting the
    /// article's inline images into the topic directory.
    #[serde(default)]
    pub collect_command: Option<String>,
    #[serde(default = "default_illustration_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_illustration_timeout_secs() -> u64 {
    120
}

/// Project-level settings from the `[project]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default = "default_generator_cmd")]
    pub generator_cmd: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            generator_cmd: default_generator_cmd(),
            model: default_model(),
        }
    }
}

fn default_generator_cmd() -> String {
    "claude".to_string()
}

fn default_model() -> String {
    "opus".to_string()
}

/// Raw on-disk representation of `quill.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillFile {
    pub project: ProjectSettings,
    pub passes: PassTable,
    pub consensus: ConsensusConfig,
    pub iteration: IterationConfig,
    pub retry: RetryPolicy,
    pub illustration: IllustrationConfig,
}

/// CLI-level overrides layered on top of the file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub effort: Option<String>,
    pub max_iterations: Option<u32>,
}

/// Resolved runtime configuration: file → CLI, built once at startup.
#[derive(Debug, Clone)]
pub struct QuillConfig {
    pub project_root: PathBuf,
    pub generator_cmd: String,
    pub model: String,
    pub passes: PassTable,
    pub consensus: ConsensusConfig,
    pub iteration: IterationConfig,
    pub retry: RetryPolicy,
    pub illustration: IllustrationConfig,
}

impl QuillConfig {
    /// Load configuration from `<project_root>/quill.toml` (when present)
    /// and apply CLI overrides.
    pub fn load(project_root: impl Into<PathBuf>, overrides: CliOverrides) -> Result<Self> {
        let project_root = project_root.into();
        let file = Self::read_file(&project_root.join(CONFIG_FILE_NAME))?;
        Ok(Self::from_parts(project_root, file, overrides))
    }

    fn read_file(path: &Path) -> Result<QuillFile> {
        if !path.exists() {
            return Ok(QuillFile::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn from_parts(project_root: PathBuf, file: QuillFile, overrides: CliOverrides) -> Self {
        let mut passes = file.passes;
        if let Some(effort) = overrides.effort {
            for settings in [
                &mut passes.draft,
                &mut passes.factcheck,
                &mut passes.critique,
                &mut passes.negotiate,
                &mut passes.iterate,
                &mut passes.assemble,
            ] {
                settings.effort = effort.clone();
            }
        }

        let mut iteration = file.iteration;
        if let Some(max) = overrides.max_iterations {
            iteration.max_rounds = max;
        }

        Self {
            project_root,
            generator_cmd: file.project.generator_cmd,
            model: overrides.model.unwrap_or(file.project.model),
            passes,
            consensus: file.consensus,
            iteration,
            retry: file.retry,
            illustration: file.illustration,
        }
    }

    pub fn pass(&self, pass: PassId) -> &PassSettings {
        self.passes.get(pass)
    }

    /// Write a default `quill.toml` to the project root. Refuses to
    /// overwrite an existing file.
    pub fn init_file(project_root: &Path) -> Result<PathBuf> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        let content = toml::to_string_pretty(&QuillFile::default())
            .context("Failed to serialize default config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }
}
