//! Durable artifact store for a single job.
//!
//! Each job owns one topic directory; artifacts are named text blobs stored
//! as markdown files inside it. Writes go through a temp file and an atomic
//! rename so a later pass never observes a partially written artifact.
//! The store is append/replace-only per key; the orchestrator never deletes.

use crate::errors::PipelineError;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Stable artifact key names shared by the passes and the driver.
pub mod keys {
    pub const ARTICLE_DRAFT: &str = "article_draft";
    pub const FACTCHECK_REPORT: &str = "factcheck_report";
    pub const ARTICLE_FACTCHECKED: &str = "article_factchecked";
    pub const REVIEW_REPORT: &str = "review_report";
    pub const ORPHANED_RECOMMENDATIONS: &str = "orphaned_recommendations";
    pub const CONSENSUS_DOC: &str = "consensus_doc";
    pub const ARTICLE_REVIEWED: &str = "article_reviewed";
    pub const VERIFICATION_REPORT: &str = "verification_report";
    pub const ITERATION_COMPARISON: &str = "iteration_comparison";
    pub const ARTICLE_ITERATED: &str = "article_iterated";
    pub const ARTICLE: &str = "article";
    pub const ARTICLE_FORMATTED: &str = "article_formatted";
    pub const POLL: &str = "poll";
    pub const PUBLISH_GUIDE: &str = "publish_guide";
    pub const DESCRIPTION_OPTIONS: &str = "description_options";
}

static VERSION_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^article_v(\d+)$").unwrap());

/// Key for a versioned article rewrite, e.g. `article_v2`.
pub fn version_key(version: u32) -> String {
    format!("article_v{}", version)
}

/// Key for the weakness report that produced a given version.
pub fn weakness_key(version: u32) -> String {
    format!("iteration_weakness_v{}", version)
}

/// Key for the targeted research behind a given version.
pub fn research_key(version: u32) -> String {
    format!("iteration_research_v{}", version)
}

/// File-backed key→text store scoped to one topic directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.md", key))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Read an artifact, or `None` if it was never written.
    pub fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    /// Read an artifact, substituting `fallback` when absent.
    pub fn read_or<'a>(&self, key: &str, fallback: &'a str) -> String {
        self.read(key).unwrap_or_else(|| fallback.to_string())
    }

    /// Atomically write an artifact: temp file in the same directory, then
    /// rename over the target.
    pub fn write(&self, key: &str, content: &str) -> Result<(), PipelineError> {
        let wrap = |source: std::io::Error| PipelineError::ArtifactWriteFailed {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(wrap)?;
        let target = self.path_for(key);
        let tmp = self.root.join(format!(".{}.md.tmp", key));
        fs::write(&tmp, content).map_err(wrap)?;
        fs::rename(&tmp, &target).map_err(wrap)?;
        Ok(())
    }

    /// Append to an artifact (used only for the cumulative comparison log).
    pub fn append(&self, key: &str, content: &str) -> Result<(), PipelineError> {
        let wrap = |source: std::io::Error| PipelineError::ArtifactWriteFailed {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(wrap)?;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(key))
            .map_err(wrap)?
            .write_all(content.as_bytes())
            .map_err(wrap)?;
        Ok(())
    }

    /// Enumerate artifact keys with their sizes in bytes, sorted by key.
    pub fn list(&self) -> Vec<(String, u64)> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut result: Vec<(String, u64)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let key = name.strip_suffix(".md")?.to_string();
                if key.starts_with('.') {
                    return None;
                }
                let size = e.metadata().ok()?.len();
                Some((key, size))
            })
            .collect();
        result.sort();
        result
    }

    /// The highest `article_v{n}` version written so far, if any.
    pub fn latest_article_version(&self) -> Option<u32> {
        self.list()
            .into_iter()
            .filter_map(|(key, _)| {
                VERSION_KEY_REGEX
                    .captures(&key)
                    .and_then(|c| c.get(1)?.as_str().parse().ok())
            })
            .max()
    }
}
