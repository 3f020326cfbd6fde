//! Context assembly for generation calls.
//!
//! Every pass builds a fresh [`StageContext`] — a typed key→text map — from
//! a shared baseline (reference-material summary, persona summary, style
//! rule core, recent series lessons) plus stage-specific overlays. Each
//! baseline element is bounded to a character budget with a deterministic
//! truncation marker. A missing source file or artifact substitutes an
//! explicit placeholder; assembly itself never fails.
//!
//! Expected project layout:
//!
//! ```text
//! <project_root>/
//!   personas/<name>.md       persona profiles
//!   style_rules.md           house style rules
//!   series/<series>/lessons.md   cross-run lessons log
//! <topic_dir>/
//!   materials/*.md           reference material for this topic
//! ```

use glob::glob;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Typed placeholder keys for prompt templates. A template declares which
/// keys it requires; filling validates the set so a missing key is an error
/// instead of a literal `{{KEY}}` leaking into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextKey {
    SharedContext,
    Persona,
    PersonaName,
    Date,
    Materials,
    MaterialsSummary,
    SeriesLessons,
    ArticleDraft,
    ArticleFactchecked,
    Article,
    ArticlePrev,
    ArticleCurr,
    ArticleBefore,
    ArticleAfter,
    LatestArticle,
    FactcheckReport,
    ReviewReport,
    ConsensusDoc,
    ChangeList,
    WeaknessReport,
    TargetedResearch,
}

impl ContextKey {
    /// The `{{NAME}}` placeholder text this key replaces.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::SharedContext => "SHARED_CONTEXT",
            Self::Persona => "PERSONA",
            Self::PersonaName => "PERSONA_NAME",
            Self::Date => "DATE",
            Self::Materials => "MATERIALS",
            Self::MaterialsSummary => "MATERIALS_SUMMARY",
            Self::SeriesLessons => "SERIES_LESSONS",
            Self::ArticleDraft => "ARTICLE_DRAFT",
            Self::ArticleFactchecked => "ARTICLE_FACTCHECKED",
            Self::Article => "ARTICLE",
            Self::ArticlePrev => "ARTICLE_PREV",
            Self::ArticleCurr => "ARTICLE_CURR",
            Self::ArticleBefore => "ARTICLE_BEFORE",
            Self::ArticleAfter => "ARTICLE_AFTER",
            Self::LatestArticle => "LATEST_ARTICLE",
            Self::FactcheckReport => "FACTCHECK_REPORT",
            Self::ReviewReport => "REVIEW_REPORT",
            Self::ConsensusDoc => "CONSENSUS_DOC",
            Self::ChangeList => "CHANGE_LIST",
            Self::WeaknessReport => "WEAKNESS_REPORT",
            Self::TargetedResearch => "TARGETED_RESEARCH",
        }
    }
}

/// Ephemeral per-invocation mapping from typed keys to text. Built fresh
/// for every generation call, consumed to produce a prompt, never persisted.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    values: BTreeMap<ContextKey, String>,
}

impl StageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ContextKey, value: impl Into<String>) -> &mut Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn get(&self, key: ContextKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: ContextKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextKey, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Appended when a text exceeds its character budget.
pub const TRUNCATION_MARKER: &str = "\n\n[...truncated...]";

/// Substituted when a referenced source or artifact is missing.
pub fn missing_placeholder(name: &str) -> String {
    format!("[not available: {}]", name)
}

/// Truncate `text` to `budget` characters, appending [`TRUNCATION_MARKER`].
///
/// Deterministic (always keeps the head) and idempotent: truncating an
/// already-truncated string at the same budget returns it unchanged.
pub fn truncate_with_marker(text: &str, budget: usize) -> String {
    let count = text.chars().count();
    if count <= budget {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if text.ends_with(TRUNCATION_MARKER) && count <= budget + marker_len {
        return text.to_string();
    }
    let head: String = text.chars().take(budget).collect();
    format!("{}{}", head, TRUNCATION_MARKER)
}

// Character budgets for the shared baseline elements.
const MATERIALS_SUMMARY_BUDGET: usize = 3000;
const STYLE_CORE_BUDGET: usize = 2000;
const LESSONS_BUDGET: usize = 1500;
const PERSONA_SUMMARY_LINES: usize = 50;

/// Builds stage contexts for one job. Stateless across calls; owns nothing
/// but its path and identity parameters.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    project_root: PathBuf,
    topic_dir: PathBuf,
    persona: String,
    series: Option<String>,
}

impl ContextAssembler {
    pub fn new(
        project_root: impl Into<PathBuf>,
        topic_dir: impl Into<PathBuf>,
        persona: impl Into<String>,
        series: Option<String>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            topic_dir: topic_dir.into(),
            persona: persona.into(),
            series,
        }
    }

    pub fn persona_name(&self) -> &str {
        &self.persona
    }

    // ── source loading ──────────────────────────────────────────────

    fn read_or_placeholder(path: &Path, name: &str) -> String {
        std::fs::read_to_string(path).unwrap_or_else(|_| missing_placeholder(name))
    }

    fn load_persona(&self) -> String {
        let path = self
            .project_root
            .join("personas")
            .join(format!("{}.md", self.persona));
        Self::read_or_placeholder(&path, &format!("persona {}", self.persona))
    }

    fn load_persona_summary(&self) -> String {
        let full = self.load_persona();
        let lines: Vec<&str> = full.lines().collect();
        if lines.len() <= PERSONA_SUMMARY_LINES {
            return full;
        }
        format!(
            "{}{}",
            lines[..PERSONA_SUMMARY_LINES].join("\n"),
            TRUNCATION_MARKER
        )
    }

    fn load_style_core(&self) -> String {
        let path = self.project_root.join("style_rules.md");
        truncate_with_marker(
            &Self::read_or_placeholder(&path, "style rules"),
            STYLE_CORE_BUDGET,
        )
    }

    fn load_series_lessons(&self) -> String {
        let Some(series) = &self.series else {
            return "[standalone article, no series lessons]".to_string();
        };
        let path = self
            .project_root
            .join("series")
            .join(series)
            .join("lessons.md");
        truncate_with_marker(
            &Self::read_or_placeholder(&path, &format!("lessons for series {}", series)),
            LESSONS_BUDGET,
        )
    }

    /// All reference material under `<topic_dir>/materials/`, concatenated
    /// with per-file headers, sorted by file name for determinism.
    fn load_materials(&self) -> String {
        let pattern = self
            .topic_dir
            .join("materials")
            .join("**")
            .join("*.md")
            .to_string_lossy()
            .to_string();

        let mut files: Vec<PathBuf> = glob(&pattern)
            .map(|paths| paths.filter_map(|p| p.ok()).collect())
            .unwrap_or_default();
        files.sort();

        let mut parts = Vec::new();
        for file in files {
            if let Ok(content) = std::fs::read_to_string(&file) {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                parts.push(format!("--- material: {} ---\n{}", name, content));
            }
        }

        if parts.is_empty() {
            missing_placeholder("materials")
        } else {
            parts.join("\n\n")
        }
    }

    fn load_materials_summary(&self) -> String {
        truncate_with_marker(&self.load_materials(), MATERIALS_SUMMARY_BUDGET)
    }

    /// The baseline payload shared by every pass.
    fn shared_baseline(&self) -> String {
        [
            format!("## Reference material summary\n\n{}", self.load_materials_summary()),
            format!("## Persona summary\n\n{}", self.load_persona_summary()),
            format!("## Style rule core\n\n{}", self.load_style_core()),
            format!("## Recent lessons\n\n{}", self.load_series_lessons()),
        ]
        .join("\n\n---\n\n")
    }

    fn base_context(&self) -> StageContext {
        let mut ctx = StageContext::new();
        ctx.insert(ContextKey::SharedContext, self.shared_baseline());
        ctx
    }

    fn with_fallback(value: &str, name: &str) -> String {
        if value.trim().is_empty() {
            missing_placeholder(name)
        } else {
            value.to_string()
        }
    }

    // ── per-stage overlays ─────────────────────────────────────────

    pub fn assemble_draft(&self) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::Persona, self.load_persona())
            .insert(ContextKey::PersonaName, self.persona.clone())
            .insert(
                ContextKey::Date,
                chrono::Local::now().format("%Y-%m-%d").to_string(),
            )
            .insert(ContextKey::SeriesLessons, self.load_series_lessons())
            .insert(ContextKey::Materials, self.load_materials());
        ctx
    }

    pub fn assemble_factcheck(&self, draft: &str) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::ArticleDraft, Self::with_fallback(draft, "article_draft"))
            .insert(ContextKey::Materials, self.load_materials());
        ctx
    }

    pub fn assemble_critique(&self, article: &str) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(
            ContextKey::ArticleFactchecked,
            Self::with_fallback(article, "article_factchecked"),
        )
        .insert(ContextKey::Persona, self.load_persona())
        .insert(ContextKey::SeriesLessons, self.load_series_lessons());
        ctx
    }

    pub fn assemble_negotiate_respond(
        &self,
        review_report: &str,
        article: &str,
        consensus_doc: &str,
        fact_role: bool,
    ) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(
            ContextKey::ReviewReport,
            Self::with_fallback(review_report, "review_report"),
        )
        .insert(
            ContextKey::ArticleFactchecked,
            Self::with_fallback(article, "article_factchecked"),
        )
        .insert(
            ContextKey::ConsensusDoc,
            Self::with_fallback(consensus_doc, "consensus_doc"),
        );
        if fact_role {
            ctx.insert(ContextKey::Materials, self.load_materials());
        } else {
            ctx.insert(ContextKey::Persona, self.load_persona());
        }
        ctx
    }

    pub fn assemble_negotiate_evaluate(
        &self,
        review_report: &str,
        article: &str,
        consensus_doc: &str,
    ) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(
            ContextKey::ReviewReport,
            Self::with_fallback(review_report, "review_report"),
        )
        .insert(
            ContextKey::ArticleFactchecked,
            Self::with_fallback(article, "article_factchecked"),
        )
        .insert(
            ContextKey::ConsensusDoc,
            Self::with_fallback(consensus_doc, "consensus_doc"),
        );
        ctx
    }

    pub fn assemble_negotiate_revise(
        &self,
        article: &str,
        consensus_doc: &str,
        fact_role: bool,
    ) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::Article, Self::with_fallback(article, "article"))
            .insert(
                ContextKey::ConsensusDoc,
                Self::with_fallback(consensus_doc, "consensus_doc"),
            );
        if fact_role {
            ctx.insert(ContextKey::Materials, self.load_materials());
        } else {
            ctx.insert(ContextKey::Persona, self.load_persona());
        }
        ctx
    }

    pub fn assemble_negotiate_verify(
        &self,
        article_before: &str,
        article_after: &str,
        consensus_doc: &str,
        change_list: &str,
    ) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(
            ContextKey::ArticleBefore,
            Self::with_fallback(article_before, "article before revision"),
        )
        .insert(
            ContextKey::ArticleAfter,
            Self::with_fallback(article_after, "article after revision"),
        )
        .insert(
            ContextKey::ConsensusDoc,
            Self::with_fallback(consensus_doc, "consensus_doc"),
        )
        .insert(
            ContextKey::ChangeList,
            Self::with_fallback(change_list, "change list"),
        );
        ctx
    }

    pub fn assemble_iterate_weakness(&self, article: &str) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::Article, Self::with_fallback(article, "article"))
            .insert(ContextKey::Materials, self.load_materials());
        ctx
    }

    pub fn assemble_iterate_research(&self, article: &str, weakness: &str) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::Article, Self::with_fallback(article, "article"))
            .insert(
                ContextKey::WeaknessReport,
                Self::with_fallback(weakness, "weakness report"),
            )
            .insert(ContextKey::MaterialsSummary, self.load_materials_summary());
        ctx
    }

    pub fn assemble_iterate_rewrite(
        &self,
        article: &str,
        weakness: &str,
        research: &str,
    ) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::Article, Self::with_fallback(article, "article"))
            .insert(
                ContextKey::WeaknessReport,
                Self::with_fallback(weakness, "weakness report"),
            )
            .insert(
                ContextKey::TargetedResearch,
                Self::with_fallback(research, "targeted research"),
            )
            .insert(ContextKey::Persona, self.load_persona());
        ctx
    }

    pub fn assemble_iterate_compare(&self, prev: &str, curr: &str) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::ArticlePrev, Self::with_fallback(prev, "previous version"))
            .insert(ContextKey::ArticleCurr, Self::with_fallback(curr, "current version"));
        ctx
    }

    pub fn assemble_assemble(
        &self,
        draft: &str,
        factcheck_report: &str,
        review_report: &str,
        latest_article: &str,
        consensus_doc: &str,
    ) -> StageContext {
        let mut ctx = self.base_context();
        ctx.insert(ContextKey::ArticleDraft, Self::with_fallback(draft, "article_draft"))
            .insert(
                ContextKey::FactcheckReport,
                Self::with_fallback(factcheck_report, "factcheck_report"),
            )
            .insert(
                ContextKey::ReviewReport,
                Self::with_fallback(review_report, "review_report"),
            )
            .insert(
                ContextKey::LatestArticle,
                Self::with_fallback(latest_article, "latest article"),
            )
            .insert(
                ContextKey::ConsensusDoc,
                Self::with_fallback(consensus_doc, "consensus_doc"),
            );
        ctx
    }
}
