//! Pass 4: compose the final article and its publication deliverables.
//!
//! One generation folds the pipeline's reports into the latest article text
//! and emits the immutable `article` artifact alongside the formatted
//! article, poll, publish guide, and description options.

use crate::client::generate_lenient;
use crate::config::PassId;
use crate::errors::PipelineError;
use crate::parser;
use crate::passes::{PassCtx, PassOutcome};
use crate::prompts::{self, sections};
use crate::store::keys;
use tracing::info;

/// Latest article text in pipeline order.
fn latest_article(ctx: &PassCtx<'_>) -> String {
    ctx.store
        .read(keys::ARTICLE_ITERATED)
        .or_else(|| ctx.store.read(keys::ARTICLE_REVIEWED))
        .or_else(|| ctx.store.read(keys::ARTICLE_FACTCHECKED))
        .or_else(|| ctx.store.read(keys::ARTICLE_DRAFT))
        .unwrap_or_default()
}

/// Deliverable section name → artifact key.
const DELIVERABLES: [(&str, &str); 4] = [
    (sections::ARTICLE_FORMATTED, keys::ARTICLE_FORMATTED),
    (sections::POLL, keys::POLL),
    (sections::PUBLISH_GUIDE, keys::PUBLISH_GUIDE),
    (sections::DESCRIPTION_OPTIONS, keys::DESCRIPTION_OPTIONS),
];

pub async fn run(ctx: &PassCtx<'_>) -> Result<PassOutcome, PipelineError> {
    let mut outcome = PassOutcome::clean();
    let latest = latest_article(ctx);

    let stage_ctx = ctx.assembler.assemble_assemble(
        &ctx.store.read_or(keys::ARTICLE_DRAFT, ""),
        &ctx.store.read_or(keys::FACTCHECK_REPORT, ""),
        &ctx.store.read_or(keys::REVIEW_REPORT, ""),
        &latest,
        &ctx.store.read_or(keys::CONSENSUS_DOC, ""),
    );
    let prompt = prompts::ASSEMBLE.fill(&stage_ctx)?;
    let request = ctx.request(PassId::Assemble, prompt);

    let output = generate_lenient(ctx.generator, &request, "assemble").await;
    let expected: Vec<&str> = std::iter::once(sections::ARTICLE)
        .chain(DELIVERABLES.iter().map(|(s, _)| *s))
        .collect();
    let parsed = parser::parse(&output, &expected);

    let article = parsed.get_or_empty(sections::ARTICLE);
    if article.is_empty() {
        outcome.note("final composition produced no article; latest version promoted as-is");
        ctx.store.write(keys::ARTICLE, &latest)?;
    } else {
        ctx.store.write(keys::ARTICLE, article)?;
    }

    for (section, key) in DELIVERABLES {
        let content = parsed.get_or_empty(section);
        if content.is_empty() {
            outcome.note(format!("deliverable section {} missing", section));
        } else {
            ctx.store.write(key, content)?;
        }
    }

    info!(
        degraded = outcome.degraded.len(),
        "final article and deliverables written"
    );
    Ok(outcome)
}
