//! Pass 3: independent editorial review of the fact-checked article.

use crate::client::generate_lenient;
use crate::config::PassId;
use crate::errors::PipelineError;
use crate::parser;
use crate::passes::{PassCtx, PassOutcome};
use crate::prompts::{self, sections};
use crate::review::{orphaned_recommendations, FindingScan};
use crate::store::keys;
use tracing::{info, warn};

pub async fn run(ctx: &PassCtx<'_>) -> Result<PassOutcome, PipelineError> {
    let mut outcome = PassOutcome::clean();
    let article = ctx
        .store
        .read(keys::ARTICLE_FACTCHECKED)
        .or_else(|| ctx.store.read(keys::ARTICLE_DRAFT))
        .unwrap_or_default();

    let stage_ctx = ctx.assembler.assemble_critique(&article);
    let prompt = prompts::CRITIQUE.fill(&stage_ctx)?;
    let request = ctx.request(PassId::Critique, prompt);

    let output = generate_lenient(ctx.generator, &request, "critique").await;
    if output.trim().is_empty() {
        outcome.note("critique produced no review report");
        return Ok(outcome);
    }

    // Raw fallback applies: an unstructured response is still the report.
    let parsed = parser::parse(&output, &[sections::REVIEW_REPORT]);
    let report = parsed.get_or_empty(sections::REVIEW_REPORT);
    ctx.store.write(keys::REVIEW_REPORT, report)?;

    // Fix items no structured finding covers would never reach the
    // negotiation; surface them as a warning artifact.
    let orphans = orphaned_recommendations(report);
    if !orphans.is_empty() {
        let body = orphans
            .iter()
            .map(|o| format!("- {}", o))
            .collect::<Vec<_>>()
            .join("\n");
        ctx.store.write(
            keys::ORPHANED_RECOMMENDATIONS,
            &format!("# Fix items not covered by any marked finding\n\n{}\n", body),
        )?;
        warn!(count = orphans.len(), "orphaned recommendations recorded");
    }

    let scan = FindingScan::scan(report);
    info!(
        fact = scan.fact,
        writing = scan.writing,
        both = scan.both,
        "review report written"
    );
    Ok(outcome)
}
