//! Pass 2: verify the draft's claims and correct the article text.
//!
//! Degraded rather than fatal: when the generator yields nothing usable the
//! uncorrected draft is carried forward as `article_factchecked` so the rest
//! of the pipeline still runs.

use crate::client::generate_lenient;
use crate::config::PassId;
use crate::errors::PipelineError;
use crate::parser;
use crate::passes::{PassCtx, PassOutcome};
use crate::prompts::{self, sections};
use crate::store::keys;
use tracing::info;

pub async fn run(ctx: &PassCtx<'_>) -> Result<PassOutcome, PipelineError> {
    let mut outcome = PassOutcome::clean();
    let draft = ctx.store.read_or(keys::ARTICLE_DRAFT, "");

    let stage_ctx = ctx.assembler.assemble_factcheck(&draft);
    let prompt = prompts::FACTCHECK.fill(&stage_ctx)?;
    let request = ctx.request(PassId::FactCheck, prompt);

    let output = generate_lenient(ctx.generator, &request, "factcheck").await;
    if output.trim().is_empty() {
        outcome.note("factcheck produced no output; draft carried forward unverified");
        ctx.store.write(keys::ARTICLE_FACTCHECKED, &draft)?;
        return Ok(outcome);
    }

    let expected = [sections::FACTCHECK_REPORT, sections::CORRECTED_ARTICLE];
    let parsed = parser::parse(&output, &expected);

    let report = parsed.get_or_empty(sections::FACTCHECK_REPORT);
    if report.is_empty() {
        outcome.note("factcheck report section missing");
    } else {
        ctx.store.write(keys::FACTCHECK_REPORT, report)?;
    }

    let article = parsed.get_or_empty(sections::CORRECTED_ARTICLE);
    if article.is_empty() {
        outcome.note("corrected article section missing; draft carried forward");
        ctx.store.write(keys::ARTICLE_FACTCHECKED, &draft)?;
    } else {
        ctx.store.write(keys::ARTICLE_FACTCHECKED, article)?;
    }

    info!(
        complete = parsed.is_complete(),
        degraded = !outcome.degraded.is_empty(),
        "factcheck finished"
    );
    Ok(outcome)
}
