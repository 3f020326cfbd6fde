//! Pass 3.5: negotiate the review findings to consensus, revise, verify.
//!
//! Round loop: each marked perspective responds to the pending findings,
//! then the moderator rewrites the resolution state. The loop ends when no
//! item carries the pending marker or the round cap is hit. Each active
//! perspective then applies its agreed changes to the article in turn, and
//! an audit step checks the rewritten text against the consensus record.
//! An unreadable audit falls back to the pre-revision article.

use crate::client::generate_lenient;
use crate::config::PassId;
use crate::consensus::ConsensusRecord;
use crate::errors::PipelineError;
use crate::parser;
use crate::passes::{PassCtx, PassOutcome};
use crate::prompts::{self, sections};
use crate::review::FindingScan;
use crate::store::keys;
use tracing::{info, warn};

const FACT_TOOLS: &str = "WebSearch,WebFetch,Read";

pub async fn run(ctx: &PassCtx<'_>) -> Result<PassOutcome, PipelineError> {
    let mut outcome = PassOutcome::clean();

    let review = ctx.store.read_or(keys::REVIEW_REPORT, "");
    let scan = FindingScan::scan(&review);
    if review.trim().is_empty() || scan.total() == 0 {
        info!("no marked findings to negotiate, skipping");
        return Ok(PassOutcome::skipped());
    }

    let article = ctx
        .store
        .read(keys::ARTICLE_FACTCHECKED)
        .or_else(|| ctx.store.read(keys::ARTICLE_DRAFT))
        .unwrap_or_default();

    let topic = ctx
        .store
        .root()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "article".to_string());
    let mut record = ConsensusRecord::new(&topic);

    let mut settled = false;
    let max_rounds = ctx.config.consensus.max_rounds;
    for round in 1..=max_rounds {
        info!(round, pending = record.pending(), "negotiation round");

        if scan.needs_fact() {
            let response = respond(ctx, &review, &article, &record, true).await;
            if !response.is_empty() {
                record.push_response(round, "fact", &response);
            }
        }
        if scan.needs_writing() {
            let response = respond(ctx, &review, &article, &record, false).await;
            if !response.is_empty() {
                record.push_response(round, "writing", &response);
            }
        }

        let stage_ctx =
            ctx.assembler
                .assemble_negotiate_evaluate(&review, &article, &record.render());
        let prompt = prompts::NEGOTIATE_EVALUATE.fill(&stage_ctx)?;
        let request = ctx.request(PassId::Negotiate, prompt);
        let evaluation = generate_lenient(ctx.generator, &request, "negotiate/evaluate").await;
        if evaluation.trim().is_empty() {
            outcome.note(format!("negotiation round {} evaluation produced no output", round));
            break;
        }
        record.set_evaluation(round, &evaluation);

        if record.pending() == 0 {
            settled = true;
            record.push_final("Termination", &format!("all items settled after round {}", round));
            break;
        }
    }

    if !settled && outcome.degraded.is_empty() {
        warn!(pending = record.pending(), "round cap reached with items pending");
        record.push_final(
            "Termination",
            &format!("round cap ({}) reached with {} items pending", max_rounds, record.pending()),
        );
    }

    // Execution: each active perspective applies its agreed changes to the
    // latest text, writing first, then fact.
    let resolutions = if record.current_state().is_empty() {
        record.render()
    } else {
        record.current_state().to_string()
    };

    let mut current = article.clone();
    let mut change_log: Vec<String> = Vec::new();
    let mut applied = false;
    for fact_role in [false, true] {
        let active = if fact_role { scan.needs_fact() } else { scan.needs_writing() };
        if !active {
            continue;
        }
        let stage = if fact_role { "negotiate/apply-fact" } else { "negotiate/apply-writing" };
        let stage_ctx = ctx.assembler.assemble_negotiate_revise(&current, &resolutions, fact_role);
        let prompt = prompts::NEGOTIATE_REVISE.fill(&stage_ctx)?;
        let request = if fact_role {
            ctx.request_with_tools(PassId::Negotiate, FACT_TOOLS, prompt)
        } else {
            ctx.request(PassId::Negotiate, prompt)
        };
        let output = generate_lenient(ctx.generator, &request, stage).await;

        let parsed = parser::parse(&output, &[sections::ARTICLE, sections::CHANGES]);
        let revised = parsed.get_or_empty(sections::ARTICLE);
        if revised.trim().is_empty() {
            outcome.note(format!("{} produced no article; prior text kept", stage));
            continue;
        }
        current = revised.to_string();
        let changes = parsed.get_or_empty(sections::CHANGES);
        if !changes.trim().is_empty() {
            change_log.push(changes.to_string());
        }
        applied = true;
    }

    if !applied {
        outcome.note("no revision applied; pre-negotiation text carried forward");
        ctx.store.write(keys::ARTICLE_REVIEWED, &article)?;
    } else {
        // Audit the rewrite against the consensus record. The rewritten text
        // is only accepted once the audit is readable.
        let stage_ctx = ctx.assembler.assemble_negotiate_verify(
            &article,
            &current,
            &record.render(),
            &change_log.join("\n"),
        );
        let prompt = prompts::NEGOTIATE_VERIFY.fill(&stage_ctx)?;
        let request = ctx.request(PassId::Negotiate, prompt);
        let verification = generate_lenient(ctx.generator, &request, "negotiate/verify").await;
        if verification.trim().is_empty() {
            outcome.note("revision audit unreadable; pre-negotiation text carried forward");
            ctx.store.write(keys::ARTICLE_REVIEWED, &article)?;
        } else {
            let parsed = parser::parse(&verification, &[sections::VERIFICATION_REPORT]);
            ctx.store.write(
                keys::VERIFICATION_REPORT,
                parsed.get_or_empty(sections::VERIFICATION_REPORT),
            )?;
            ctx.store.write(keys::ARTICLE_REVIEWED, &current)?;
        }
    }

    ctx.store.write(keys::CONSENSUS_DOC, &record.render())?;
    Ok(outcome)
}

async fn respond(
    ctx: &PassCtx<'_>,
    review: &str,
    article: &str,
    record: &ConsensusRecord,
    fact_role: bool,
) -> String {
    let stage_ctx =
        ctx.assembler
            .assemble_negotiate_respond(review, article, &record.render(), fact_role);
    let (stage, request) = if fact_role {
        let prompt = match prompts::NEGOTIATE_RESPOND.fill(&stage_ctx) {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "respond prompt assembly failed");
                return String::new();
            }
        };
        (
            "negotiate/respond-fact",
            ctx.request_with_tools(PassId::Negotiate, FACT_TOOLS, prompt),
        )
    } else {
        let prompt = match prompts::NEGOTIATE_RESPOND.fill(&stage_ctx) {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "respond prompt assembly failed");
                return String::new();
            }
        };
        (
            "negotiate/respond-writing",
            ctx.request(PassId::Negotiate, prompt),
        )
    };
    generate_lenient(ctx.generator, &request, stage)
        .await
        .trim()
        .to_string()
}
