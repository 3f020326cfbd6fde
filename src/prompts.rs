//! Prompt templates for every generation call.
//!
//! A [`PromptTemplate`] pairs a body containing `{{KEY}}` placeholders with
//! the typed [`ContextKey`] set it requires. Filling validates the context
//! before substitution and rejects any residual placeholder afterwards, so a
//! template bug surfaces as a typed error instead of literal `{{...}}` text
//! reaching the generator.

use crate::context::{ContextKey, StageContext};
use crate::errors::PipelineError;

/// Section names the templates ask the generator to emit. The passes parse
/// responses against these same names.
pub mod sections {
    pub const FACTCHECK_REPORT: &str = "FACTCHECK_REPORT";
    pub const CORRECTED_ARTICLE: &str = "CORRECTED_ARTICLE";
    pub const ARTICLE: &str = "ARTICLE";
    pub const REVIEW_REPORT: &str = "REVIEW_REPORT";
    pub const CHANGES: &str = "CHANGES";
    pub const VERIFICATION_REPORT: &str = "VERIFICATION_REPORT";
    pub const ARTICLE_FORMATTED: &str = "ARTICLE_FORMATTED";
    pub const POLL: &str = "POLL";
    pub const PUBLISH_GUIDE: &str = "PUBLISH_GUIDE";
    pub const DESCRIPTION_OPTIONS: &str = "DESCRIPTION_OPTIONS";
}

/// Marker prefixes carried on review findings to classify who must respond.
pub mod markers {
    /// Factual finding; the fact role responds.
    pub const FACT: &str = "🔍";
    /// Writing-quality finding; the writing role responds.
    pub const WRITING: &str = "🖊️";
    /// Finding needing both perspectives.
    pub const BOTH: &str = "🔀";
    /// Unresolved item in the consensus document.
    pub const PENDING: &str = "⏳";
    /// Weakness-scan verdict that short-circuits the iterate loop.
    pub const ALL_STRONG: &str = "VERDICT: ALL_STRONG";
    /// Comparison verdict that ends the iterate loop.
    pub const CONVERGED: &str = "CONVERGED";
    pub const NOT_CONVERGED: &str = "NOT_CONVERGED";
}

/// A named prompt body plus the context keys it needs.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub required: &'static [ContextKey],
    body: &'static str,
}

impl PromptTemplate {
    /// Substitute every required key's value into the body.
    ///
    /// Fails if the context lacks a required key, or if any `{{...}}`
    /// placeholder survives substitution.
    pub fn fill(&self, ctx: &StageContext) -> Result<String, PipelineError> {
        let mut out = self.body.to_string();
        for key in self.required {
            let value = ctx
                .get(*key)
                .ok_or_else(|| PipelineError::MissingContextKey {
                    template: self.name.to_string(),
                    key: key.placeholder().to_string(),
                })?;
            out = out.replace(&format!("{{{{{}}}}}", key.placeholder()), value);
        }
        if let Some(start) = out.find("{{") {
            let end = out[start..].find("}}").map(|e| start + e + 2).unwrap_or(out.len());
            return Err(PipelineError::UnresolvedPlaceholder {
                template: self.name.to_string(),
                placeholder: out[start..end].to_string(),
            });
        }
        Ok(out)
    }
}

use ContextKey as K;

pub const DRAFT: PromptTemplate = PromptTemplate {
    name: "draft",
    required: &[
        K::SharedContext,
        K::Persona,
        K::PersonaName,
        K::Date,
        K::SeriesLessons,
        K::Materials,
    ],
    body: r#"You are writing a full article draft as the persona described below.

{{SHARED_CONTEXT}}

## Persona (write in this voice throughout)

{{PERSONA}}

You are {{PERSONA_NAME}}. Today's date is {{DATE}}.

## Lessons from earlier articles in this series

{{SERIES_LESSONS}}

## Reference material

{{MATERIALS}}

## Task

Write the complete article draft. Ground every claim in the reference
material; where the material is silent, research before asserting. Follow the
style rules and apply the series lessons. Output only the article text, no
commentary before or after."#,
};

pub const FACTCHECK: PromptTemplate = PromptTemplate {
    name: "factcheck",
    required: &[K::SharedContext, K::ArticleDraft, K::Materials],
    body: r#"You are a rigorous fact checker.

{{SHARED_CONTEXT}}

## Article draft to check

{{ARTICLE_DRAFT}}

## Reference material

{{MATERIALS}}

## Task

Verify every factual claim in the draft against the reference material and,
where needed, web research. Correct what is wrong directly in the article
text; flag what you cannot verify.

Output exactly two sections:

===FACTCHECK_REPORT===
One entry per claim checked: the claim, your verdict (confirmed / corrected /
unverifiable), and the evidence.

===CORRECTED_ARTICLE===
The full corrected article text."#,
};

pub const CRITIQUE: PromptTemplate = PromptTemplate {
    name: "critique",
    required: &[K::SharedContext, K::ArticleFactchecked, K::Persona, K::SeriesLessons],
    body: r#"You are a demanding editor reviewing an article before publication.

{{SHARED_CONTEXT}}

## Article

{{ARTICLE_FACTCHECKED}}

## Persona the article must hold

{{PERSONA}}

## Lessons from earlier articles

{{SERIES_LESSONS}}

## Task

Review the article for factual soundness, argument quality, structure, and
voice. Also research the topic independently for anything the article missed.

Output one section:

===REVIEW_REPORT===
A numbered list of findings. Prefix each finding with exactly one category
marker:
  🔍 factual issue (needs the fact perspective)
  🖊️ writing issue (needs the writing perspective)
  🔀 issue needing both perspectives
For each finding give the location, the problem, and a concrete
recommendation.

After the list, add two free-form sections:

### Fixes required (this article)
Anything this article still needs before publication, one item per line.

### Notes for the next article
Recurring weaknesses to avoid and techniques that worked, phrased as
instructions to the next draft's writer."#,
};

pub const NEGOTIATE_RESPOND: PromptTemplate = PromptTemplate {
    name: "negotiate_respond",
    required: &[K::SharedContext, K::ReviewReport, K::ArticleFactchecked, K::ConsensusDoc],
    body: r#"You are one side of an editorial negotiation over review findings.

{{SHARED_CONTEXT}}

## Review report

{{REVIEW_REPORT}}

## Article under discussion

{{ARTICLE_FACTCHECKED}}

## Consensus document so far

{{CONSENSUS_DOC}}

## Task

For each finding assigned to your perspective that is still marked ⏳ pending
in the consensus document, state whether you accept, reject, or amend the
recommendation, with your reasoning. Be specific; cite the article text.
Output your responses as plain text, one block per finding."#,
};

pub const NEGOTIATE_EVALUATE: PromptTemplate = PromptTemplate {
    name: "negotiate_evaluate",
    required: &[K::SharedContext, K::ReviewReport, K::ArticleFactchecked, K::ConsensusDoc],
    body: r#"You are the moderator of an editorial negotiation.

{{SHARED_CONTEXT}}

## Review report

{{REVIEW_REPORT}}

## Article under discussion

{{ARTICLE_FACTCHECKED}}

## Consensus document with the latest responses

{{CONSENSUS_DOC}}

## Task

Rewrite the consensus document. For every finding record the agreed
resolution where the responses converge. Mark each finding that still lacks
agreement with a leading ⏳ on its line. Do not invent resolutions; carry
disagreements forward as pending. Output only the updated consensus
document."#,
};

pub const NEGOTIATE_REVISE: PromptTemplate = PromptTemplate {
    name: "negotiate_revise",
    required: &[K::SharedContext, K::Article, K::ConsensusDoc],
    body: r#"You are revising an article to implement agreed editorial decisions.

{{SHARED_CONTEXT}}

## Current article

{{ARTICLE}}

## Consensus document (the agreed resolutions)

{{CONSENSUS_DOC}}

## Task

Apply every agreed resolution to the article. Change nothing that the
consensus document does not call for. Output exactly two sections:

===ARTICLE===
The full revised article text.

===CHANGES===
A numbered list of the edits you made, each tied to the resolution it
implements."#,
};

pub const NEGOTIATE_VERIFY: PromptTemplate = PromptTemplate {
    name: "negotiate_verify",
    required: &[
        K::SharedContext,
        K::ArticleBefore,
        K::ArticleAfter,
        K::ConsensusDoc,
        K::ChangeList,
    ],
    body: r#"You are auditing a revision against the decisions that mandated it.

{{SHARED_CONTEXT}}

## Article before revision

{{ARTICLE_BEFORE}}

## Article after revision

{{ARTICLE_AFTER}}

## Consensus document

{{CONSENSUS_DOC}}

## Claimed change list

{{CHANGE_LIST}}

## Task

Check that every agreed resolution was actually applied, that no unagreed
change slipped in, and that the claimed change list matches the real diff.
Output one section:

===VERIFICATION_REPORT===
Per resolution: applied / not applied / applied incorrectly, with evidence.
End with a one-line overall verdict."#,
};

pub const ITERATE_WEAKNESS: PromptTemplate = PromptTemplate {
    name: "iterate_weakness",
    required: &[K::SharedContext, K::Article, K::Materials],
    body: r#"You are hunting for the weakest parts of an article.

{{SHARED_CONTEXT}}

## Article

{{ARTICLE}}

## Reference material

{{MATERIALS}}

## Task

Identify the two or three weakest sections: thin evidence, hand-waved
arguments, missing counterpoints, flat prose. For each, say what is weak and
what stronger material would fix it.

If every section is genuinely strong, output exactly the line
VERDICT: ALL_STRONG
and nothing else. Otherwise output your weakness report as plain text."#,
};

pub const ITERATE_RESEARCH: PromptTemplate = PromptTemplate {
    name: "iterate_research",
    required: &[K::SharedContext, K::Article, K::WeaknessReport, K::MaterialsSummary],
    body: r#"You are doing targeted research to shore up an article's weak sections.

{{SHARED_CONTEXT}}

## Article

{{ARTICLE}}

## Weakness report

{{WEAKNESS_REPORT}}

## Summary of material already used

{{MATERIALS_SUMMARY}}

## Task

For each weakness, find concrete supporting material: data, examples,
citations, counterarguments. Prefer sources not already in the material
summary. Output your findings as plain text, grouped by weakness."#,
};

pub const ITERATE_REWRITE: PromptTemplate = PromptTemplate {
    name: "iterate_rewrite",
    required: &[K::SharedContext, K::Article, K::WeaknessReport, K::TargetedResearch, K::Persona],
    body: r#"You are rewriting an article's weak sections using fresh research.

{{SHARED_CONTEXT}}

## Current article

{{ARTICLE}}

## Weakness report

{{WEAKNESS_REPORT}}

## Targeted research

{{TARGETED_RESEARCH}}

## Persona (keep this voice)

{{PERSONA}}

## Task

Rewrite only the weak sections, working in the research where it genuinely
strengthens them. Leave strong sections untouched. Output one section:

===ARTICLE===
The full article text with the rewritten sections in place."#,
};

pub const ITERATE_COMPARE: PromptTemplate = PromptTemplate {
    name: "iterate_compare",
    required: &[K::SharedContext, K::ArticlePrev, K::ArticleCurr],
    body: r#"You are judging whether a rewrite actually improved an article.

{{SHARED_CONTEXT}}

## Previous version

{{ARTICLE_PREV}}

## Current version

{{ARTICLE_CURR}}

## Task

Compare the two versions section by section. Then give a one-line verdict as
the final line of your output:
CONVERGED — the rewrite changed little of substance; further rounds are not
worth running.
NOT_CONVERGED — the rewrite made material improvements; another round may
help.
Output the comparison followed by the verdict line."#,
};

pub const ASSEMBLE: PromptTemplate = PromptTemplate {
    name: "assemble",
    required: &[
        K::SharedContext,
        K::ArticleDraft,
        K::FactcheckReport,
        K::ReviewReport,
        K::LatestArticle,
        K::ConsensusDoc,
    ],
    body: r#"You are assembling the final article from the pipeline's outputs.

{{SHARED_CONTEXT}}

## Original draft

{{ARTICLE_DRAFT}}

## Fact-check report

{{FACTCHECK_REPORT}}

## Review report

{{REVIEW_REPORT}}

## Latest article text

{{LATEST_ARTICLE}}

## Consensus document

{{CONSENSUS_DOC}}

## Task

Produce the final article and its publication deliverables. Start from the
latest article text; fold in any correction from the fact-check report or
agreed resolution from the consensus document that it still misses. Do not
reintroduce anything the pipeline removed. Output exactly five sections:

===ARTICLE===
The complete final article text.

===ARTICLE_FORMATTED===
The article formatted for the publishing platform.

===POLL===
One reader poll: a question tied to the article plus 3-4 answer options.

===PUBLISH_GUIDE===
Step-by-step publishing instructions: title, tags, timing, cover note.

===DESCRIPTION_OPTIONS===
Three alternative one-paragraph descriptions for the article listing."#,
};
