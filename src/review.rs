//! Review-report analysis: typed findings and the orphan lint.
//!
//! The critique pass marks each finding with a category marker so the
//! negotiation knows which perspective must respond. Items in the report's
//! free-form fixes section that no marked finding covers are reported as
//! orphaned, since only marked findings reach the negotiation. Both
//! analyses are best-effort text scans; they steer the flow but never
//! fail it.

use crate::prompts::markers;
use serde::{Deserialize, Serialize};

/// Which negotiation perspective a finding activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingCategory {
    Fact,
    Writing,
    Both,
}

impl FindingCategory {
    fn from_marker(body: &str) -> Option<(Self, &str)> {
        for (marker, category) in [
            (markers::FACT, Self::Fact),
            (markers::WRITING, Self::Writing),
            (markers::BOTH, Self::Both),
        ] {
            if let Some(rest) = body.strip_prefix(marker) {
                return Some((category, rest.trim_start()));
            }
        }
        None
    }
}

/// One marked finding from a review report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub category: FindingCategory,
    pub summary: String,
}

/// Extract the category-marked finding lines from a review report.
pub fn findings(report: &str) -> Vec<ReviewFinding> {
    report
        .lines()
        .filter_map(finding_body)
        .filter_map(|body| {
            let (category, summary) = FindingCategory::from_marker(body)?;
            (!summary.is_empty()).then(|| ReviewFinding {
                category,
                summary: summary.to_string(),
            })
        })
        .collect()
}

/// Strip leading list decoration (`3.`, `-`, `*`) from a line; `None` when
/// nothing is left.
pub(crate) fn finding_body(line: &str) -> Option<&str> {
    let mut rest = line.trim_start();
    rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    rest = rest.strip_prefix('.').unwrap_or(rest);
    rest = rest.trim_start_matches(['-', '*']).trim_start();
    (!rest.is_empty()).then_some(rest)
}

/// Counts of review findings by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindingScan {
    pub fact: usize,
    pub writing: usize,
    pub both: usize,
}

impl FindingScan {
    pub fn scan(report: &str) -> Self {
        let mut scan = Self::default();
        for finding in findings(report) {
            match finding.category {
                FindingCategory::Fact => scan.fact += 1,
                FindingCategory::Writing => scan.writing += 1,
                FindingCategory::Both => scan.both += 1,
            }
        }
        scan
    }

    pub fn total(&self) -> usize {
        self.fact + self.writing + self.both
    }

    /// Whether the fact perspective has anything to respond to.
    pub fn needs_fact(&self) -> bool {
        self.fact + self.both > 0
    }

    /// Whether the writing perspective has anything to respond to.
    pub fn needs_writing(&self) -> bool {
        self.writing + self.both > 0
    }
}

/// Free-form review sections; the first feeds the orphan lint, the second
/// feeds the per-series lessons log.
pub const FIXES_HEADING: &str = "### Fixes required (this article)";
pub const FORWARD_HEADING: &str = "### Notes for the next article";

/// A named `###` section of the review report, without its heading, running
/// to the next heading or end of text.
pub fn section<'a>(report: &'a str, heading: &str) -> Option<&'a str> {
    let start = report.find(heading)? + heading.len();
    let rest = &report[start..];
    let end = rest.find("\n#").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

// Enough of an item's head to match it against a finding without tripping
// over rephrased tails.
const ORPHAN_MATCH_CHARS: usize = 30;

/// Items in the free-form fixes section that no structured finding covers.
/// Such text would silently never reach the negotiation, so it is surfaced
/// as a warning artifact. Matching is a normalized-prefix containment check;
/// rephrased items may slip through, which is acceptable for a lint.
pub fn orphaned_recommendations(report: &str) -> Vec<String> {
    let Some(fixes) = section(report, FIXES_HEADING) else {
        return Vec::new();
    };
    let finding_texts: Vec<String> = findings(report)
        .into_iter()
        .map(|f| normalize(&f.summary))
        .collect();

    fixes
        .lines()
        .filter_map(finding_body)
        // Marked lines in the fixes section are structured findings already
        .filter(|line| FindingCategory::from_marker(line).is_none())
        .filter(|line| {
            let needle: String = normalize(line).chars().take(ORPHAN_MATCH_CHARS).collect();
            !needle.is_empty() && !finding_texts.iter().any(|f| f.contains(&needle))
        })
        .map(str::to_string)
        .collect()
}

pub(crate) fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
