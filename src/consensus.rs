//! The consensus document: the negotiation's growing shared record.
//!
//! Negotiation rounds append responder and moderator output to a single
//! document that only ever grows; the moderator's latest evaluation is the
//! authoritative resolution state. Items the moderator could not settle
//! carry a leading ⏳ marker; the round loop terminates when the pending
//! count reaches zero or the round cap is hit.

use crate::prompts::markers;
use crate::review::finding_body;

/// Count of unresolved items: list items whose body, once the `-`/`*`/`3.`
/// decoration is stripped, starts with the pending marker.
pub fn pending_count(consensus: &str) -> usize {
    consensus
        .lines()
        .filter_map(finding_body)
        .filter(|body| body.starts_with(markers::PENDING))
        .count()
}

/// Builder for the consensus document. Sections are only ever appended, so
/// the rendered document never shrinks within a run; the latest evaluation
/// doubles as the authoritative resolution state.
#[derive(Debug, Clone)]
pub struct ConsensusRecord {
    history: Vec<String>,
    current: String,
}

impl ConsensusRecord {
    pub fn new(topic: &str) -> Self {
        Self {
            history: vec![format!("# Consensus document: {}\n", topic)],
            current: String::new(),
        }
    }

    /// Restore from a previously stored document (resume path).
    pub fn from_existing(document: String) -> Self {
        Self {
            history: vec![document],
            current: String::new(),
        }
    }

    /// Append one perspective's responses for a round.
    pub fn push_response(&mut self, round: u32, role: &str, content: &str) {
        self.history.push(format!(
            "\n## Round {} — {} responses\n\n{}\n",
            round,
            role,
            content.trim()
        ));
    }

    /// Record the moderator's evaluation. Every evaluation stays in the
    /// document; the latest one is the resolution state the next round
    /// reads.
    pub fn set_evaluation(&mut self, round: u32, evaluation: &str) {
        let body = evaluation.trim().to_string();
        self.history
            .push(format!("\n## Round {} — evaluation\n\n{}\n", round, body));
        self.current = body;
    }

    /// Append a closing section (verification outcome, termination reason).
    pub fn push_final(&mut self, heading: &str, content: &str) {
        self.history
            .push(format!("\n## {}\n\n{}\n", heading, content.trim()));
    }

    /// Unresolved items in the latest evaluation.
    pub fn pending(&self) -> usize {
        pending_count(&self.current)
    }

    /// The full document, every section in arrival order.
    pub fn render(&self) -> String {
        self.history.join("")
    }

    /// The latest resolution state alone, as context for the next call.
    pub fn current_state(&self) -> &str {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_count_marked_lines() {
        let doc = "\
- resolved: fix the date
- ⏳ still arguing about the lede
  - ⏳ currency framing unsettled
3. ⏳ numbered items count too
done ⏳ not a pending line, marker mid-text
";
        assert_eq!(pending_count(doc), 3);
    }

    #[test]
    fn test_pending_count_empty() {
        assert_eq!(pending_count(""), 0);
        assert_eq!(pending_count("all settled"), 0);
    }

    #[test]
    fn test_record_grows_monotonically() {
        let mut record = ConsensusRecord::new("robots");
        let len0 = record.render().len();

        record.push_response(1, "fact", "accept finding 1");
        let len1 = record.render().len();
        assert!(len1 > len0);

        record.set_evaluation(1, "- resolved: finding 1\n- ⏳ finding 2");
        let len2 = record.render().len();
        assert!(len2 > len1);

        record.push_response(2, "writing", "amend finding 2");
        let len3 = record.render().len();
        assert!(len3 > len2);

        // A terse round-two evaluation must still grow the document
        record.set_evaluation(2, "- all ok");
        assert!(record.render().len() > len3);
        // Both evaluations and the round-one responses survive
        assert!(record.render().contains("accept finding 1"));
        assert!(record.render().contains("⏳ finding 2"));
        assert!(record.render().contains("- all ok"));
    }

    #[test]
    fn test_pending_tracks_latest_evaluation() {
        let mut record = ConsensusRecord::new("robots");
        record.set_evaluation(1, "- ⏳ a\n- ⏳ b");
        assert_eq!(record.pending(), 2);
        record.set_evaluation(2, "- resolved: a\n- resolved: b");
        assert_eq!(record.pending(), 0);
    }

    #[test]
    fn test_render_contains_final_section() {
        let mut record = ConsensusRecord::new("robots");
        record.set_evaluation(1, "- resolved: everything");
        record.push_final("Termination", "all items settled after round 1");
        let doc = record.render();
        assert!(doc.contains("## Termination"));
        assert!(doc.contains("all items settled"));
        assert!(doc.contains("- resolved: everything"));
    }

    #[test]
    fn test_from_existing_preserves_document() {
        let record = ConsensusRecord::from_existing("# Consensus document: x\nold".into());
        assert!(record.render().contains("old"));
        assert_eq!(record.pending(), 0);
    }
}
