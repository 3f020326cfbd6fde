//! Structured output parsing for generator responses.
//!
//! A pass asks the generator to emit one or more named sections, each
//! introduced by a line containing only `===NAME===`. This module splits a
//! response into those sections and reports how much of the expected set was
//! recovered:
//!
//! - [`ParsedOutput::Complete`]: every expected section was present
//! - [`ParsedOutput::Partial`]: some but not all sections were present
//! - [`ParsedOutput::Raw`]: no recognized delimiter at all; the whole text is
//!   assigned to the first expected section name
//!
//! Parsing is idempotent: extracted section content contains no delimiter
//! lines, so re-parsing it yields the same content back.

use std::collections::BTreeMap;

/// Typed result of splitting a response into named sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOutput {
    /// All expected sections present.
    Complete(BTreeMap<String, String>),
    /// Some expected sections present; missing keys read as `None`.
    Partial(BTreeMap<String, String>),
    /// No recognized delimiters. The entire text answers for the first
    /// expected section.
    Raw { section: String, text: String },
}

impl ParsedOutput {
    /// Content of a named section, if it was recovered.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Self::Complete(map) | Self::Partial(map) => map.get(name).map(String::as_str),
            Self::Raw { section, text } => (section == name).then_some(text.as_str()),
        }
    }

    /// Content of a named section, or `""` when missing.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Names of expected sections that were not recovered.
    pub fn missing<'a>(&self, expected: &[&'a str]) -> Vec<&'a str> {
        expected
            .iter()
            .filter(|name| self.get(name).is_none())
            .copied()
            .collect()
    }
}

fn delimiter_name<'a>(line: &str, expected: &[&'a str]) -> Option<&'a str> {
    let trimmed = line.trim();
    expected
        .iter()
        .find(|name| trimmed == format!("==={}===", name))
        .copied()
}

/// Split `text` into the sections named in `expected`.
///
/// Lines before the first delimiter are discarded (they are preamble chatter
/// from the generator). `expected` must be non-empty.
pub fn parse(text: &str, expected: &[&str]) -> ParsedOutput {
    debug_assert!(!expected.is_empty(), "expected section list must not be empty");

    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<&str> = None;
    let mut lines: Vec<&str> = Vec::new();

    let flush = |name: Option<&str>, lines: &mut Vec<&str>, out: &mut BTreeMap<String, String>| {
        if let Some(name) = name {
            out.insert(name.to_string(), lines.join("\n").trim().to_string());
        }
        lines.clear();
    };

    for line in text.lines() {
        if let Some(name) = delimiter_name(line, expected) {
            flush(current, &mut lines, &mut sections);
            current = Some(name);
        } else if current.is_some() {
            lines.push(line);
        }
    }
    flush(current, &mut lines, &mut sections);

    if sections.is_empty() {
        return ParsedOutput::Raw {
            section: expected[0].to_string(),
            text: text.trim().to_string(),
        };
    }

    if expected.iter().all(|name| sections.contains_key(*name)) {
        ParsedOutput::Complete(sections)
    } else {
        ParsedOutput::Partial(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_sections_present() {
        let text = "===REPORT===\nline one\nline two\n===ARTICLE===\nbody text";
        let parsed = parse(text, &["REPORT", "ARTICLE"]);
        assert!(parsed.is_complete());
        assert_eq!(parsed.get("REPORT"), Some("line one\nline two"));
        assert_eq!(parsed.get("ARTICLE"), Some("body text"));
    }

    #[test]
    fn test_parse_trims_section_content() {
        let text = "===REPORT===\n\n  padded  \n\n===ARTICLE===\n\nbody\n\n";
        let parsed = parse(text, &["REPORT", "ARTICLE"]);
        assert_eq!(parsed.get("REPORT"), Some("padded"));
        assert_eq!(parsed.get("ARTICLE"), Some("body"));
    }

    #[test]
    fn test_parse_no_cross_contamination() {
        let text = "===A===\nalpha\n===B===\nbeta";
        let parsed = parse(text, &["A", "B"]);
        assert!(!parsed.get_or_empty("A").contains("beta"));
        assert!(!parsed.get_or_empty("B").contains("alpha"));
        assert!(!parsed.get_or_empty("A").contains("==="));
    }

    #[test]
    fn test_parse_no_delimiters_falls_back_to_raw() {
        let parsed = parse("just plain text output", &["REPORT", "ARTICLE"]);
        match &parsed {
            ParsedOutput::Raw { section, text } => {
                assert_eq!(section, "REPORT");
                assert_eq!(text, "just plain text output");
            }
            _ => panic!("Expected Raw"),
        }
        // The raw text answers for the first expected name only
        assert_eq!(parsed.get("REPORT"), Some("just plain text output"));
        assert_eq!(parsed.get("ARTICLE"), None);
    }

    #[test]
    fn test_parse_never_empty_for_nonempty_input() {
        let parsed = parse("content without markers", &["ONLY"]);
        assert_eq!(parsed.get("ONLY"), Some("content without markers"));
    }

    #[test]
    fn test_parse_partial_sections() {
        let text = "===REPORT===\nreport only";
        let parsed = parse(text, &["REPORT", "ARTICLE"]);
        assert!(!parsed.is_complete());
        assert_eq!(parsed.get("REPORT"), Some("report only"));
        assert_eq!(parsed.get("ARTICLE"), None);
        assert_eq!(parsed.missing(&["REPORT", "ARTICLE"]), vec!["ARTICLE"]);
    }

    #[test]
    fn test_parse_discards_preamble() {
        let text = "Sure, here is the output:\n===REPORT===\nactual";
        let parsed = parse(text, &["REPORT"]);
        assert_eq!(parsed.get("REPORT"), Some("actual"));
    }

    #[test]
    fn test_parse_delimiter_with_surrounding_whitespace() {
        let text = "  ===REPORT===  \ncontent";
        let parsed = parse(text, &["REPORT"]);
        assert_eq!(parsed.get("REPORT"), Some("content"));
    }

    #[test]
    fn test_parse_unknown_delimiter_treated_as_content() {
        let text = "===REPORT===\nbefore\n===SURPRISE===\nafter";
        let parsed = parse(text, &["REPORT"]);
        assert_eq!(parsed.get("REPORT"), Some("before\n===SURPRISE===\nafter"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = "===REPORT===\nextracted content here\n===ARTICLE===\nbody";
        let first = parse(text, &["REPORT", "ARTICLE"]);
        let extracted = first.get("REPORT").unwrap();

        // Re-parsing extracted content for the same name yields it unchanged
        let second = parse(extracted, &["REPORT"]);
        assert_eq!(second.get("REPORT"), Some(extracted));
    }

    #[test]
    fn test_parse_empty_section_counts_as_present() {
        let text = "===REPORT===\n===ARTICLE===\nbody";
        let parsed = parse(text, &["REPORT", "ARTICLE"]);
        assert!(parsed.is_complete());
        assert_eq!(parsed.get("REPORT"), Some(""));
    }

    #[test]
    fn test_parse_repeated_section_keeps_last() {
        let text = "===REPORT===\nfirst\n===REPORT===\nsecond";
        let parsed = parse(text, &["REPORT"]);
        assert_eq!(parsed.get("REPORT"), Some("second"));
    }
}
