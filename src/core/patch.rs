//! Sequential search/replace patching for diagram XML
//!
//! This is the executable form of the `edit_diagram` tool contract: edits
//! apply top-to-bottom, each replacing the first literal occurrence of its
//! `search` text. Matching is case-sensitive and whitespace-significant.
//! An edit whose `search` is absent leaves the document unchanged and is
//! reported by index; later edits still apply. Clients fall back to a full
//! `display_diagram` replacement when any edit goes unmatched.

use serde::{Deserialize, Serialize};

/// One search/replace step from an `edit_diagram` tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagramEdit {
    pub search: String,
    pub replace: String,
}

/// Result of applying a batch of edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditOutcome {
    /// Document after all matched edits were applied.
    pub xml: String,
    /// Indexes (into the input edit list) of edits whose search text
    /// was not found.
    pub unmatched: Vec<usize>,
}

impl EditOutcome {
    pub fn fully_applied(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Apply `edits` to `document` in order, first-match-only.
pub fn apply_edits(document: &str, edits: &[DiagramEdit]) -> EditOutcome {
    let mut xml = document.to_string();
    let mut unmatched = Vec::new();

    for (idx, edit) in edits.iter().enumerate() {
        match xml.find(&edit.search) {
            Some(pos) => {
                xml.replace_range(pos..pos + edit.search.len(), &edit.replace);
            }
            None => unmatched.push(idx),
        }
    }

    EditOutcome { xml, unmatched }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(search: &str, replace: &str) -> DiagramEdit {
        DiagramEdit {
            search: search.into(),
            replace: replace.into(),
        }
    }

    #[test]
    fn test_edits_chain_sequentially() {
        // The second edit sees the output of the first.
        let outcome = apply_edits("A", &[edit("A", "B"), edit("B", "C")]);
        assert_eq!(outcome.xml, "C");
        assert!(outcome.fully_applied());
    }

    #[test]
    fn test_first_match_only() {
        let outcome = apply_edits("x y x", &[edit("x", "z")]);
        assert_eq!(outcome.xml, "z y x");
    }

    #[test]
    fn test_unmatched_reported_without_mutation() {
        let outcome = apply_edits("hello", &[edit("absent", "nope"), edit("hello", "world")]);
        assert_eq!(outcome.xml, "world");
        assert_eq!(outcome.unmatched, vec![0]);
        assert!(!outcome.fully_applied());
    }

    #[test]
    fn test_whitespace_is_significant() {
        let outcome = apply_edits("a  b", &[edit("a b", "c")]);
        assert_eq!(outcome.xml, "a  b");
        assert_eq!(outcome.unmatched, vec![0]);
    }

    #[test]
    fn test_case_sensitive() {
        let outcome = apply_edits("<Node/>", &[edit("<node/>", "<leaf/>")]);
        assert_eq!(outcome.unmatched, vec![0]);
    }

    #[test]
    fn test_empty_edit_list() {
        let outcome = apply_edits("<root/>", &[]);
        assert_eq!(outcome.xml, "<root/>");
        assert!(outcome.fully_applied());
    }

    #[test]
    fn test_multiline_literal_match() {
        let doc = "<root>\n  <mxCell id=\"2\"/>\n</root>";
        let outcome = apply_edits(
            doc,
            &[edit("  <mxCell id=\"2\"/>\n", "  <mxCell id=\"2\" value=\"DB\"/>\n")],
        );
        assert_eq!(outcome.xml, "<root>\n  <mxCell id=\"2\" value=\"DB\"/>\n</root>");
    }
}
