//! Answer assembly from ranked fragments.
//!
//! Two renderings of the same result list:
//!
//! - **Concatenated**: fragment texts joined by [`FRAGMENT_SEPARATOR`],
//!   used as tool output fed back to the language model.
//! - **Annotated**: numbered, labelled, truncated blocks, used for
//!   human-facing transports.

use crate::models::ScoredFragment;

pub const NO_RESULTS: &str = "No results found.";
pub const FRAGMENT_SEPARATOR: &str = "\n---\n";
/// Characters of fragment text kept per annotated block.
pub const SNIPPET_CHAR_BUDGET: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssembleMode {
    Concatenated,
    Annotated,
}

pub fn assemble(results: &[ScoredFragment], mode: AssembleMode) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    match mode {
        AssembleMode::Concatenated => results
            .iter()
            .map(|r| r.fragment.text.as_str())
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR),
        AssembleMode::Annotated => annotate(results).join("\n"),
    }
}

/// One block per result: `Result {i}[ - {title}] from {label}:\n{text}\n`.
///
/// An empty list yields a single [`NO_RESULTS`] block.
pub fn annotate(results: &[ScoredFragment]) -> Vec<String> {
    if results.is_empty() {
        return vec![NO_RESULTS.to_string()];
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let fragment = &r.fragment;
            let mut header = format!("Result {}", i + 1);
            if let Some(title) = fragment.title() {
                header.push_str(" - ");
                header.push_str(title);
            }
            format!(
                "{} from {}:\n{}\n",
                header,
                fragment.label(),
                truncate_chars(&fragment.text, SNIPPET_CHAR_BUDGET)
            )
        })
        .collect()
}

/// First `max` chars of `text`, with `...` appended when anything was cut.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{keys, Fragment, Metadata};
    use serde_json::Value;

    fn result(text: &str, fields: &[(&str, &str)]) -> ScoredFragment {
        let mut metadata = Metadata::new();
        for (k, v) in fields {
            metadata.insert(k.to_string(), Value::String(v.to_string()));
        }
        ScoredFragment {
            fragment: Fragment {
                id: "id".into(),
                text: text.into(),
                metadata,
                hash: String::new(),
            },
            score: 0.5,
        }
    }

    #[test]
    fn empty_results_in_both_modes() {
        assert_eq!(assemble(&[], AssembleMode::Concatenated), NO_RESULTS);
        assert_eq!(assemble(&[], AssembleMode::Annotated), NO_RESULTS);
        assert_eq!(annotate(&[]), vec![NO_RESULTS.to_string()]);
    }

    #[test]
    fn concatenated_joins_with_separator() {
        let results = vec![result("one", &[]), result("two", &[])];
        assert_eq!(assemble(&results, AssembleMode::Concatenated), "one\n---\ntwo");
    }

    #[test]
    fn annotated_numbers_labels_and_titles() {
        let results = vec![
            result("fn main() {}", &[(keys::PATH, "src/main.rs")]),
            result(
                "Install it.",
                &[(keys::SOURCE, "https://docs.example.com/install"), (keys::TITLE, "Install")],
            ),
            result("orphan", &[]),
        ];
        let blocks = annotate(&results);
        assert_eq!(blocks[0], "Result 1 from src/main.rs:\nfn main() {}\n");
        assert_eq!(
            blocks[1],
            "Result 2 - Install from https://docs.example.com/install:\nInstall it.\n"
        );
        assert_eq!(blocks[2], "Result 3 from Unknown:\norphan\n");
    }

    #[test]
    fn annotated_truncates_long_text() {
        let long = "é".repeat(SNIPPET_CHAR_BUDGET + 10);
        let blocks = annotate(&[result(&long, &[(keys::PATH, "a.rs")])]);
        let body = blocks[0]
            .strip_prefix("Result 1 from a.rs:\n")
            .unwrap()
            .strip_suffix('\n')
            .unwrap();
        assert!(body.ends_with("..."));
        assert_eq!(body.chars().count(), SNIPPET_CHAR_BUDGET + 3);
    }

    #[test]
    fn exact_budget_is_not_truncated() {
        let text = "x".repeat(SNIPPET_CHAR_BUDGET);
        let blocks = annotate(&[result(&text, &[])]);
        assert!(!blocks[0].contains("..."));
    }
}
