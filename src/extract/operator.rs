// src/extract/operator.rs

//! Best-effort operator detection by keyword.

use crate::utils::text::{contains_word, fold_locale};

/// Matches known operator names as whole words in folded text.
#[derive(Debug, Clone, Default)]
pub struct OperatorMatcher {
    /// (display name, folded name), in configured priority order
    names: Vec<(String, String)>,
}

impl OperatorMatcher {
    pub fn new(names: &[String]) -> Self {
        Self {
            names: names
                .iter()
                .map(|n| (n.trim().to_string(), fold_locale(n)))
                .filter(|(_, folded)| !folded.is_empty())
                .collect(),
        }
    }

    /// First configured operator mentioned in the text.
    pub fn detect(&self, text: &str) -> Option<&str> {
        let folded = fold_locale(text);
        self.names
            .iter()
            .find(|(_, name)| contains_word(&folded, name))
            .map(|(display, _)| display.as_str())
    }
}
