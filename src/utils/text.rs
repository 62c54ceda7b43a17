// src/utils/text.rs

//! Text and locale normalization.
//!
//! `normalize` produces display text; `fold_locale` produces a comparison key
//! that collapses Turkish dotted/dotless i and strips diacritics, so that
//! "İSTANBUL", "Istanbul" and "istanbul" all compare equal.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize, lowercase with i/İ/ı collapsed to `i`, then strip combining marks.
///
/// Only used for comparison and filtering, never for display.
pub fn fold_locale(text: &str) -> String {
    let mut lowered = String::with_capacity(text.len());
    for ch in normalize(text).chars() {
        match ch {
            'İ' | 'I' | 'ı' => lowered.push('i'),
            other => lowered.extend(other.to_lowercase()),
        }
    }

    lowered.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Uppercase the first letter of every space-separated word.
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `needle` occurs in `haystack` delimited by non-alphanumeric characters.
///
/// Both arguments are expected to be folded already.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
