// src/extract/price.rs

//! Price extraction.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Price;
use crate::utils::text::normalize;

/// Amount followed by a currency marker: "3.299 TL", "12.450₺", "1 299,90 TRY".
static TRAILING_MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:[.,\x{a0} ]\d{3})+|\d+)(?:,\d{1,2})?\s*(?:TL\b|TRY\b|₺)").ok()
});

/// Currency marker followed by an amount: "₺3.299", "TL 899".
static LEADING_MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:₺|\bTL)\s*(\d{1,3}(?:[.,\x{a0} ]\d{3})+|\d+)(?:,\d{1,2})?").ok()
});

/// First non-zero price in the text, trailing marker preferred.
pub fn extract_price(text: &str) -> Option<Price> {
    find_with(TRAILING_MARKER.as_ref(), text).or_else(|| find_with(LEADING_MARKER.as_ref(), text))
}

fn find_with(pattern: Option<&Regex>, text: &str) -> Option<Price> {
    pattern?.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let amount = digits_value(caps.get(1)?.as_str())?;
        (amount > 0).then(|| Price {
            amount,
            text: normalize(whole.as_str()),
        })
    })
}

/// Integer value of the digits in a grouped number.
fn digits_value(number: &str) -> Option<u64> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
