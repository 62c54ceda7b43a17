// src/extract/dates.rs

//! Validity date-range extraction for Turkish listing text.
//!
//! Matching runs on folded text, so "Kasım", "KASIM" and "kasim" resolve to
//! the same month. Labels are rebuilt from the canonical month names.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::models::DateRange;
use crate::utils::text::fold_locale;

/// Upper bound on ranges kept per page.
pub const MAX_RANGES: usize = 50;

/// Longest plausible offer window, in days.
pub const MAX_SPAN_DAYS: i64 = 400;

/// Canonical month names with the folded spellings that resolve to them.
const MONTHS: [(&str, &[&str]); 12] = [
    ("Ocak", &["ocak", "oca"]),
    ("Şubat", &["subat", "sub", "sbt"]),
    ("Mart", &["mart", "mar"]),
    ("Nisan", &["nisan", "nis"]),
    ("Mayıs", &["mayis", "may"]),
    ("Haziran", &["haziran", "haz"]),
    ("Temmuz", &["temmuz", "tem"]),
    ("Ağustos", &["agustos", "agu", "ags"]),
    ("Eylül", &["eylul", "eyl"]),
    ("Ekim", &["ekim", "eki"]),
    ("Kasım", &["kasim", "kas"]),
    ("Aralık", &["aralik", "ara"]),
];

/// `<day> <month> [weekday] <sep> <day> <month> [weekday] [(<n> gün)]`
static RANGE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2})\s*(\p{L}+)\.?(?:\s+\p{L}+\.?)?\s*[-–—~→]\s*(\d{1,2})\s*(\p{L}+)\.?(?:\s+\p{L}+\.?)?(?:\s*\(\s*\d+\s*\p{L}+\s*\))?",
    )
    .ok()
});

/// Resolve a folded month spelling to its 1-based number.
pub fn month_number(folded: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|(_, spellings)| spellings.contains(&folded))
        .map(|idx| idx as u32 + 1)
}

fn month_name(month: u32) -> &'static str {
    MONTHS
        .get(month.saturating_sub(1) as usize)
        .map(|(name, _)| *name)
        .unwrap_or_default()
}

/// Extracts date ranges, anchoring both ends to a reference year.
#[derive(Debug, Clone, Copy)]
pub struct DateExtractor {
    year: i32,
    max_ranges: usize,
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::for_year(Local::now().year())
    }
}

impl DateExtractor {
    pub fn for_year(year: i32) -> Self {
        Self {
            year,
            max_ranges: MAX_RANGES,
        }
    }

    pub fn with_max_ranges(mut self, max_ranges: usize) -> Self {
        self.max_ranges = max_ranges;
        self
    }

    /// Ranges found in one text block, first appearance order, deduplicated.
    pub fn extract(&self, text: &str) -> Vec<DateRange> {
        self.extract_all([text])
    }

    /// Ranges across several blocks, deduplicated by label and capped.
    pub fn extract_all<'a>(&self, blocks: impl IntoIterator<Item = &'a str>) -> Vec<DateRange> {
        let Some(pattern) = RANGE_PATTERN.as_ref() else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut ranges = Vec::new();
        for block in blocks {
            let folded = fold_locale(block);
            for caps in pattern.captures_iter(&folded) {
                if ranges.len() >= self.max_ranges {
                    return ranges;
                }
                let parts = (
                    caps.get(1).map(|m| m.as_str()),
                    caps.get(2).map(|m| m.as_str()),
                    caps.get(3).map(|m| m.as_str()),
                    caps.get(4).map(|m| m.as_str()),
                );
                let (Some(d1), Some(m1), Some(d2), Some(m2)) = parts else {
                    continue;
                };
                let Some(range) = self.build(d1, m1, d2, m2) else {
                    continue;
                };
                if seen.insert(range.label.clone()) {
                    ranges.push(range);
                }
            }
        }
        ranges
    }

    /// Build a range from raw captures; `None` for anything unresolvable.
    fn build(&self, day1: &str, month1: &str, day2: &str, month2: &str) -> Option<DateRange> {
        let (m1, m2) = (month_number(month1)?, month_number(month2)?);
        let (d1, d2): (u32, u32) = (day1.parse().ok()?, day2.parse().ok()?);

        let start = NaiveDate::from_ymd_opt(self.year, m1, d1)?;
        let mut end = NaiveDate::from_ymd_opt(self.year, m2, d2)?;
        if end < start {
            end = NaiveDate::from_ymd_opt(self.year + 1, m2, d2)?;
        }

        let days = (end - start).num_days();
        if days <= 0 || days > MAX_SPAN_DAYS {
            return None;
        }

        let label = format!(
            "{:02} {} – {:02} {} ({} Gün)",
            d1,
            month_name(m1),
            d2,
            month_name(m2),
            days
        );
        Some(DateRange {
            start,
            end,
            days,
            label,
        })
    }
}
