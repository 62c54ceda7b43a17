//! Listing candidates and resolved offer records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::url::canonical_identity;

/// Origin/destination pair. Either side may be empty when unresolvable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// Both sides unresolved.
    pub fn is_empty(&self) -> bool {
        self.origin.is_empty() && self.destination.is_empty()
    }

    /// Both sides resolved.
    pub fn is_complete(&self) -> bool {
        !self.origin.is_empty() && !self.destination.is_empty()
    }
}

/// A displayed price and its whole-unit amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Whole currency units; never zero for a resolved price
    pub amount: u64,
    /// Text as displayed on the site, e.g. "3.299 TL"
    pub text: String,
}

/// One validity window of an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Whole days between start and end
    pub days: i64,
    /// Display line, e.g. "24 Kasım – 01 Aralık (7 Gün)"
    pub label: String,
}

/// A discovered detail-page address plus whatever the index card showed.
///
/// Lives for one run only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingCandidate {
    /// Absolute address, fragment removed
    pub url: String,
    /// Visible text of the anchor that linked to the page
    pub anchor_text: String,
    /// Price shown on the card, if any
    pub price: Option<Price>,
    /// "Posted"/"updated" text shown on the card, if any
    pub posted_text: Option<String>,
}

impl ListingCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// The canonical structured offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable key derived from the canonical address
    pub identity: String,
    /// Address the record was resolved from
    pub url: String,
    pub origin: String,
    pub destination: String,
    /// Whole currency units; 0 means unresolved, not free
    pub price: u64,
    /// Price as displayed; empty when unresolved
    pub price_text: String,
    pub date_ranges: Vec<DateRange>,
    /// Optional metadata such as the detected operator
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Record {
    /// Create an empty record for an address.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            identity: canonical_identity(&url),
            url,
            origin: String::new(),
            destination: String::new(),
            price: 0,
            price_text: String::new(),
            date_ranges: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.origin = route.origin;
        self.destination = route.destination;
        self
    }

    pub fn with_price(mut self, price: Option<Price>) -> Self {
        if let Some(price) = price {
            self.price = price.amount;
            self.price_text = price.text;
        }
        self
    }

    pub fn has_price(&self) -> bool {
        self.price > 0
    }

    /// Date lines in display order.
    pub fn date_labels(&self) -> Vec<&str> {
        self.date_ranges.iter().map(|r| r.label.as_str()).collect()
    }

    /// Hex SHA-256 over origin, destination, price and date ranges.
    ///
    /// Identity and `extra` are excluded, so metadata-only differences never
    /// count as a change.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let price = self.price.to_string();
        for part in [
            self.origin.as_str(),
            self.destination.as_str(),
            price.as_str(),
            self.price_text.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        for range in &self.date_ranges {
            hasher.update(range.label.as_bytes());
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut record = Record::new("https://ucuzaucak.net/ilan/istanbul-tokyo/")
            .with_route(Route::new("İstanbul", "Tokyo"))
            .with_price(Some(Price {
                amount: 19920,
                text: "19.920 TL".into(),
            }));
        record.date_ranges = vec![DateRange {
            start: NaiveDate::from_ymd_opt(2025, 11, 24).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            days: 7,
            label: "24 Kasım – 01 Aralık (7 Gün)".into(),
        }];
        record
    }

    #[test]
    fn test_identity_is_canonical_address() {
        let record = sample();
        assert_eq!(record.identity, "https://ucuzaucak.net/ilan/istanbul-tokyo");
        assert_eq!(record.url, "https://ucuzaucak.net/ilan/istanbul-tokyo/");
    }

    #[test]
    fn test_fingerprint_ignores_extra_and_identity() {
        let a = sample();
        let mut b = sample();
        b.extra.insert("operator".into(), "Pegasus".into());
        b.identity = "https://elsewhere/x".into();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_content_fields() {
        let base = sample().fingerprint();

        let mut origin = sample();
        origin.origin = "Ankara".into();
        let mut destination = sample();
        destination.destination = "Osaka".into();
        let mut price = sample();
        price.price = 18000;
        price.price_text = "18.000 TL".into();
        let mut dates = sample();
        dates.date_ranges.clear();

        for changed in [origin, destination, price, dates] {
            assert_ne!(changed.fingerprint(), base);
        }
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        let a = Record::new("u").with_route(Route::new("ab", "c"));
        let b = Record::new("u").with_route(Route::new("a", "bc"));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_with_price_none_keeps_unresolved() {
        let record = Record::new("u").with_price(None);
        assert_eq!(record.price, 0);
        assert!(record.price_text.is_empty());
        assert!(!record.has_price());
    }
}
