// src/pipeline/filter.rs

//! Filter engine.
//!
//! All rules compare folded text, so "ISTANBUL", "İstanbul" and "istanbul"
//! match each other. Rules are conjunctive; an empty rule never excludes.

use crate::models::{FilterConfig, Record};
use crate::utils::text::fold_locale;

/// Why a record was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Departure,
    Arrival,
    Price,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::Departure => "departure",
            Rejection::Arrival => "arrival",
            Rejection::Price => "price",
        }
    }
}

/// Compiled inclusion rules.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    departure: String,
    arrivals: Vec<String>,
    max_price: u64,
}

impl Filter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            departure: fold_locale(&config.departure),
            arrivals: config
                .arrivals
                .iter()
                .map(|a| fold_locale(a))
                .filter(|a| !a.is_empty())
                .collect(),
            max_price: config.max_price,
        }
    }

    /// First rule the record fails, or `None` when it passes.
    ///
    /// An unresolved price (zero) is never excluded by the ceiling.
    pub fn evaluate(&self, record: &Record) -> Option<Rejection> {
        if !self.departure.is_empty() && !fold_locale(&record.origin).contains(&self.departure) {
            return Some(Rejection::Departure);
        }

        if !self.arrivals.is_empty() {
            let destination = fold_locale(&record.destination);
            if !self.arrivals.iter().any(|a| destination.contains(a.as_str())) {
                return Some(Rejection::Arrival);
            }
        }

        if self.max_price > 0 && record.price > self.max_price {
            return Some(Rejection::Price);
        }

        None
    }

    pub fn accepts(&self, record: &Record) -> bool {
        self.evaluate(record).is_none()
    }

    /// Subset of `records` that passes every rule, order preserved.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().filter(|r| self.accepts(r)).collect()
    }
}
