// src/extract/mod.rs

//! Field extractors.
//!
//! Each field is resolved by an ordered chain of independent strategies,
//! evaluated lazily and short-circuiting at the first one that yields a value.

pub mod dates;
pub mod operator;
pub mod price;
pub mod route;

pub use dates::DateExtractor;
pub use operator::OperatorMatcher;
pub use price::extract_price;
pub use route::{RouteExtractor, split_route};

type Step<'a, T> = (&'static str, Box<dyn FnOnce() -> Option<T> + 'a>);

/// Ordered fallback chain of named strategies.
pub struct Chain<'a, T> {
    steps: Vec<Step<'a, T>>,
}

impl<'a, T> Chain<'a, T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a strategy; it only runs if every earlier one came up empty.
    pub fn then(mut self, name: &'static str, strategy: impl FnOnce() -> Option<T> + 'a) -> Self {
        self.steps.push((name, Box::new(strategy)));
        self
    }

    /// Run strategies in order and return the first hit with its name.
    pub fn resolve(self) -> Option<(&'static str, T)> {
        for (name, strategy) in self.steps {
            if let Some(value) = strategy() {
                return Some((name, value));
            }
        }
        None
    }
}

impl<T> Default for Chain<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
