//! Pipeline entry points for watcher operations.
//!
//! - `run_watch`: Discover, resolve, filter, notify and commit listings
//! - `inspect_listing`: Resolve one detail page and render its message
//! - `run_validate`: Load and check the configuration

pub mod filter;
pub mod inspect;
pub mod run;
pub mod validate;

pub use filter::{Filter, Rejection};
pub use inspect::inspect_listing;
pub use run::{RunOptions, RunSummary, run_watch};
pub use validate::run_validate;
