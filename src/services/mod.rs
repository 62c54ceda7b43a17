//! Service layer for the deal watcher.
//!
//! This module contains the business logic for:
//! - Page fetching (`HttpFetcher`, `RenderFetcher`, `FallbackFetcher`)
//! - Listing discovery (`ListingDiscoverer`)
//! - Detail resolution (`DetailResolver`)
//! - Notification (`Notifier` over a `Transport`)

pub mod detail;
pub mod discovery;
pub mod fetch;
pub mod notifier;
pub mod transport;

pub use detail::DetailResolver;
pub use discovery::{Discovery, IndexPage, ListingDiscoverer};
pub use fetch::{FallbackFetcher, HttpFetcher, PageFetcher, RenderFetcher, build_fetcher};
pub use notifier::{MessageFormatter, Notifier, NotifyOutcome};
pub use transport::{ConsoleTransport, TelegramTransport, Transport, TransportError};
