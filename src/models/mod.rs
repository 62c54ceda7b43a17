// src/models/mod.rs

//! Domain models for the deal watcher.
//!
//! This module contains the configuration tree and the listing/record types
//! that flow through the pipeline.

mod config;
mod record;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, FilterConfig, LoggingConfig, MessageFormat, NotifierConfig,
    PathsConfig, SiteConfig,
};
pub use record::{DateRange, ListingCandidate, Price, Record, Route};
