// src/pipeline/run.rs

//! Run orchestrator.
//!
//! One run is strictly sequential: each candidate is resolved, filtered,
//! checked, notified and committed before the next one starts. A failure
//! on one candidate is logged and counted, never propagated.

use chrono::Utc;

use crate::models::{Config, Record};
use crate::pipeline::filter::Filter;
use crate::services::{DetailResolver, ListingDiscoverer, Notifier, NotifyOutcome, PageFetcher};
use crate::storage::StateStore;
use crate::utils::log;
use crate::utils::retry::pace;

/// Knobs for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Deliver nothing durable: no state is committed
    pub dry_run: bool,
    /// Overrides `site.max_listings`
    pub limit: Option<usize>,
}

/// Per-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub resolved: usize,
    pub filtered: usize,
    pub unchanged: usize,
    pub notified: usize,
    pub index_failures: usize,
    pub fetch_failures: usize,
    pub notify_failures: usize,
    pub commit_failures: usize,
}

impl RunSummary {
    /// Whether any candidate ran into an error.
    pub fn has_failures(&self) -> bool {
        self.fetch_failures + self.notify_failures + self.commit_failures > 0
    }

    fn log(&self, elapsed_secs: i64) {
        log::summary(
            "Run complete",
            &[
                ("Discovered", self.discovered.to_string()),
                ("Resolved", self.resolved.to_string()),
                ("Filtered out", self.filtered.to_string()),
                ("Unchanged", self.unchanged.to_string()),
                ("Notified", self.notified.to_string()),
                ("Index pages failed", self.index_failures.to_string()),
                ("Fetch failures", self.fetch_failures.to_string()),
                ("Notify failures", self.notify_failures.to_string()),
                ("Commit failures", self.commit_failures.to_string()),
                ("Elapsed", format!("{elapsed_secs}s")),
            ],
        );
    }
}

/// Run one full watch pass.
///
/// The fetcher is owned by the run and closed when it ends, whatever
/// happened to individual candidates.
pub async fn run_watch(
    config: &Config,
    fetcher: Box<dyn PageFetcher>,
    store: &mut dyn StateStore,
    notifier: &Notifier,
    options: &RunOptions,
) -> RunSummary {
    let start_time = Utc::now();
    log::header(if options.dry_run {
        "Deal watch (dry run)"
    } else {
        "Deal watch"
    });

    let summary = watch(config, fetcher.as_ref(), store, notifier, options).await;
    fetcher.close().await;

    log::separator();
    summary.log((Utc::now() - start_time).num_seconds());
    summary
}

async fn watch(
    config: &Config,
    fetcher: &dyn PageFetcher,
    store: &mut dyn StateStore,
    notifier: &Notifier,
    options: &RunOptions,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let limit = options.limit.unwrap_or(config.site.max_listings);

    log::step(1, 2, "Discovering listings");
    let discovery = ListingDiscoverer::from_config(&config.site)
        .discover(fetcher, &config.index_urls(), limit)
        .await;
    summary.discovered = discovery.candidates.len();
    summary.index_failures = discovery.failed_pages;
    log::sub_item(&format!(
        "{} candidates from {} index pages",
        summary.discovered,
        discovery.index_pages.len()
    ));

    let resolver = DetailResolver::new(&config.site);
    let filter = Filter::new(&config.filters);
    let total = discovery.candidates.len();

    log::step(2, 2, "Resolving and notifying");
    for (i, candidate) in discovery.candidates.iter().enumerate() {
        pace(config.crawler.delay_min_ms, config.crawler.delay_max_ms).await;

        let record = match resolver
            .resolve(fetcher, candidate, &discovery.index_pages)
            .await
        {
            Ok(record) => record,
            Err(e) if e.is_fetch() => {
                ::log::warn!("[{}/{}] {}", i + 1, total, e);
                summary.fetch_failures += 1;
                continue;
            }
            Err(e) => {
                ::log::error!("[{}/{}] {}: {}", i + 1, total, candidate.url, e);
                summary.fetch_failures += 1;
                continue;
            }
        };
        summary.resolved += 1;
        log::sub_item(&format!("[{}/{}] {}", i + 1, total, describe(&record)));

        if let Some(rejection) = filter.evaluate(&record) {
            ::log::debug!("Filtered out by {} rule: {}", rejection.as_str(), record.url);
            summary.filtered += 1;
            continue;
        }

        let change = store.check(&record);
        if !change.needs_notification() {
            ::log::debug!("Unchanged: {}", record.identity);
            summary.unchanged += 1;
            continue;
        }

        match notifier.notify(&record).await {
            NotifyOutcome::Delivered { attempts } => {
                ::log::info!(
                    "Notified ({}, {} attempt(s)): {}",
                    change.as_str(),
                    attempts,
                    record.url
                );
                summary.notified += 1;
            }
            NotifyOutcome::Failed { reason } => {
                // Left uncommitted so the next run retries it.
                ::log::warn!("Notification failed for {}: {}", record.url, reason);
                summary.notify_failures += 1;
                continue;
            }
        }

        if options.dry_run {
            continue;
        }
        if let Err(e) = store.commit(&record).await {
            ::log::error!("Could not persist state for {}: {}", record.identity, e);
            summary.commit_failures += 1;
        }
    }

    summary
}

fn describe(record: &Record) -> String {
    let price = if record.has_price() {
        record.price_text.as_str()
    } else {
        "no price"
    };
    format!(
        "{} → {} | {} | {} date range(s)",
        if record.origin.is_empty() { "?" } else { record.origin.as_str() },
        if record.destination.is_empty() { "?" } else { record.destination.as_str() },
        price,
        record.date_ranges.len()
    )
}
