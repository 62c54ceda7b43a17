// src/services/discovery.rs

//! Listing discoverer.
//!
//! Scans index pages in priority order and collects detail-page links,
//! skipping links placed inside navigational regions.

use std::collections::HashSet;

use url::Url;

use crate::dom::{DomTree, HtmlPage};
use crate::extract::extract_price;
use crate::models::{ListingCandidate, SiteConfig};
use crate::services::fetch::PageFetcher;
use crate::utils::resolve_url;
use crate::utils::text::normalize;
use crate::utils::url::{canonical_identity, is_detail_path, strip_fragment};

/// Tags that mark navigational page regions.
const NAV_TAGS: &[&str] = &["header", "footer", "nav", "aside", "menu"];

/// Class tokens that mark navigational containers.
const NAV_CLASS_HINTS: &[&str] = &["menu", "navbar", "breadcrumb", "sidebar", "pagination"];

/// Card text longer than this is treated as a container of several cards.
const MAX_CARD_TEXT: usize = 240;

/// An index page fetched during discovery, kept for price fallbacks.
#[derive(Debug, Clone)]
pub struct IndexPage {
    pub url: String,
    pub html: String,
}

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Candidates in first-seen order
    pub candidates: Vec<ListingCandidate>,
    /// Index pages that were reachable
    pub index_pages: Vec<IndexPage>,
    /// Index pages that could not be fetched
    pub failed_pages: usize,
}

/// Collects candidate detail addresses from index pages.
#[derive(Debug, Clone)]
pub struct ListingDiscoverer {
    listing_prefix: String,
}

impl ListingDiscoverer {
    pub fn new(listing_prefix: impl Into<String>) -> Self {
        Self {
            listing_prefix: listing_prefix.into(),
        }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self::new(site.listing_prefix.clone())
    }

    /// Scan `index_urls` in order until `limit` candidates are collected.
    ///
    /// An unreachable index page contributes nothing and never fails the pass.
    pub async fn discover(
        &self,
        fetcher: &dyn PageFetcher,
        index_urls: &[String],
        limit: usize,
    ) -> Discovery {
        let mut discovery = Discovery::default();
        let mut seen = HashSet::new();

        for index_url in index_urls {
            if discovery.candidates.len() >= limit {
                break;
            }

            let html = match fetcher.fetch(index_url).await {
                Ok(html) => html,
                Err(e) => {
                    log::warn!("Index page {} unreachable: {}", index_url, e);
                    discovery.failed_pages += 1;
                    continue;
                }
            };

            let before = discovery.candidates.len();
            match Url::parse(index_url) {
                Ok(base) => {
                    let page = HtmlPage::parse(&html);
                    self.collect(&page, &base, limit, &mut seen, &mut discovery.candidates);
                }
                Err(e) => log::warn!("Index page address {} invalid: {}", index_url, e),
            }
            log::info!(
                "{} listing links from {}",
                discovery.candidates.len() - before,
                index_url
            );

            discovery.index_pages.push(IndexPage {
                url: index_url.clone(),
                html,
            });
        }

        discovery
    }

    /// Append detail links from one parsed index page.
    pub fn collect<T: DomTree>(
        &self,
        tree: &T,
        base: &Url,
        limit: usize,
        seen: &mut HashSet<String>,
        out: &mut Vec<ListingCandidate>,
    ) {
        for anchor in tree.select("a[href]") {
            if out.len() >= limit {
                return;
            }
            let Some(href) = tree.attr(anchor, "href") else {
                continue;
            };
            let Some(url) = resolve_url(base, href).map(strip_fragment) else {
                continue;
            };
            if url.host_str() != base.host_str() || !is_detail_path(url.path(), &self.listing_prefix) {
                continue;
            }
            if self.in_navigation(tree, anchor) {
                log::debug!("Skipping navigational link {}", url);
                continue;
            }
            if !seen.insert(canonical_identity(url.as_str())) {
                continue;
            }

            out.push(card_signal(tree, anchor, url.to_string()));
        }
    }

    /// Whether the link sits inside a header, footer, menu or sidebar.
    fn in_navigation<'a, T: DomTree>(&self, tree: &'a T, anchor: T::Node<'a>) -> bool {
        tree.ancestors(anchor).into_iter().any(|node| {
            if NAV_TAGS.contains(&tree.tag(node)) {
                return true;
            }
            if tree.attr(node, "role") == Some("navigation") {
                return true;
            }
            tree.attr(node, "class").is_some_and(|class| {
                class
                    .split_whitespace()
                    .any(|token| NAV_CLASS_HINTS.iter().any(|hint| token.eq_ignore_ascii_case(hint)))
            })
        })
    }
}

/// Candidate with whatever the listing card shows next to the link.
fn card_signal<'a, T: DomTree>(tree: &'a T, anchor: T::Node<'a>, url: String) -> ListingCandidate {
    let mut candidate = ListingCandidate::new(url);
    candidate.anchor_text = tree.text(anchor);

    candidate.price = extract_price(&candidate.anchor_text).or_else(|| {
        tree.parent(anchor)
            .map(|parent| tree.text(parent))
            .filter(|text| text.chars().count() <= MAX_CARD_TEXT)
            .and_then(|text| extract_price(&text))
    });

    candidate.posted_text = tree
        .find_within(anchor, "time")
        .or_else(|| {
            tree.parent(anchor)
                .and_then(|parent| tree.find_within(parent, "time"))
        })
        .map(|time| {
            let text = tree.text(time);
            if text.is_empty() {
                tree.attr(time, "datetime").map(normalize).unwrap_or_default()
            } else {
                text
            }
        })
        .filter(|text| !text.is_empty());

    candidate
}
