// src/services/detail.rs

//! Detail resolver.
//!
//! Turns one candidate address into a [`Record`]. Only a failed fetch is an
//! error; every extraction gap degrades to an empty field.

use url::Url;

use crate::dom::{DomTree, HtmlPage, tree_distance};
use crate::error::Result;
use crate::extract::{Chain, DateExtractor, OperatorMatcher, RouteExtractor, extract_price};
use crate::models::{ListingCandidate, Price, Record, Route, SiteConfig};
use crate::services::discovery::IndexPage;
use crate::services::fetch::PageFetcher;
use crate::utils::resolve_url;
use crate::utils::text::fold_locale;
use crate::utils::url::canonical_identity;

/// Ancestor levels searched around an index anchor.
const ANCESTOR_DEPTH: usize = 3;

/// Following siblings inspected around an index anchor.
const SIBLING_BUDGET: usize = 6;

/// Text blocks collected under a date heading.
const DATE_BLOCK_CAP: usize = 12;

/// Texts longer than this are containers, not headings or price labels.
const SHORT_TEXT: usize = 80;

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Resolves candidates into records.
#[derive(Debug, Clone)]
pub struct DetailResolver {
    title_selectors: Vec<String>,
    /// Folded heading phrases introducing date lists
    date_headings: Vec<String>,
    routes: RouteExtractor,
    dates: DateExtractor,
    operators: OperatorMatcher,
}

impl DetailResolver {
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            title_selectors: site.title_selectors.clone(),
            date_headings: site
                .date_headings
                .iter()
                .map(|h| fold_locale(h))
                .filter(|h| !h.is_empty())
                .collect(),
            routes: RouteExtractor::from_config(site),
            dates: DateExtractor::default(),
            operators: OperatorMatcher::new(&site.operators),
        }
    }

    /// Replace the date extractor, e.g. to pin the reference year.
    pub fn with_dates(mut self, dates: DateExtractor) -> Self {
        self.dates = dates;
        self
    }

    /// Fetch and resolve one candidate.
    pub async fn resolve(
        &self,
        fetcher: &dyn PageFetcher,
        candidate: &ListingCandidate,
        index_pages: &[IndexPage],
    ) -> Result<Record> {
        let html = fetcher.fetch(&candidate.url).await?;
        Ok(self.resolve_html(&html, candidate, index_pages))
    }

    /// Resolve an already fetched detail document.
    pub fn resolve_html(
        &self,
        html: &str,
        candidate: &ListingCandidate,
        index_pages: &[IndexPage],
    ) -> Record {
        let page = HtmlPage::parse(html);
        self.extract(&page, candidate, index_pages)
    }

    /// Extract every field from a detail tree.
    pub fn extract<T: DomTree>(
        &self,
        tree: &T,
        candidate: &ListingCandidate,
        index_pages: &[IndexPage],
    ) -> Record {
        let url = candidate.url.as_str();
        let title = self.title(tree).unwrap_or_default();
        let route = self
            .routes
            .extract(&[title.as_str(), candidate.anchor_text.as_str()], url);
        if !route.is_complete() {
            log::warn!("Route unresolved for {}", url);
        }

        let page_text = tree.page_text();
        let price = Chain::new()
            .then("page", || extract_price(&page_text))
            .then("card", || candidate.price.clone())
            .then("index", || cross_page_price(url, &route, index_pages))
            .resolve()
            .map(|(source, price)| {
                log::debug!("Price for {} from {}: {}", url, source, price.text);
                price
            });
        if price.is_none() {
            log::warn!("Price unresolved for {}", url);
        }

        let mut blocks = self.date_blocks(tree);
        blocks.push(page_text.clone());
        let date_ranges = self.dates.extract_all(blocks.iter().map(String::as_str));

        let mut record = Record::new(url).with_route(route).with_price(price);
        record.date_ranges = date_ranges;
        if let Some(operator) = self.operators.detect(&page_text) {
            record.extra.insert("operator".into(), operator.to_string());
        }
        if let Some(posted) = &candidate.posted_text {
            record.extra.insert("posted".into(), posted.clone());
        }
        record
    }

    /// First non-empty text among the title selectors.
    fn title<T: DomTree>(&self, tree: &T) -> Option<String> {
        self.title_selectors.iter().find_map(|selector| {
            tree.select(selector)
                .into_iter()
                .map(|node| tree.display_text(node))
                .find(|text| !text.is_empty())
        })
    }

    /// Text blocks following the first heading that announces dates.
    fn date_blocks<T: DomTree>(&self, tree: &T) -> Vec<String> {
        let heading = tree
            .select("h1, h2, h3, h4, h5, h6, strong, b, p, dt, summary, a")
            .into_iter()
            .find(|node| {
                let text = tree.text(*node);
                text.chars().count() <= SHORT_TEXT && {
                    let folded = fold_locale(&text);
                    self.date_headings.iter().any(|phrase| folded.contains(phrase.as_str()))
                }
            });
        let Some(heading) = heading else {
            return Vec::new();
        };

        // Inline markers (<strong> inside <p>) anchor on their container.
        let mut anchor = heading;
        while tree.next_siblings(anchor).is_empty() {
            match tree.parent(anchor) {
                Some(parent) => anchor = parent,
                None => return Vec::new(),
            }
        }

        tree.next_siblings(anchor)
            .into_iter()
            .take_while(|node| !HEADING_TAGS.contains(&tree.tag(*node)))
            .take(DATE_BLOCK_CAP)
            .map(|node| tree.text(node))
            .filter(|text| !text.is_empty())
            .collect()
    }
}

/// Search index pages for this listing's card and read a price near it.
fn cross_page_price(url: &str, route: &Route, index_pages: &[IndexPage]) -> Option<Price> {
    let identity = canonical_identity(url);
    let route_keys = route
        .is_complete()
        .then(|| (fold_locale(&route.origin), fold_locale(&route.destination)));

    index_pages.iter().find_map(|index| {
        let base = Url::parse(&index.url).ok()?;
        let page = HtmlPage::parse(&index.html);
        let anchors = page.select("a[href]");

        let by_address = anchors.iter().copied().find(|anchor| {
            page.attr(*anchor, "href")
                .and_then(|href| resolve_url(&base, href))
                .is_some_and(|target| canonical_identity(target.as_str()) == identity)
        });
        let anchor = by_address.or_else(|| {
            let (origin, destination) = route_keys.as_ref()?;
            anchors.iter().copied().find(|anchor| {
                let text = fold_locale(&page.text(*anchor));
                text.contains(origin.as_str()) && text.contains(destination.as_str())
            })
        })?;

        let price = neighborhood_price(&page, anchor);
        if let Some(price) = &price {
            log::debug!("Found {} for {} on {}", price.text, url, index.url);
        }
        price
    })
}

/// Price near an anchor: its ancestors, then following siblings, then the
/// closest short element carrying a price anywhere in the document.
pub fn neighborhood_price<'a, T: DomTree>(tree: &'a T, anchor: T::Node<'a>) -> Option<Price> {
    Chain::new()
        .then("ancestors", || {
            std::iter::once(anchor)
                .chain(tree.ancestors(anchor).into_iter().take(ANCESTOR_DEPTH))
                .find_map(|node| extract_price(&tree.text(node)))
        })
        .then("siblings", || {
            // Everything below the outermost searched ancestor was already read.
            let outermost = tree
                .ancestors(anchor)
                .into_iter()
                .take(ANCESTOR_DEPTH)
                .last()
                .unwrap_or(anchor);
            tree.next_siblings(outermost)
                .into_iter()
                .take(SIBLING_BUDGET)
                .find_map(|node| extract_price(&tree.text(node)))
        })
        .then("nearest", || {
            let enclosing = tree.ancestors(anchor);
            tree.select("*")
                .into_iter()
                .filter(|node| !enclosing.contains(node))
                .filter_map(|node| {
                    let text = tree.text(node);
                    if text.chars().count() > SHORT_TEXT {
                        return None;
                    }
                    let price = extract_price(&text)?;
                    Some((tree_distance(tree, anchor, node)?, price))
                })
                .min_by_key(|(distance, _)| *distance)
                .map(|(_, price)| price)
        })
        .resolve()
        .map(|(_, price)| price)
}
