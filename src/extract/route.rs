// src/extract/route.rs

//! Origin/destination extraction from titles and listing slugs.

use std::collections::HashSet;

use crate::models::{Route, SiteConfig};
use crate::utils::text::{fold_locale, normalize, title_case};
use crate::utils::url::last_path_segment;

use super::Chain;

/// Directional separators, most explicit first.
const SEPARATORS: &[&str] = &["→", "⟶", "➔", "➜", "->", "–", "—", " - "];

/// Split text on the first directional separator found.
///
/// Text without a separator yields `(normalized_text, "")`.
pub fn split_route(text: &str) -> Route {
    let text = normalize(text);
    for sep in SEPARATORS {
        if let Some((left, right)) = text.split_once(sep) {
            let (left, right) = (left.trim(), right.trim());
            if !left.is_empty() && !right.is_empty() {
                return Route::new(left, right);
            }
        }
    }
    Route::new(text, "")
}

/// Route extraction with site vocabulary applied.
#[derive(Debug, Clone, Default)]
pub struct RouteExtractor {
    /// Folded tokens that never name a place
    stop_words: HashSet<String>,
    /// Folded multi-token place names, longest first
    places: Vec<Vec<String>>,
}

impl RouteExtractor {
    pub fn new(stop_words: &[String], multi_word_places: &[String]) -> Self {
        let mut places: Vec<Vec<String>> = multi_word_places
            .iter()
            .map(|p| fold_locale(p).split(' ').map(str::to_string).collect::<Vec<_>>())
            .filter(|tokens| tokens.len() > 1)
            .collect();
        places.sort_by(|a, b| b.len().cmp(&a.len()));

        Self {
            stop_words: stop_words.iter().map(|w| fold_locale(w)).collect(),
            places,
        }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self::new(&site.stop_words, &site.multi_word_places)
    }

    /// Route from text blocks, falling back to the address slug.
    ///
    /// Returns an empty route when neither source yields both places.
    pub fn extract(&self, blocks: &[&str], address: &str) -> Route {
        Chain::new()
            .then("text", || self.from_blocks(blocks))
            .then("slug", || self.from_address(address))
            .resolve()
            .map(|(source, route)| {
                log::debug!("Route for {} from {}", address, source);
                route
            })
            .unwrap_or_default()
    }

    /// First block that splits into two non-empty, cleaned places.
    pub fn from_blocks(&self, blocks: &[&str]) -> Option<Route> {
        blocks.iter().find_map(|block| {
            let raw = split_route(block);
            if raw.destination.is_empty() {
                return None;
            }
            let route = Route::new(self.clean_place(&raw.origin), self.clean_place(&raw.destination));
            route.is_complete().then_some(route)
        })
    }

    /// Derive the route from hyphenated slug tokens of the last path segment.
    pub fn from_address(&self, address: &str) -> Option<Route> {
        let segment = last_path_segment(address)?;
        let tokens: Vec<String> = segment
            .split('-')
            .map(fold_locale)
            .filter(|t| !t.is_empty())
            .collect();

        let mut places = self
            .merge_places(&tokens)
            .into_iter()
            .filter(|t| !self.stop_words.contains(t) && t.chars().any(char::is_alphabetic));

        let origin = places.next()?;
        let destination = places.next()?;
        Some(Route::new(title_case(&origin), title_case(&destination)))
    }

    /// Join consecutive tokens that spell a known multi-word place.
    fn merge_places(&self, tokens: &[String]) -> Vec<String> {
        let mut merged = Vec::with_capacity(tokens.len());
        let mut i = 0;
        'outer: while i < tokens.len() {
            for place in &self.places {
                let end = i + place.len();
                if end <= tokens.len() && tokens[i..end] == place[..] {
                    merged.push(place.join(" "));
                    i = end;
                    continue 'outer;
                }
            }
            merged.push(tokens[i].clone());
            i += 1;
        }
        merged
    }

    /// Trim decoration around a place name and drop marketing words at its edges.
    fn clean_place(&self, raw: &str) -> String {
        let cut = raw.split(['|', '(', ',', ':']).next().unwrap_or_default();
        let mut words: Vec<&str> = cut
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();

        let is_noise =
            |w: &str| self.stop_words.contains(&fold_locale(w)) || !w.chars().any(char::is_alphabetic);
        while words.last().is_some_and(|w| is_noise(*w)) {
            words.pop();
        }
        while words.first().is_some_and(|w| is_noise(*w)) {
            words.remove(0);
        }
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> RouteExtractor {
        RouteExtractor::from_config(&SiteConfig::default())
    }

    #[test]
    fn test_split_route_separators() {
        assert_eq!(split_route("İstanbul → Paris"), Route::new("İstanbul", "Paris"));
        assert_eq!(split_route("İstanbul - Paris"), Route::new("İstanbul", "Paris"));
        assert_eq!(split_route("Ankara–Roma"), Route::new("Ankara", "Roma"));
        assert_eq!(split_route("İzmir -> Berlin"), Route::new("İzmir", "Berlin"));
    }

    #[test]
    fn test_split_route_unsplittable_keeps_text() {
        assert_eq!(
            split_route("  Yurt dışı  fırsatları "),
            Route::new("Yurt dışı fırsatları", "")
        );
        assert_eq!(split_route("Cluj-Napoca"), Route::new("Cluj-Napoca", ""));
    }

    #[test]
    fn test_blocks_strip_marketing_words() {
        let route = extractor().from_blocks(&["İstanbul - Tokyo Uçak Bileti"]);
        assert_eq!(route, Some(Route::new("İstanbul", "Tokyo")));

        let route = extractor().from_blocks(&["Ucuz İstanbul (IST) → Paris (CDG) | 3.299 TL"]);
        assert_eq!(route, Some(Route::new("İstanbul", "Paris")));
    }

    #[test]
    fn test_blocks_skip_unsplittable_titles() {
        let route = extractor().from_blocks(&["Haftanın fırsatı", "Antalya → Londra"]);
        assert_eq!(route, Some(Route::new("Antalya", "Londra")));
    }

    #[test]
    fn test_slug_fallback_with_stop_words() {
        let route = extractor().from_address("https://ucuzaucak.net/ilan/ucuz-istanbul-roma-ucak-bileti/");
        assert_eq!(route, Some(Route::new("Istanbul", "Roma")));
    }

    #[test]
    fn test_slug_merges_multi_word_places() {
        let route = extractor().from_address("https://ucuzaucak.net/ilan/istanbul-new-york-ucus/");
        assert_eq!(route, Some(Route::new("Istanbul", "New York")));

        let route = extractor().from_address("https://ucuzaucak.net/ilan/rio-de-janeiro-ankara");
        assert_eq!(route, Some(Route::new("Rio De Janeiro", "Ankara")));
    }

    #[test]
    fn test_slug_merge_is_configurable() {
        let extractor = RouteExtractor::new(&[], &["buenos aires".to_string()]);
        let route = extractor.from_address("https://x.test/ilan/buenos-aires-madrid");
        assert_eq!(route, Some(Route::new("Buenos Aires", "Madrid")));
    }

    #[test]
    fn test_extract_falls_back_then_gives_up() {
        let e = extractor();
        assert_eq!(
            e.extract(&["Fırsat!"], "https://ucuzaucak.net/ilan/izmir-berlin/"),
            Route::new("Izmir", "Berlin")
        );
        assert_eq!(
            e.extract(&["Fırsat!"], "https://ucuzaucak.net/ilan/kampanya/"),
            Route::default()
        );
    }
}
