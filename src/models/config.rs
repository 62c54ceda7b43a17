//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::utils::retry::{Backoff, RetryPolicy};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and pacing behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Site structure and extraction vocabulary
    #[serde(default)]
    pub site: SiteConfig,

    /// Inclusion rules
    #[serde(default)]
    pub filters: FilterConfig,

    /// Template for the simple message format
    #[serde(default)]
    pub message_template: Option<String>,

    /// Notification delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults only when the file is absent.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config not found at {:?}. Using defaults.", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_attempts == 0 {
            return Err(AppError::validation("crawler.max_attempts must be > 0"));
        }
        if self.crawler.delay_min_ms > self.crawler.delay_max_ms {
            return Err(AppError::validation(
                "crawler.delay_min_ms must not exceed crawler.delay_max_ms",
            ));
        }
        Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url is invalid: {e}")))?;
        if self.site.index_pages.is_empty() {
            return Err(AppError::validation("site.index_pages is empty"));
        }
        if self.site.listing_prefix.trim_matches('/').is_empty() {
            return Err(AppError::validation("site.listing_prefix is empty"));
        }
        if self.site.max_listings == 0 {
            return Err(AppError::validation("site.max_listings must be > 0"));
        }
        for selector in &self.site.title_selectors {
            scraper::Selector::parse(selector)
                .map_err(|e| AppError::selector(selector.as_str(), format!("{e:?}")))?;
        }
        if self.notifier.max_attempts == 0 {
            return Err(AppError::validation("notifier.max_attempts must be > 0"));
        }
        if self.notifier.delay_min_ms > self.notifier.delay_max_ms {
            return Err(AppError::validation(
                "notifier.delay_min_ms must not exceed notifier.delay_max_ms",
            ));
        }
        if self.notifier.format == MessageFormat::Template && self.message_template.is_none() {
            log::warn!("notifier.format is 'template' but no message_template set; using built-in");
        }
        Ok(())
    }

    /// Index page URLs resolved against the site base, in priority order.
    pub fn index_urls(&self) -> Vec<String> {
        self.site
            .index_pages
            .iter()
            .filter_map(|page| crate::utils::resolve(&self.site.base_url, page))
            .collect()
    }
}

/// HTTP client and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per page before giving up
    #[serde(default = "defaults::attempts")]
    pub max_attempts: u32,

    /// Base for the attempt-scaled backoff, in milliseconds
    #[serde(default = "defaults::retry_base")]
    pub retry_base_ms: u64,

    /// Lower bound of the random pause before each detail fetch
    #[serde(default = "defaults::delay_min")]
    pub delay_min_ms: u64,

    /// Upper bound of the random pause before each detail fetch
    #[serde(default = "defaults::delay_max")]
    pub delay_max_ms: u64,

    /// Bodies shorter than this are considered truncated
    #[serde(default = "defaults::min_body_bytes")]
    pub min_body_bytes: usize,

    /// Optional rendering service used when the plain fetch looks truncated
    #[serde(default)]
    pub render_endpoint: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::attempts(),
            retry_base_ms: defaults::retry_base(),
            delay_min_ms: defaults::delay_min(),
            delay_max_ms: defaults::delay_max(),
            min_body_bytes: defaults::min_body_bytes(),
            render_endpoint: None,
        }
    }
}

impl CrawlerConfig {
    /// Attempt-scaled backoff used for page fetches.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_ms),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(500),
            backoff: Backoff::Linear,
        }
    }
}

/// Site structure and extraction vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site root; relative index pages resolve against it
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Index pages scanned for listings, highest priority first
    #[serde(default = "defaults::index_pages")]
    pub index_pages: Vec<String>,

    /// Path prefix under which detail pages live
    #[serde(default = "defaults::listing_prefix")]
    pub listing_prefix: String,

    /// Maximum number of listings collected per run
    #[serde(default = "defaults::max_listings")]
    pub max_listings: usize,

    /// Heading-like selectors tried in order for the listing title
    #[serde(default = "defaults::title_selectors")]
    pub title_selectors: Vec<String>,

    /// Slug tokens that never name a place
    #[serde(default = "defaults::stop_words")]
    pub stop_words: Vec<String>,

    /// Place names spelled with more than one slug token
    #[serde(default = "defaults::multi_word_places")]
    pub multi_word_places: Vec<String>,

    /// Operator names detected in page text
    #[serde(default = "defaults::operators")]
    pub operators: Vec<String>,

    /// Heading phrases that introduce the date list
    #[serde(default = "defaults::date_headings")]
    pub date_headings: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            index_pages: defaults::index_pages(),
            listing_prefix: defaults::listing_prefix(),
            max_listings: defaults::max_listings(),
            title_selectors: defaults::title_selectors(),
            stop_words: defaults::stop_words(),
            multi_word_places: defaults::multi_word_places(),
            operators: defaults::operators(),
            date_headings: defaults::date_headings(),
        }
    }
}

/// Inclusion rules applied to resolved records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Substring the origin must contain; empty means any
    #[serde(default)]
    pub departure: String,

    /// Destination must contain one of these; empty means any
    #[serde(default)]
    pub arrivals: Vec<String>,

    /// Price ceiling; 0 means unlimited
    #[serde(default)]
    pub max_price: u64,
}

/// Message layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Fixed multi-line block
    #[default]
    Block,
    /// `message_template` with named placeholders
    Template,
}

/// Notification delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub format: MessageFormat,

    /// Attempts for transient failures
    #[serde(default = "defaults::attempts")]
    pub max_attempts: u32,

    /// Additional attempts allowed while rate limited
    #[serde(default = "defaults::rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    /// Base of the exponential backoff, in milliseconds
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Cap for a single wait, including server-provided hints
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_secs: u64,

    /// Lower bound of the random pause before each send
    #[serde(default = "defaults::notify_delay_min")]
    pub delay_min_ms: u64,

    /// Upper bound of the random pause before each send
    #[serde(default = "defaults::notify_delay_max")]
    pub delay_max_ms: u64,

    /// Telegram Bot API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Optional Telegram parse mode ("HTML", "MarkdownV2")
    #[serde(default)]
    pub parse_mode: Option<String>,

    /// Bot token; `TELEGRAM_BOT_TOKEN` takes precedence
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Target chat; `TELEGRAM_CHAT_ID` takes precedence
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            format: MessageFormat::default(),
            max_attempts: defaults::attempts(),
            max_rate_limit_retries: defaults::rate_limit_retries(),
            backoff_base_ms: defaults::backoff_base(),
            max_backoff_secs: defaults::max_backoff(),
            delay_min_ms: defaults::notify_delay_min(),
            delay_max_ms: defaults::notify_delay_max(),
            api_base: defaults::api_base(),
            parse_mode: None,
            bot_token: None,
            chat_id: None,
        }
    }
}

impl NotifierConfig {
    /// Exponential backoff used for transient send failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_secs(self.max_backoff_secs),
            jitter: Duration::from_millis(250),
            backoff: Backoff::Exponential,
        }
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Persisted change-detection state
    #[serde(default = "defaults::state_file")]
    pub state_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: defaults::state_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/123.0 Safari/537.36"
            .into()
    }
    pub fn accept_language() -> String {
        "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn attempts() -> u32 {
        3
    }
    pub fn retry_base() -> u64 {
        1500
    }
    pub fn delay_min() -> u64 {
        1000
    }
    pub fn delay_max() -> u64 {
        3000
    }
    pub fn min_body_bytes() -> usize {
        2048
    }

    // Site defaults
    pub fn base_url() -> String {
        "https://ucuzaucak.net/".into()
    }
    pub fn index_pages() -> Vec<String> {
        vec!["/".into(), "/ilanlar/".into()]
    }
    pub fn listing_prefix() -> String {
        "/ilan/".into()
    }
    pub fn max_listings() -> usize {
        40
    }
    pub fn title_selectors() -> Vec<String> {
        vec![
            "h1".into(),
            "article h2".into(),
            ".listing-title".into(),
            "meta[property='og:title']".into(),
            "title".into(),
        ]
    }
    pub fn stop_words() -> Vec<String> {
        [
            "ucuz", "ucak", "bilet", "bileti", "biletleri", "ucus", "ucuslari", "kampanya",
            "kampanyasi", "firsat", "firsati", "indirim", "indirimli", "gidis", "donus",
            "tek", "yon", "aktarmali", "aktarmasiz", "direkt", "ilan", "tl",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
    pub fn multi_word_places() -> Vec<String> {
        [
            "new york",
            "los angeles",
            "san francisco",
            "hong kong",
            "kuala lumpur",
            "buenos aires",
            "sao paulo",
            "tel aviv",
            "cape town",
            "rio de janeiro",
            "abu dhabi",
            "mexico city",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
    pub fn operators() -> Vec<String> {
        [
            "Türk Hava Yolları",
            "THY",
            "AJet",
            "Pegasus",
            "SunExpress",
            "Lufthansa",
            "KLM",
            "Air France",
            "Wizz Air",
            "Ryanair",
            "Qatar Airways",
            "Emirates",
            "Etihad",
            "Aeroflot",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
    pub fn date_headings() -> Vec<String> {
        [
            "uygun tarih",
            "müsait tarih",
            "tarih aralık",
            "tarihler",
            "gidiş dönüş tarih",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    // Notifier defaults
    pub fn rate_limit_retries() -> u32 {
        5
    }
    pub fn backoff_base() -> u64 {
        1000
    }
    pub fn max_backoff() -> u64 {
        60
    }
    pub fn notify_delay_min() -> u64 {
        200
    }
    pub fn notify_delay_max() -> u64 {
        600
    }
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }

    // Paths
    pub fn state_file() -> PathBuf {
        PathBuf::from("data/state.json")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_delay_bounds() {
        let mut config = Config::default();
        config.crawler.delay_min_ms = 5000;
        config.crawler.delay_max_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_broken_title_selector() {
        let mut config = Config::default();
        config.site.title_selectors.push("h1[[".to_string());
        assert!(matches!(config.validate(), Err(AppError::Selector { .. })));
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.site.base_url = "ucuzaucak".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            message_template = "{origin} -> {destination}: {price}"

            [filters]
            departure = "İstanbul"
            arrivals = ["Paris", "Roma"]
            max_price = 5000

            [notifier]
            format = "template"
            "#,
        )
        .unwrap();

        assert_eq!(config.filters.departure, "İstanbul");
        assert_eq!(config.filters.arrivals.len(), 2);
        assert_eq!(config.filters.max_price, 5000);
        assert_eq!(config.notifier.format, MessageFormat::Template);
        assert_eq!(config.crawler.timeout_secs, 20);
        assert_eq!(config.site.listing_prefix, "/ilan/");
        assert!(config.message_template.is_some());
    }

    #[test]
    fn load_or_default_missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/dealwatch.toml").unwrap();
        assert_eq!(config.paths.state_file, PathBuf::from("data/state.json"));
    }

    #[test]
    fn load_or_default_rejects_broken_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[filters\nmax_price = ").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }

    #[test]
    fn index_urls_resolve_against_base() {
        let config = Config::default();
        assert_eq!(
            config.index_urls(),
            vec![
                "https://ucuzaucak.net/".to_string(),
                "https://ucuzaucak.net/ilanlar/".to_string()
            ]
        );
    }
}
