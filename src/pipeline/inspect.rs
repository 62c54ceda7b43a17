// src/pipeline/inspect.rs

//! Single-page inspection: resolve one detail address and render its message.

use url::Url;

use crate::error::Result;
use crate::models::{Config, ListingCandidate, Record};
use crate::services::{DetailResolver, MessageFormatter, PageFetcher};
use crate::utils::url::strip_fragment;

/// Resolve `address` without discovery and return the record with its message.
pub async fn inspect_listing(
    config: &Config,
    fetcher: &dyn PageFetcher,
    address: &str,
) -> Result<(Record, String)> {
    let url = strip_fragment(Url::parse(address)?);
    let candidate = ListingCandidate::new(url.to_string());

    let record = DetailResolver::new(&config.site)
        .resolve(fetcher, &candidate, &[])
        .await?;

    if !record.has_price() {
        log::warn!("No price found on {}", record.url);
    }
    if record.date_ranges.is_empty() {
        log::warn!("No date ranges found on {}", record.url);
    }

    let message = MessageFormatter::new(config.notifier.format, config.message_template.clone())
        .render(&record);
    Ok((record, message))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;

    struct OnePage(&'static str);

    #[async_trait]
    impl PageFetcher for OnePage {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url == "https://ucuzaucak.net/ilan/ankara-roma/" {
                Ok(self.0.to_string())
            } else {
                Err(AppError::fetch(url, "status 404"))
            }
        }
    }

    #[tokio::test]
    async fn test_inspect_renders_message() {
        let fetcher = OnePage("<html><body><h1>Ankara → Roma</h1><p>2.499 TL</p></body></html>");
        let (record, message) = inspect_listing(
            &Config::default(),
            &fetcher,
            "https://ucuzaucak.net/ilan/ankara-roma/#fiyat",
        )
        .await
        .unwrap();

        assert_eq!(record.origin, "Ankara");
        assert_eq!(record.price, 2499);
        assert!(message.contains("2.499 TL"));
        assert!(message.contains("Kaynak: https://ucuzaucak.net/ilan/ankara-roma/"));
    }

    #[tokio::test]
    async fn test_inspect_rejects_bad_address() {
        let fetcher = OnePage("");
        let err = inspect_listing(&Config::default(), &fetcher, "not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Url(_)));
    }
}
