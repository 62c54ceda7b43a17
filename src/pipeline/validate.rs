// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::{Config, MessageFormat};
use crate::utils::log;

/// Load and sanity-check the configuration, logging what will be used.
pub fn run_validate(config_path: &Path) -> Result<Config> {
    log::header("Validating configuration");

    let config = match Config::load_or_default(config_path).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Config validation failed: {}", e);
            return Err(e);
        }
    };

    ::log::info!("✓ Config OK ({})", config_path.display());
    log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
    log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
    log::sub_item(&format!(
        "Fetch path: {}",
        config
            .crawler
            .render_endpoint
            .as_deref()
            .map_or("http".to_string(), |e| format!("http, falling back to {e}"))
    ));
    log::sub_item(&format!("Index pages: {}", config.index_urls().join(", ")));
    log::sub_item(&format!("Listing limit: {}", config.site.max_listings));
    log::sub_item(&format!(
        "Filters: departure='{}' arrivals={:?} max_price={}",
        config.filters.departure, config.filters.arrivals, config.filters.max_price
    ));
    log::sub_item(&format!(
        "Message format: {}",
        match config.notifier.format {
            MessageFormat::Block => "block",
            MessageFormat::Template => "template",
        }
    ));
    log::sub_item(&format!("State file: {}", config.paths.state_file.display()));

    Ok(config)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_valid_file_is_returned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[filters]\nmax_price = 4000\n").unwrap();
        let config = run_validate(&path).unwrap();
        assert_eq!(config.filters.max_price, 4000);
    }

    #[test]
    fn test_invalid_values_fail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[crawler]\ntimeout_secs = 0\n").unwrap();
        assert!(run_validate(&path).is_err());
    }

    #[test]
    fn test_missing_file_validates_defaults() {
        let dir = TempDir::new().unwrap();
        assert!(run_validate(&dir.path().join("absent.toml")).is_ok());
    }
}
