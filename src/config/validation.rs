use crate::config::types::{Config, FetchConfig, SearchConfig, SiteEntry, StorageConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_sites(&config.sites)?;
    validate_fetch_config(&config.fetch)?;
    validate_search_config(&config.search)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates the site list
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    if sites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[sites]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for site in sites {
        if site.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' must have a non-empty name",
                site.url
            )));
        }

        let url = Url::parse(&site.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site URL '{}': {}", site.url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "site URL '{}' must use the http or https scheme",
                site.url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "site URL '{}' has no host",
                site.url
            )));
        }

        if !seen.insert(site.normalized_url()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site URL '{}'",
                site.url
            )));
        }
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-fetches must be between 1 and 100, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.politeness_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "politeness-delay-ms must be >= 100ms, got {}ms",
            config.politeness_delay_ms
        )));
    }

    Ok(())
}

/// Validates search configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.frequency_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "frequency-threshold must be >= 1, got {}",
            config.frequency_threshold
        )));
    }

    if config.proximity_window < 1 {
        return Err(ConfigError::Validation(format!(
            "proximity-window must be >= 1, got {}",
            config.proximity_window
        )));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::IndexConfig;

    fn base_config() -> Config {
        Config {
            sites: vec![SiteEntry {
                url: "https://example.com".to_string(),
                name: "Example".to_string(),
            }],
            fetch: FetchConfig::default(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            storage: StorageConfig {
                database_path: "./lemmex.db".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_empty_site_list_rejected() {
        let mut config = base_config();
        config.sites.clear();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_site_scheme_rejected() {
        let mut config = base_config();
        config.sites[0].url = "ftp://example.com".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unparseable_site_url_rejected() {
        let mut config = base_config();
        config.sites[0].url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_duplicate_sites_rejected() {
        let mut config = base_config();
        config.sites.push(SiteEntry {
            url: "https://example.com/".to_string(),
            name: "Example again".to_string(),
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = base_config();
        config.fetch.max_concurrent_fetches = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_frequency_threshold_rejected() {
        let mut config = base_config();
        config.search.frequency_threshold = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_sub_100ms_politeness_delay_rejected() {
        let mut config = base_config();
        config.fetch.politeness_delay_ms = 10;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_ip_hosts_are_allowed() {
        let mut config = base_config();
        config.sites[0].url = "http://127.0.0.1:8080".to_string();
        assert!(validate(&config).is_ok());
    }
}
