use crate::config::types::{
    Config, CrawlerConfig, SiteConfig, StorageConfig, UpdateConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use std::path::{Component, Path};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_update_config(&config.update)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.default_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "default-timeout-ms must be > 0".to_string(),
        ));
    }

    if config.timeout_step_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-step-ms must be > 0".to_string(),
        ));
    }

    if config.timeout_ceiling_ms < config.default_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "timeout-ceiling-ms ({}) must be >= default-timeout-ms ({})",
            config.timeout_ceiling_ms, config.default_timeout_ms
        )));
    }

    if config.max_fetch_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-fetch-attempts must be >= 1, got {}",
            config.max_fetch_attempts
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be >= 1, got {}",
            config.batch_size
        )));
    }

    // max_depth of 0 is allowed: only the seed is fetched

    Ok(())
}

/// Validates update daemon configuration
fn validate_update_config(config: &UpdateConfig) -> Result<(), ConfigError> {
    if config.limit < 1 {
        return Err(ConfigError::Validation(format!(
            "update limit must be >= 1, got {}",
            config.limit
        )));
    }

    if config.slow_forget_days == 0 || config.rate_limited_forget_days == 0 {
        return Err(ConfigError::Validation(
            "forget thresholds must be > 0 days".to_string(),
        ));
    }

    config.run_at_time()?;

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates storage directories
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.crawler_dir.as_os_str().is_empty() || config.index_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage directories cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates site entries
fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for site in sites {
        if site.name.is_empty() {
            return Err(ConfigError::Validation(
                "site name cannot be empty".to_string(),
            ));
        }

        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site name '{}'",
                site.name
            )));
        }

        validate_site_path(&site.path)?;

        for seed in site.all_seeds() {
            let url = Url::parse(&seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' must use http or https",
                    seed
                )));
            }
        }
    }

    Ok(())
}

/// A site path must be a plain relative directory name
fn validate_site_path(path: &str) -> Result<(), ConfigError> {
    if path.is_empty() {
        return Err(ConfigError::Validation(
            "site path cannot be empty".to_string(),
        ));
    }

    let plain = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !plain {
        return Err(ConfigError::Validation(format!(
            "site path '{}' must be relative and must not contain '..'",
            path
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
