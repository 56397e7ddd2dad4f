// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express. All errors are
//! collected; validation does not fail fast.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::LicensaConfig;

/// Maximum page size accepted by the mirror REST API.
pub const MAX_PAGE_SIZE: u32 = 100;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &LicensaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        fail(format!(
            "log.level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.log.level
        ));
    }

    if !is_http_url(&config.mirror.base_url) {
        fail(format!(
            "mirror.base_url must be an http(s) URL, got `{}`",
            config.mirror.base_url
        ));
    }

    if config.mirror.page_size == 0 || config.mirror.page_size > MAX_PAGE_SIZE {
        fail(format!(
            "mirror.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
            config.mirror.page_size
        ));
    }

    if config.mirror.timeout_secs == 0 {
        fail("mirror.timeout_secs must be at least 1".to_string());
    }

    if config.cache.ttl_secs == 0 {
        fail("cache.ttl_secs must be at least 1".to_string());
    }

    if let Some(url) = &config.ledger.gateway_url
        && !is_http_url(url)
    {
        fail(format!("ledger.gateway_url must be an http(s) URL, got `{url}`"));
    }

    if config.ledger.timeout_secs == 0 {
        fail("ledger.timeout_secs must be at least 1".to_string());
    }

    let mut seen = HashSet::new();
    for (i, plan) in config.plans.iter().enumerate() {
        if plan.name.trim().is_empty() {
            fail(format!("plans[{i}].name must not be empty"));
        } else if !seen.insert(plan.name.as_str()) {
            fail(format!("duplicate plan name `{}` in [[plans]]", plan.name));
        }
        if plan.price_tinybar == 0 {
            fail(format!("plans[{i}].price_tinybar must be positive"));
        }
        if plan.duration_days == 0 {
            fail(format!("plans[{i}].duration_days must be at least 1"));
        }
        if plan.price_usd < 0.0 || plan.price_hsuite < 0.0 {
            fail(format!("plans[{i}] display prices must be non-negative"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlanConfig;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    fn plan(name: &str) -> PlanConfig {
        PlanConfig {
            name: name.to_string(),
            price_tinybar: 100,
            price_usd: 1.0,
            price_hsuite: 0.0,
            project_limit: 1,
            message_limit: 10,
            duration_days: 30,
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&LicensaConfig::default()).is_ok());
    }

    #[test]
    fn oversized_page_fails_validation() {
        let mut config = LicensaConfig::default();
        config.mirror.page_size = 250;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "mirror.page_size"));
    }

    #[test]
    fn non_http_urls_fail_validation() {
        let mut config = LicensaConfig::default();
        config.mirror.base_url = "testnet.mirrornode.hedera.com".into();
        config.ledger.gateway_url = Some("ftp://gateway".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "mirror.base_url"));
        assert!(has_error(&errors, "ledger.gateway_url"));
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let mut config = LicensaConfig::default();
        config.cache.ttl_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "cache.ttl_secs"));
    }

    #[test]
    fn duplicate_plans_fail_validation() {
        let mut config = LicensaConfig::default();
        config.plans = vec![plan("pro"), plan("pro")];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "duplicate plan name `pro`"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = LicensaConfig::default();
        config.log.level = "loud".into();
        config.cache.ttl_secs = 0;
        config.mirror.page_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
