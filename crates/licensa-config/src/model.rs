// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Licensa.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use licensa_core::AccountId;
use serde::{Deserialize, Serialize};

/// Top-level Licensa configuration.
///
/// All sections are optional and default to values that work against the
/// public testnet mirror.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LicensaConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Mirror (read-replica) API settings.
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Reconstructed message cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Ledger gateway and operator identity.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Quota projection settings.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Purchasable subscription plans.
    #[serde(default)]
    pub plans: Vec<PlanConfig>,
}

impl LicensaConfig {
    /// Looks up a plan by name.
    pub fn plan(&self, name: &str) -> Option<&PlanConfig> {
        self.plans.iter().find(|p| p.name == name)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Mirror node REST API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Base URL, without the `/api/v1` suffix.
    #[serde(default = "default_mirror_url")]
    pub base_url: String,

    /// Entries requested per fetch. The mirror caps this at 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: default_mirror_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_mirror_url() -> String {
    "https://testnet.mirrornode.hedera.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

/// Reconstructed message cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Lifetime of a cached message set in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

/// Ledger gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Base URL of the operator's signing gateway. `None` disables mutating commands.
    #[serde(default)]
    pub gateway_url: Option<String>,

    /// Account that pays for and signs operator transactions.
    #[serde(default)]
    pub operator_account_id: Option<AccountId>,

    /// Account that holds freshly minted licenses and receives payments.
    #[serde(default)]
    pub treasury_account_id: Option<AccountId>,

    /// Sent as `x-api-key` on every gateway request when set.
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            operator_account_id: None,
            treasury_account_id: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Quota projection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Quota granted to a log that has no quota record yet.
    #[serde(default = "default_bootstrap_quota")]
    pub bootstrap_quota: u64,

    /// Logs with at most this many messages get the bootstrap quota.
    #[serde(default = "default_bootstrap_max_messages")]
    pub bootstrap_max_messages: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            bootstrap_quota: default_bootstrap_quota(),
            bootstrap_max_messages: default_bootstrap_max_messages(),
        }
    }
}

fn default_bootstrap_quota() -> u64 {
    10
}

fn default_bootstrap_max_messages() -> usize {
    2
}

/// One purchasable subscription plan.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlanConfig {
    /// Unique plan name.
    pub name: String,

    /// Price charged on-ledger, in tinybar.
    pub price_tinybar: u64,

    /// Display price in USD, recorded in the subscription message.
    #[serde(default)]
    pub price_usd: f64,

    /// Display price in HSuite tokens, recorded in the subscription message.
    #[serde(default)]
    pub price_hsuite: f64,

    /// Number of projects the subscription allows.
    pub project_limit: u64,

    /// Number of chat messages the subscription allows.
    pub message_limit: u64,

    /// Subscription length in days.
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
}

fn default_duration_days() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_testnet_mirror() {
        let config = LicensaConfig::default();
        assert_eq!(config.mirror.base_url, "https://testnet.mirrornode.hedera.com");
        assert_eq!(config.mirror.page_size, 100);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.ledger.operator_account_id.is_none());
        assert!(config.plans.is_empty());
    }

    #[test]
    fn plans_deserialize_with_defaults() {
        let toml_str = r#"
[[plans]]
name = "starter"
price_tinybar = 500000000
price_usd = 5.0
project_limit = 3
message_limit = 200

[[plans]]
name = "pro"
price_tinybar = 2000000000
project_limit = 20
message_limit = 5000
duration_days = 365
"#;
        let config: LicensaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.plans.len(), 2);
        assert_eq!(config.plans[0].duration_days, 30);
        assert_eq!(config.plans[1].duration_days, 365);
        assert_eq!(config.plan("pro").map(|p| p.project_limit), Some(20));
        assert!(config.plan("enterprise").is_none());
    }

    #[test]
    fn account_ids_are_typed() {
        let toml_str = r#"
[ledger]
operator_account_id = "0.0.1001"
"#;
        let config: LicensaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.ledger.operator_account_id,
            Some(AccountId::new(0, 0, 1001))
        );

        let bad = "[ledger]\noperator_account_id = \"alice\"\n";
        assert!(toml::from_str::<LicensaConfig>(bad).is_err());
    }
}
