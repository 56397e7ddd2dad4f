// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/licensa/licensa.toml`, `~/.config/licensa/licensa.toml`,
//! `./licensa.toml`, then `LICENSA_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LicensaConfig;

/// Config sections that environment variables may address.
const ENV_SECTIONS: &[&str] = &["log", "mirror", "cache", "ledger", "quota"];

/// Config files in merge order (later overrides earlier).
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/licensa/licensa.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("licensa/licensa.toml"));
    }
    paths.push(PathBuf::from("licensa.toml"));
    paths
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<LicensaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LicensaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LicensaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LicensaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LicensaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(LicensaConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Environment provider mapping `LICENSA_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `LICENSA_LEDGER_OPERATOR_ACCOUNT_ID` maps to `ledger.operator_account_id`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("LICENSA_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_at_section() {
        assert_eq!(
            map_env_key("ledger_operator_account_id"),
            "ledger.operator_account_id"
        );
        assert_eq!(map_env_key("mirror_page_size"), "mirror.page_size");
        assert_eq!(map_env_key("cache_ttl_secs"), "cache.ttl_secs");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn config_paths_end_with_local_file() {
        let paths = config_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from("/etc/licensa/licensa.toml")));
        assert_eq!(paths.last(), Some(&PathBuf::from("licensa.toml")));
    }
}
