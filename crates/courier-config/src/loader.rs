// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/courier/courier.toml`,
//! `~/.config/courier/courier.toml`, `./courier.toml`, `COURIER_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CourierConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/courier/courier.toml";
pub(crate) const LOCAL_CONFIG: &str = "courier.toml";

/// Sections whose env var prefix is rewritten into a dotted key.
const SECTIONS: &[&str] = &["server", "auth", "storage", "scheduler", "transport"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("courier").join(LOCAL_CONFIG))
}

/// Figment for the standard hierarchy, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Load from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    build_figment().extract()
}

/// Load from an explicit file with env var overrides (`--config`).
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load from a TOML string over the defaults only. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `COURIER_SCHEDULER_POLL_INTERVAL_SECS` must become
/// `scheduler.poll_interval_secs`, so only the section prefix is split.
fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
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
    fn env_keys_split_on_section_only() {
        assert_eq!(
            map_env_key("scheduler_poll_interval_secs"),
            "scheduler.poll_interval_secs"
        );
        assert_eq!(map_env_key("auth_jwt_secret"), "auth.jwt_secret");
        assert_eq!(map_env_key("transport_bridge_url"), "transport.bridge_url");
    }

    #[test]
    fn unknown_env_section_left_alone() {
        assert_eq!(map_env_key("unrelated_key"), "unrelated_key");
        assert_eq!(map_env_key("serverless"), "serverless");
    }
}
