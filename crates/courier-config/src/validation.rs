// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks serde attributes cannot express.
//!
//! All problems are collected; validation never stops at the first one.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// HS256 keys shorter than this are trivially brute-forced.
const MIN_JWT_SECRET_LEN: usize = 32;

pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.server.port == 0 {
        errors.push(ConfigError::validation("server.port must not be 0"));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "server.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.server.log_level
        )));
    }

    if let Some(secret) = &config.auth.jwt_secret
        && secret.len() < MIN_JWT_SECRET_LEN
    {
        errors.push(ConfigError::validation(format!(
            "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes, got {}",
            secret.len()
        )));
    }

    if config.auth.token_ttl_hours == 0 {
        errors.push(ConfigError::validation(
            "auth.token_ttl_hours must be greater than 0",
        ));
    }

    if config.storage.data_dir.as_os_str().is_empty() {
        errors.push(ConfigError::validation("storage.data_dir must not be empty"));
    }

    if config.storage.media_dir.as_os_str().is_empty() {
        errors.push(ConfigError::validation("storage.media_dir must not be empty"));
    }

    if let Err(message) = config.scheduler.tz() {
        errors.push(ConfigError::validation(format!("scheduler.timezone: {message}")));
    }

    for (key, value) in [
        ("scheduler.poll_interval_secs", config.scheduler.poll_interval_secs),
        ("scheduler.send_timeout_secs", config.scheduler.send_timeout_secs),
        ("transport.status_poll_ms", config.transport.status_poll_ms),
        (
            "transport.request_timeout_secs",
            config.transport.request_timeout_secs,
        ),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be greater than 0"
            )));
        }
    }

    let bridge = config.transport.bridge_url.trim();
    if !(bridge.starts_with("http://") || bridge.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "transport.bridge_url must be an http(s) URL, got `{bridge}`"
        )));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
