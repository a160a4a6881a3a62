// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Every struct is `deny_unknown_fields` so a misspelled key fails at startup
//! instead of silently falling back to a default.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

/// HTTP listener and process-wide logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Token authentication.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC secret for signing and verifying tenant tokens.
    /// When unset every authenticated route rejects requests.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Lifetime of tokens minted by `courier token`.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

fn default_token_ttl_hours() -> u64 {
    24
}

/// On-disk locations for the JSON store and staged media.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            media_dir: default_media_dir(),
        }
    }
}

impl StorageConfig {
    pub fn schedules_path(&self) -> PathBuf {
        self.data_dir.join("schedules.json")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.data_dir.join("sessions.json")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

/// Deferred dispatch polling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// IANA zone used to interpret naive due times and to stamp job records.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Upper bound on a single transport send.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Run one tick immediately when the polling loop starts.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timezone: default_timezone(),
            send_timeout_secs: default_send_timeout_secs(),
            run_on_start: true,
        }
    }
}

impl SchedulerConfig {
    /// Parse the configured zone. Validation guarantees this succeeds for
    /// configs returned by [`crate::load_and_validate`].
    pub fn tz(&self) -> Result<chrono_tz::Tz, String> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| format!("unknown time zone `{}`: {e}", self.timezone))
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_timezone() -> String {
    "Asia/Jakarta".to_string()
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// External WhatsApp-Web bridge the transport adapter talks to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Per-tenant credential directories live under here.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    #[serde(default = "default_status_poll_ms")]
    pub status_poll_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            session_dir: default_session_dir(),
            status_poll_ms: default_status_poll_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".wwebjs_auth")
}

fn default_status_poll_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}
