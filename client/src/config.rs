//! Event channel configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use reqwest::Url;

use crate::net::reconnect::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RETRY_DELAY, ReconnectPolicy};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_EVENTS_PATH: &str = "/api/events";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Query parameter carrying the session token on the stream URL.
const TOKEN_PARAM: &str = "token";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Backend origin, without trailing slash.
    pub base_url: String,
    /// Path of the push-event endpoint.
    pub events_path: String,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            events_path: DEFAULT_EVENTS_PATH.to_owned(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ChannelConfig {
    /// Build config from environment variables, defaulting anything unset.
    ///
    /// - `INBOX_BASE_URL`: backend origin (default `http://127.0.0.1:8080`)
    /// - `INBOX_EVENTS_PATH`: stream path (default `/api/events`)
    /// - `INBOX_MAX_RECONNECT_ATTEMPTS`: default 5
    /// - `INBOX_RETRY_DELAY_SECS`: default 5
    /// - `INBOX_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// Unparseable numbers fall back to their default.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("INBOX_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let events_path = normalize_path(
            &std::env::var("INBOX_EVENTS_PATH").unwrap_or_else(|_| DEFAULT_EVENTS_PATH.to_owned()),
        );
        let reconnect = ReconnectPolicy {
            max_attempts: env_parse("INBOX_MAX_RECONNECT_ATTEMPTS", DEFAULT_MAX_RECONNECT_ATTEMPTS),
            retry_delay: Duration::from_secs(env_parse("INBOX_RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY.as_secs())),
        };
        let connect_timeout = Duration::from_secs(env_parse("INBOX_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS));

        Self { base_url, events_path, reconnect, connect_timeout }
    }

    /// Stream URL for a session: `<base_url><events_path>?token=<token>`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the base URL does not parse.
    pub fn stream_url(&self, token: &str) -> Result<Url, ConfigError> {
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), normalize_path(&self.events_path));
        let mut url =
            Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl { url: self.base_url.clone(), source })?;
        url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
        Ok(url)
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') { trimmed.to_owned() } else { format!("/{trimmed}") }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
