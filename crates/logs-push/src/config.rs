// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::entry::LabelSet;
use crate::errors::Creation;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const DEFAULT_URL: &str = "http://localhost:3100/loki/api/v1/push";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_STDIN_LABELS: &str = "job=stdin";

/// Retry policy of the push transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(with = "duration_secs")]
    pub min_period: Duration,
    #[serde(with = "duration_secs")]
    pub max_period: Duration,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_period: Duration::from_millis(500),
            max_period: Duration::from_secs(5 * 60),
            max_retries: 10,
        }
    }
}

/// Configuration of one push client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Optional client name, used in logs when several clients are configured
    pub name: Option<String>,
    /// Push endpoint (e.g., "http://localhost:3100/loki/api/v1/push")
    pub url: String,
    /// Tenant sent with every request, if any
    pub tenant_id: Option<String>,
    /// Maximum time a batch is held before it is sent
    #[serde(with = "duration_secs")]
    pub batch_wait: Duration,
    /// Maximum batch size in bytes
    pub batch_size: usize,
    /// Request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub backoff: BackoffConfig,
    /// Labels added to every entry that doesn't already carry them
    pub external_labels: LabelSet,
    /// HTTP(S) proxy for the transport
    pub proxy_url: Option<String>,
    pub drop_rate_limited_batches: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: None,
            url: DEFAULT_URL.to_string(),
            tenant_id: None,
            batch_wait: Duration::from_secs(1),
            batch_size: 1024 * 1024,
            timeout: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
            external_labels: LabelSet::default(),
            proxy_url: None,
            drop_rate_limited_batches: false,
        }
    }
}

impl ClientConfig {
    /// Checks the fields that don't need the transport to be built.
    pub fn validate(&self) -> Result<(), Creation> {
        if self.url.trim().is_empty() {
            return Err(Creation::InvalidConfig(
                "client url cannot be empty".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(Creation::InvalidConfig(
                "batch size must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Creation::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if self.backoff.min_period > self.backoff.max_period {
            return Err(Creation::InvalidConfig(format!(
                "backoff min period {:?} exceeds max period {:?}",
                self.backoff.min_period, self.backoff.max_period
            )));
        }

        if let Some(tenant_id) = &self.tenant_id {
            if tenant_id.trim().is_empty() || tenant_id.contains('|') {
                return Err(Creation::InvalidConfig(format!(
                    "invalid tenant id '{tenant_id}'"
                )));
            }
        }

        Ok(())
    }
}

/// Process level settings of the debug sink binary
#[derive(Debug, Clone)]
pub struct DebugSinkConfig {
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    pub clients: Vec<ClientConfig>,
    /// Labels attached to lines read from stdin
    pub labels: LabelSet,
    /// Render the unfinished multi-entry batch when the sink stops
    pub flush_partial_on_drain: bool,
}

impl Default for DebugSinkConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            clients: vec![ClientConfig::default()],
            labels: parse_label_pairs(DEFAULT_STDIN_LABELS),
            flush_partial_on_drain: false,
        }
    }
}

impl DebugSinkConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, Creation> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`DebugSinkConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Creation> {
        let log_level = lookup("LOGS_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let client = ClientConfig {
            url: lookup("LOGS_CLIENT_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            tenant_id: lookup("LOGS_TENANT_ID"),
            proxy_url: lookup("LOGS_PROXY_URL").or_else(|| lookup("HTTPS_PROXY")),
            external_labels: lookup("LOGS_EXTERNAL_LABELS")
                .map(|val| parse_label_pairs(&val))
                .unwrap_or_default(),
            ..Default::default()
        };

        let labels = parse_label_pairs(
            &lookup("LOGS_LABELS").unwrap_or_else(|| DEFAULT_STDIN_LABELS.to_string()),
        );
        let flush_partial_on_drain = lookup("LOGS_FLUSH_PARTIAL_ON_DRAIN")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);

        let config = Self {
            log_level,
            clients: vec![client],
            labels,
            flush_partial_on_drain,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Creation> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Creation::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        for client in &self.clients {
            client.validate()?;
        }

        Ok(())
    }
}

/// Parses `key=value,key=value`. Malformed pairs are logged and skipped.
#[must_use]
pub fn parse_label_pairs(input: &str) -> LabelSet {
    let mut labels = LabelSet::new();
    for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                labels.insert(name.trim(), value.trim());
            }
            _ => {
                tracing::error!("Ignoring malformed label pair '{}'", pair);
            }
        }
    }
    labels
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
