// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Construction of the HTTP client a real push client would send with.
//!
//! The debug sink never sends anything; it builds the client only to surface
//! configuration errors the same way a real client would.

use reqwest::{Client, Proxy, Url};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::Creation;

/// Parses the push endpoint, accepting only http(s).
pub fn parse_endpoint(url: &str) -> Result<Url, Creation> {
    let parsed = Url::parse(url)
        .map_err(|e| Creation::InvalidConfig(format!("invalid url '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(Creation::InvalidConfig(format!(
            "unsupported url scheme '{scheme}' in '{url}'"
        ))),
    }
}

/// Builds the transport client for `config`.
pub fn build_client(config: &ClientConfig) -> Result<Client, Creation> {
    config.validate()?;
    parse_endpoint(&config.url)?;

    let mut builder = Client::builder().timeout(config.timeout);
    if let Some(proxy_url) = &config.proxy_url {
        builder = builder.proxy(Proxy::all(proxy_url)?);
    }
    Ok(builder.build()?)
}

/// Builds and drops the transport client for every config. Stops at the
/// first error.
pub fn validate_all(configs: &[ClientConfig]) -> Result<(), Creation> {
    for config in configs {
        let _client = build_client(config)?;
        debug!(
            "Validated client configuration for {}",
            config.name.as_deref().unwrap_or(&config.url)
        );
    }
    Ok(())
}
