// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Upstream service configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// The single upstream host that receives authenticated requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Upstream host name or IP address. Required, no default.
    #[serde(default)]
    pub host: String,

    /// Upstream TCP port. Default is 80.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream scheme, `http` or `https`. Default is `http`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_port() -> u16 {
    80
}

fn default_scheme() -> String {
    "http".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            scheme: default_scheme(),
        }
    }
}

impl UpstreamConfig {
    /// Base URL every forwarded request path is appended to.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_auth0_proxy::config::UpstreamConfig;
    ///
    /// let upstream = UpstreamConfig {
    ///     host: "backend".to_string(),
    ///     port: 8080,
    ///     scheme: "http".to_string(),
    /// };
    /// assert_eq!(upstream.base_url().unwrap().as_str(), "http://backend:8080/");
    /// ```
    pub fn base_url(&self) -> Result<Url> {
        let raw = format!("{}://{}:{}", self.scheme, self.host, self.port);
        Url::parse(&raw).with_context(|| format!("Invalid upstream URL: {}", raw))
    }
}
