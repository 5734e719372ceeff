// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Auth0 identity provider configuration
//!
//! The proxy talks to two endpoints of the tenant: `/authorize`, where the
//! browser is redirected to log in, and `/oauth/token`, where the proxy
//! exchanges the returned authorization code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Auth0 tenant and application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth0Config {
    /// Tenant domain, e.g. `my-tenant.eu.auth0.com`. Required.
    #[serde(default)]
    pub domain: String,

    /// Application client id. Required.
    #[serde(default)]
    pub client_id: String,

    /// Application client secret, sent only in the back-channel token exchange.
    #[serde(default)]
    pub client_secret: String,

    /// Callback URL registered for the application in Auth0.
    ///
    /// Must match the registered value exactly, and must route back to this
    /// proxy so that the `code` parameter reaches the gate.
    #[serde(default)]
    pub redirect_uri: String,

    /// Scheme used to reach the tenant. Always `https` against Auth0, only a
    /// local stand-in identity provider would use `http`.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Upper bound in seconds for the code exchange call. Default is 10.
    #[serde(default = "default_exchange_timeout")]
    pub exchange_timeout: u64,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_exchange_timeout() -> u64 {
    10
}

impl Default for Auth0Config {
    fn default() -> Self {
        Self {
            domain: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scheme: default_scheme(),
            exchange_timeout: default_exchange_timeout(),
        }
    }
}

impl Auth0Config {
    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}://{}{}", self.scheme, self.domain, path);
        Url::parse(&raw).with_context(|| format!("Invalid Auth0 endpoint: {}", raw))
    }

    /// `https://{domain}/authorize`, without query parameters.
    pub fn authorize_url(&self) -> Result<Url> {
        self.endpoint("/authorize")
    }

    /// `https://{domain}/oauth/token`
    pub fn token_url(&self) -> Result<Url> {
        self.endpoint("/oauth/token")
    }
}
