// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authorization code exchange
//!
//! After Auth0 sends the browser back with a `code`, the proxy redeems that
//! code on the tenant's `/oauth/token` endpoint over the back channel. Only a
//! 2xx answer carrying a JSON object counts as a successful login.
//!
//! The call is bounded by the configured exchange timeout and never retried.
//! It runs inside the request handler future, so a client that disconnects
//! cancels it.

use anyhow::Context;
use log::{debug, warn};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::Auth0Config;

/// `User-Agent` sent to the identity provider.
pub const USER_AGENT: &str = concat!("rust_auth0_proxy/", env!("CARGO_PKG_VERSION"));

/// Tokens returned by the identity provider.
///
/// Every field is optional because the proxy only needs to know the exchange
/// succeeded. Nothing here is kept once the session cookie is issued.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The provider could not be reached, or did not answer in time.
    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("token endpoint rejected the code with status {status}")]
    Rejected { status: StatusCode },

    /// A 2xx answer whose body is not a token object.
    #[error("token endpoint returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl ExchangeError {
    /// Whether the failure means the login itself was refused, as opposed to
    /// the proxy failing to reach the provider.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            ExchangeError::Rejected { .. } | ExchangeError::InvalidResponse(_)
        )
    }
}

/// Client for the tenant's authorize and token endpoints.
#[derive(Debug, Clone)]
pub struct CodeExchanger {
    http: reqwest::Client,
    authorize_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl CodeExchanger {
    pub fn new(config: &Auth0Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.exchange_timeout))
            .build()
            .context("Failed to build HTTP client for the token exchange")?;

        Ok(Self {
            http,
            authorize_url: config.authorize_url()?,
            token_url: config.token_url()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// URL the browser is sent to in order to log in, carrying `state`.
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state);
        url
    }

    /// Redeem `code` on the token endpoint.
    pub async fn exchange(&self, code: &str) -> Result<TokenResponse, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        debug!("Exchanging authorization code at {}", self.token_url);
        let response = self
            .http
            .post(self.token_url.clone())
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-cache")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token endpoint answered {}: {}", status, body);
            return Err(ExchangeError::Rejected { status });
        }

        let body = response.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;
        if !value.is_object() {
            return Err(ExchangeError::InvalidResponse(
                "expected a JSON object".to_string(),
            ));
        }
        let tokens: TokenResponse = serde_json::from_value(value)
            .map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;

        debug!(
            "Code exchange succeeded (token type {:?}, id token {}, expires in {:?}s)",
            tokens.token_type,
            if tokens.id_token.is_some() { "present" } else { "absent" },
            tokens.expires_in
        );
        Ok(tokens)
    }
}
