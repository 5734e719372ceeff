// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::debug;
use url::Url;

use super::session::MAX_PENDING_LOGIN_TTL;
use super::Config;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_auth0_proxy --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// Only rules that hold for a partial configuration are checked here, values
/// that may still arrive from the command line are checked by
/// [`Config::validate`].
///
/// # Validation Rules
///
/// - **Port Range**: listener and upstream ports must be non-zero
/// - **Schemes**: upstream and Auth0 schemes must be `http` or `https`
/// - **Redirect URI**: when set, must be an absolute URL
/// - **Durations**: session timeout, exchange timeout, pending-login TTL and
///   sweep interval must be non-zero, the TTL at most one day
/// - **IP Address Format**: only logged when the listen address looks unusual
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.server.port == 0 {
        anyhow::bail!("Invalid listen port number: {}", config.server.port);
    }
    if config.upstream.port == 0 {
        anyhow::bail!("Invalid upstream port number: {}", config.upstream.port);
    }

    if !is_valid_ip_address(&config.server.address) {
        debug!(
            "Potentially invalid address format: {}",
            config.server.address
        );
    }

    for (name, scheme) in [
        ("upstream", &config.upstream.scheme),
        ("auth0", &config.auth0.scheme),
    ] {
        if scheme != "http" && scheme != "https" {
            anyhow::bail!("Invalid {} scheme: {} (expected http or https)", name, scheme);
        }
    }

    if !config.auth0.redirect_uri.is_empty() {
        Url::parse(&config.auth0.redirect_uri).with_context(|| {
            format!(
                "Auth0 redirect URI is not an absolute URL: {}",
                config.auth0.redirect_uri
            )
        })?;
    }

    if config.session.timeout == 0 {
        anyhow::bail!("Session timeout must be greater than zero");
    }
    if config.auth0.exchange_timeout == 0 {
        anyhow::bail!("Code exchange timeout must be greater than zero");
    }
    if config.session.pending_login_ttl == 0 {
        anyhow::bail!("Pending login TTL must be greater than zero");
    }
    if config.session.pending_login_ttl > MAX_PENDING_LOGIN_TTL {
        anyhow::bail!(
            "Pending login TTL must not exceed {} seconds",
            MAX_PENDING_LOGIN_TTL
        );
    }
    if config.session.sweep_interval == 0 {
        anyhow::bail!("Pending login sweep interval must be greater than zero");
    }
    if config.session.max_pending_logins == 0 {
        anyhow::bail!("Maximum number of pending logins must be greater than zero");
    }

    Ok(())
}
