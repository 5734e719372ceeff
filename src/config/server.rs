// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Listener configuration
//!
//! This module defines where the proxy listens and how much of an inbound
//! request body it is willing to buffer before forwarding it.

use serde::{Deserialize, Serialize};

/// Configuration for the proxy listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The TCP port the proxy listens on.
    ///
    /// Valid range is 1-65535. Default value is 80.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The network address the proxy binds to.
    ///
    /// Default is "0.0.0.0", every IPv4 interface.
    #[serde(default = "default_address")]
    pub address: String,

    /// The server name reported in the `Server` header.
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum size in bytes of an inbound body forwarded upstream.
    ///
    /// Larger bodies are answered with `413 Payload Too Large`.
    #[serde(default = "default_body_limit")]
    pub body_limit: u64,
}

fn default_port() -> u16 {
    80
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_name() -> String {
    format!("Auth0Proxy/{}", env!("CARGO_PKG_VERSION"))
}

/// 10 MiB
fn default_body_limit() -> u64 {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            name: default_name(),
            body_limit: default_body_limit(),
        }
    }
}
