// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Session and pending-login configuration

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Secret used when none is configured. Accepted so the proxy starts like the
/// historical command line did, but [`crate::config::Config::validate`] warns.
pub const DEFAULT_SESSION_SECRET: &str = "some-secret-key";

/// Longest accepted pending-login TTL, one day.
pub const MAX_PENDING_LOGIN_TTL: u64 = 86_400;

/// Session cookie and pending-login settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Secret the session cookie key is derived from.
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Session lifetime in seconds, sent as the cookie `Max-Age`. Default is 3600.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Mark the session cookie `Secure`. Enable when clients reach the proxy over HTTPS.
    #[serde(default)]
    pub secure: bool,

    /// Seconds a pending login waits for its callback before it is forgotten.
    #[serde(default = "default_pending_login_ttl")]
    pub pending_login_ttl: u64,

    /// Upper bound on simultaneously pending logins.
    #[serde(default = "default_max_pending_logins")]
    pub max_pending_logins: usize,

    /// Seconds between two sweeps of expired pending logins.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

fn default_secret() -> String {
    DEFAULT_SESSION_SECRET.to_string()
}

fn default_timeout() -> u64 {
    3600
}

fn default_pending_login_ttl() -> u64 {
    600
}

fn default_max_pending_logins() -> usize {
    10_000
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            timeout: default_timeout(),
            secure: false,
            pending_login_ttl: default_pending_login_ttl(),
            max_pending_logins: default_max_pending_logins(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl SessionConfig {
    /// Hex encoded SHA-256 of the secret, in the form Rocket accepts as `secret_key`.
    ///
    /// Rocket derives its cookie encryption key from a 256-bit master key, so
    /// an arbitrary length secret string is hashed down to exactly that size.
    pub fn secret_key_hex(&self) -> String {
        Sha256::digest(self.secret.as_bytes())
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SESSION_SECRET
    }
}
