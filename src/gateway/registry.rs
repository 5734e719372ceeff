// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Pending-login registry
//!
//! While a browser is away at the identity provider, the proxy remembers the
//! request that sent it there under the `state` key of the round trip. When
//! the callback comes back with the same key, the entry is taken out of the
//! registry and the browser is redirected to where it started.
//!
//! Entries are single-use and expire after a fixed TTL. The map is shared
//! between every Rocket worker, so all access goes through a mutex.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use rocket::Request;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::session::{SessionConfig, MAX_PENDING_LOGIN_TTL};

/// The part of an inbound request needed to send the caller back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    /// HTTP method of the original request.
    pub method: String,

    /// `Host` header of the original request, when present.
    pub host: Option<String>,

    /// Origin-form target of the original request: path plus query.
    ///
    /// The post-login redirect points here. Keeping it relative means the
    /// redirect can never leave the host the browser was already talking to.
    pub uri: String,

    /// When the browser was sent to the identity provider.
    pub created_at: DateTime<Utc>,

    /// After this instant the entry is treated as absent.
    pub expires_at: DateTime<Utc>,
}

impl PendingLogin {
    /// Create an entry for `uri` that expires `ttl` from now.
    pub fn new(
        method: impl Into<String>,
        host: Option<String>,
        uri: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            method: method.into(),
            host,
            uri: uri.into(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Capture method, host and target of a Rocket request.
    pub fn from_request(request: &Request<'_>, ttl: Duration) -> Self {
        Self::new(
            request.method().as_str(),
            request.host().map(|host| host.to_string()),
            request.uri().to_string(),
            ttl,
        )
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Thread-safe, TTL-bounded map from state key to [`PendingLogin`].
///
/// Cloning the registry yields a handle on the same underlying map.
#[derive(Debug, Clone)]
pub struct PendingLoginRegistry {
    entries: Arc<Mutex<HashMap<String, PendingLogin>>>,
    ttl: Duration,
    capacity: usize,
}

impl PendingLoginRegistry {
    /// Create an empty registry whose entries live for `ttl` and which holds
    /// at most `capacity` entries.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let ttl = config.pending_login_ttl.min(MAX_PENDING_LOGIN_TTL) as i64;
        Self::new(Duration::seconds(ttl), config.max_pending_logins)
    }

    /// Lifetime given to entries created through [`PendingLogin::from_request`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A panic while holding the lock cannot leave the map half-updated, every
    // critical section is a single HashMap call or a retain.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingLogin>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `login` under `key`.
    ///
    /// When the registry is full, expired entries are purged first and, if
    /// that is not enough, the oldest pending login is evicted.
    pub fn put(&self, key: impl Into<String>, login: PendingLogin) {
        let key = key.into();
        let mut entries = self.lock();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let now = Utc::now();
            entries.retain(|_, entry| !entry.is_expired_at(now));

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    warn!("Pending login registry full, evicting the oldest login attempt");
                    entries.remove(&oldest);
                }
            }
        }

        debug!("Registering pending login for {} {}", login.method, login.uri);
        entries.insert(key, login);
    }

    /// Remove and return the entry registered under `key`.
    ///
    /// Read and delete happen under one lock, so two callbacks racing on the
    /// same key cannot both obtain the entry. An expired entry is removed and
    /// reported as absent.
    pub fn take_if_present(&self, key: &str) -> Option<PendingLogin> {
        let login = self.lock().remove(key)?;
        if login.is_expired_at(Utc::now()) {
            debug!("Pending login for {} expired before its callback", login.uri);
            return None;
        }
        Some(login)
    }

    /// Whether a live entry is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|login| !login.is_expired_at(Utc::now()))
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, login| !login.is_expired_at(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until the next purge.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
