// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Session cookie handling
//!
//! The session is a Rocket private cookie named [`SESSION_COOKIE_NAME`]. Its
//! value is encrypted and authenticated with the key Rocket derives from the
//! configured `secret_key`, so the browser can hold it but neither read nor
//! forge it. The payload only records when the session was issued and when it
//! stops being valid; the proxy never needs more than "has this browser
//! logged in".
//!
//! Three situations are told apart when loading:
//!
//! - no cookie at all, or a payload past its expiry: a new session
//! - a cookie that cannot be decrypted or parsed: [`SessionError`]
//! - a readable, unexpired payload: an established session

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rocket::http::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::SessionConfig;

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "auth0-proxy";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookie could not be decrypted")]
    Undecryptable,

    #[error("session cookie payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Contents of the session cookie, as unix timestamps in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub issued_at: i64,
    pub expires_at: i64,
}

impl SessionPayload {
    fn issue(now: DateTime<Utc>, max_age: Duration) -> Self {
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        Self {
            issued_at: now.timestamp(),
            expires_at: now.timestamp().saturating_add(max_age),
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }
}

/// What the gate learns about the caller's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// `true` when the request carried no usable session.
    pub is_new: bool,

    /// Lifetime of the session from the moment it was issued.
    pub max_age: Duration,
}

impl Session {
    fn new_unauthenticated() -> Self {
        Self {
            is_new: true,
            max_age: Duration::ZERO,
        }
    }

    fn from_payload(payload: SessionPayload) -> Self {
        let lifetime = payload.expires_at.saturating_sub(payload.issued_at).max(0);
        Self {
            is_new: false,
            max_age: Duration::from_secs(lifetime as u64),
        }
    }

    /// A session that was presented by the caller and is still valid.
    pub fn is_valid(&self) -> bool {
        !self.is_new
    }
}

/// Cookie attributes applied when a session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub max_age: Duration,
    pub secure: bool,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_age: Duration::from_secs(config.timeout),
            secure: config.secure,
        }
    }
}

/// Read the caller's session from the cookie jar.
pub fn load(cookies: &CookieJar<'_>) -> Result<Session, SessionError> {
    if cookies.get(SESSION_COOKIE_NAME).is_none() {
        return Ok(Session::new_unauthenticated());
    }

    let cookie = cookies
        .get_private(SESSION_COOKIE_NAME)
        .ok_or(SessionError::Undecryptable)?;
    let payload: SessionPayload = serde_json::from_str(cookie.value())?;

    if payload.is_expired_at(Utc::now()) {
        debug!("Session cookie expired at {}", payload.expires_at);
        return Ok(Session::new_unauthenticated());
    }

    Ok(Session::from_payload(payload))
}

/// Issue a fresh session cookie after a successful login.
pub fn establish(
    cookies: &CookieJar<'_>,
    settings: &SessionSettings,
) -> Result<Session, SessionError> {
    let payload = SessionPayload::issue(Utc::now(), settings.max_age);
    let value = serde_json::to_string(&payload)?;

    let max_age = i64::try_from(settings.max_age.as_secs()).unwrap_or(i64::MAX);
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, value);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(settings.secure);
    cookie.set_max_age(rocket::time::Duration::seconds(max_age));
    cookies.add_private(cookie);

    debug!("Session established for {}s", settings.max_age.as_secs());
    Ok(Session::from_payload(payload))
}

/// Expire the session cookie on the client.
///
/// Used when the presented cookie is unreadable, so the next request starts a
/// clean login instead of failing again.
pub fn discard(cookies: &CookieJar<'_>) {
    warn!("Discarding unreadable session cookie");
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookies.remove(cookie);
}
