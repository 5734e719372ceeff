// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Session gate
//!
//! The gate is a catch-all Rocket handler placed in front of the upstream.
//! For every request it picks one of three paths, in this order:
//!
//! 1. the caller holds a valid session: forward upstream
//! 2. the query carries a non-empty `code`: redeem it, issue a session, then
//!    send the caller back to the request that started the login (or forward
//!    the callback itself when that request is unknown)
//! 3. anything else: remember the request and redirect to Auth0
//!
//! An unreadable session cookie aborts with a 500 and is cleared, so the next
//! attempt starts from a clean login.

use log::{debug, info};
use rocket::data::{ByteUnit, Data};
use rocket::http::Method;
use rocket::request::Request;
use rocket::response::{self, Redirect, Responder};
use rocket::route::{self, Handler, Route};
use url::Url;

use super::error::GateError;
use super::exchange::CodeExchanger;
use super::registry::{PendingLogin, PendingLoginRegistry};
use super::session::{self, SessionSettings};
use super::state_key::generate_state_key;
use super::upstream::{UpstreamProxy, UpstreamResponse};
use crate::config::Config;

/// Rank of the catch-all routes. Anything mounted with a lower rank wins.
pub const GATE_RANK: isize = 100;

/// Methods the gate answers to.
pub const GATE_METHODS: [Method; 8] = [
    Method::Get,
    Method::Head,
    Method::Post,
    Method::Put,
    Method::Delete,
    Method::Patch,
    Method::Options,
    Method::Trace,
];

/// Outcome of [`AuthGate::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Valid session, hand the request to the upstream.
    Forward,

    /// No session, send the browser to this authorize URL.
    Redirect(Url),

    /// Callback from the identity provider.
    HandleCallback { code: String, state: Option<String> },
}

/// Successful answers of the gate.
#[derive(Debug)]
pub enum GateResponse {
    Redirect(Redirect),
    Upstream(UpstreamResponse),
}

impl<'r> Responder<'r, 'static> for GateResponse {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match self {
            GateResponse::Redirect(redirect) => redirect.respond_to(request),
            GateResponse::Upstream(upstream) => upstream.respond_to(request),
        }
    }
}

/// The handler mounted on every path of the proxy.
#[derive(Debug, Clone)]
pub struct AuthGate {
    registry: PendingLoginRegistry,
    exchanger: CodeExchanger,
    upstream: UpstreamProxy,
    session: SessionSettings,
    body_limit: u64,
}

impl AuthGate {
    pub fn new(config: &Config, registry: PendingLoginRegistry) -> anyhow::Result<Self> {
        Ok(Self {
            registry,
            exchanger: CodeExchanger::new(&config.auth0)?,
            upstream: UpstreamProxy::new(&config.upstream)?,
            session: SessionSettings::from(&config.session),
            body_limit: config.server.body_limit,
        })
    }

    pub fn registry(&self) -> &PendingLoginRegistry {
        &self.registry
    }

    /// One catch-all route per supported method.
    pub fn routes(&self) -> Vec<Route> {
        GATE_METHODS
            .iter()
            .map(|method| Route::ranked(GATE_RANK, *method, "/<path..>", self.clone()))
            .collect()
    }

    /// Decide how to answer `request`.
    ///
    /// On the redirect path the request is registered under a fresh state key
    /// before the authorize URL is returned.
    pub fn decide(&self, request: &Request<'_>) -> Result<GateDecision, GateError> {
        let current = match session::load(request.cookies()) {
            Ok(current) => current,
            Err(e) => {
                session::discard(request.cookies());
                return Err(e.into());
            }
        };

        if current.is_valid() {
            return Ok(GateDecision::Forward);
        }

        if let Some(code) = query_param(request, "code").filter(|code| !code.is_empty()) {
            return Ok(GateDecision::HandleCallback {
                code,
                state: query_param(request, "state"),
            });
        }

        let key = generate_state_key();
        self.registry
            .put(key.clone(), PendingLogin::from_request(request, self.registry.ttl()));
        Ok(GateDecision::Redirect(self.exchanger.authorization_url(&key)))
    }

    async fn respond<'r>(
        &self,
        request: &'r Request<'_>,
        data: Data<'r>,
    ) -> Result<GateResponse, GateError> {
        match self.decide(request)? {
            GateDecision::Forward => self.forward(request, data).await,
            GateDecision::Redirect(url) => {
                debug!("Redirecting {} to login", request.uri());
                Ok(GateResponse::Redirect(Redirect::to(url.to_string())))
            }
            GateDecision::HandleCallback { code, state } => {
                self.callback(request, data, &code, state.as_deref()).await
            }
        }
    }

    async fn callback<'r>(
        &self,
        request: &'r Request<'_>,
        data: Data<'r>,
        code: &str,
        state: Option<&str>,
    ) -> Result<GateResponse, GateError> {
        // A failed exchange leaves the pending login in place so the caller
        // can retry the same round trip.
        self.exchanger.exchange(code).await?;
        session::establish(request.cookies(), &self.session)?;

        match state.and_then(|key| self.registry.take_if_present(key)) {
            Some(login) => {
                info!(
                    "Login completed on {}, returning to {}",
                    login.host.as_deref().unwrap_or("unknown host"),
                    login.uri
                );
                Ok(GateResponse::Redirect(Redirect::to(login.uri)))
            }
            None => {
                debug!("No pending login for callback state, forwarding");
                self.forward(request, data).await
            }
        }
    }

    async fn forward<'r>(
        &self,
        request: &'r Request<'_>,
        data: Data<'r>,
    ) -> Result<GateResponse, GateError> {
        let body = data.open(ByteUnit::from(self.body_limit)).into_bytes().await?;
        if !body.is_complete() {
            return Err(GateError::PayloadTooLarge {
                limit: self.body_limit,
            });
        }

        let response = self.upstream.forward(request, body.into_inner()).await?;
        Ok(GateResponse::Upstream(response))
    }
}

fn query_param(request: &Request<'_>, name: &str) -> Option<String> {
    request.query_value::<String>(name).and_then(Result::ok)
}

#[rocket::async_trait]
impl Handler for AuthGate {
    async fn handle<'r>(&self, request: &'r Request<'_>, data: Data<'r>) -> route::Outcome<'r> {
        match self.respond(request, data).await {
            Ok(response) => route::Outcome::from(request, response),
            Err(error) => route::Outcome::from(request, error),
        }
    }
}
