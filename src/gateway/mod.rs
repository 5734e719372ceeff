// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authenticating gateway
//!
//! Every inbound request goes through the [`gate::AuthGate`] handler, which
//! either forwards it to the upstream, sends the browser to Auth0, or
//! completes a login when Auth0 sends the browser back with a `code`.
//!
//! ## Modules
//!
//! - [`gate`]: per-request decision and the catch-all Rocket routes
//! - [`registry`]: requests waiting for their login to complete
//! - [`exchange`]: authorization code redemption on the token endpoint
//! - [`session`]: the encrypted session cookie
//! - [`upstream`]: request forwarding
//! - [`server`]: Rocket assembly and the registry sweeper

pub mod error;
pub mod exchange;
pub mod gate;
pub mod registry;
pub mod server;
pub mod session;
pub mod state_key;
pub mod upstream;

pub use error::GateError;
pub use exchange::{CodeExchanger, ExchangeError, TokenResponse};
pub use gate::{AuthGate, GateDecision};
pub use registry::{PendingLogin, PendingLoginRegistry};
pub use server::build_rocket;
pub use session::{Session, SessionError, SESSION_COOKIE_NAME};
pub use state_key::generate_state_key;
pub use upstream::{UpstreamError, UpstreamProxy, UpstreamResponse};
