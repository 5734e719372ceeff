// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Auth0 authenticating reverse proxy
//!
//! Requests without a session are sent through the Auth0 authorization code
//! flow before they are forwarded to a single upstream service.

pub mod cli;
pub mod config;
pub mod gateway;
