// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use log::{error, warn};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use thiserror::Error;

use super::exchange::ExchangeError;
use super::session::SessionError;
use super::upstream::UpstreamError;

/// Everything that can stop the gate from answering a request normally.
///
/// The client only ever sees a status and a fixed reason phrase; the detail
/// goes to the log.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("session error: {0}")]
    SessionLoad(#[from] SessionError),

    #[error("code exchange failed: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("forwarding failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("failed to read request body: {0}")]
    Body(#[from] std::io::Error),
}

impl GateError {
    pub fn status(&self) -> Status {
        match self {
            GateError::SessionLoad(_) => Status::InternalServerError,
            GateError::Exchange(e) if e.is_authentication_failure() => Status::Unauthorized,
            GateError::Exchange(_) => Status::InternalServerError,
            GateError::Upstream(_) => Status::BadGateway,
            GateError::PayloadTooLarge { .. } => Status::PayloadTooLarge,
            GateError::Body(_) => Status::BadRequest,
        }
    }

    /// Body sent to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            GateError::Exchange(e) if e.is_authentication_failure() => "Authentication failed",
            _ => self.status().reason().unwrap_or("Error"),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for GateError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{} {}: {}", request.method(), request.uri().path(), self);
        } else {
            warn!("{} {}: {}", request.method(), request.uri().path(), self);
        }
        (status, self.public_message()).respond_to(request)
    }
}
