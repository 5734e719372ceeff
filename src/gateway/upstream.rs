// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Upstream forwarding
//!
//! Authenticated requests are replayed against the configured upstream with
//! the same method, path, query, headers and body. Hop-by-hop headers are
//! dropped in both directions, `Host` is rewritten to the upstream authority
//! and the client address is appended to `X-Forwarded-For`.
//!
//! Upstream redirects are returned to the client untouched rather than
//! followed.

use log::debug;
use reqwest::header::{HeaderName, HeaderValue};
use rocket::http::{HeaderMap, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;
use std::net::IpAddr;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

/// Headers that only describe a single connection and are never forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("unsupported method: {0}")]
    Method(String),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

/// Header names listed in the `Connection` header, which are hop-by-hop too.
fn connection_tokens<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Build the header set sent upstream from the inbound headers.
pub fn forwarded_headers(
    inbound: &HeaderMap<'_>,
    client_ip: Option<IpAddr>,
) -> reqwest::header::HeaderMap {
    let extra_hops = connection_tokens(inbound.get("connection"));
    let mut headers = reqwest::header::HeaderMap::new();
    let mut forwarded_for: Vec<String> = Vec::new();

    for header in inbound.iter() {
        let name = header.name().as_str();
        if is_hop_by_hop(name)
            || extra_hops.iter().any(|hop| hop.eq_ignore_ascii_case(name))
            || name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("content-length")
        {
            continue;
        }
        if name.eq_ignore_ascii_case("x-forwarded-for") {
            forwarded_for.push(header.value().to_string());
            continue;
        }

        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(header.value()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!("Skipping header not representable upstream: {}", name),
        }
    }

    if let Some(ip) = client_ip {
        forwarded_for.push(ip.to_string());
    }
    if !forwarded_for.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&forwarded_for.join(", ")) {
            headers.insert("x-forwarded-for", value);
        }
    }

    headers
}

/// Buffered upstream answer, replayed to the client as is.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    async fn from_reqwest(response: reqwest::Response) -> Result<Self, UpstreamError> {
        let status = response.status().as_u16();
        let extra_hops = connection_tokens(
            response
                .headers()
                .get_all(reqwest::header::CONNECTION)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );

        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| {
                let name = name.as_str();
                !is_hop_by_hop(name)
                    && !extra_hops.iter().any(|hop| hop == name)
                    && name != "content-length"
            })
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(reqwest::Error::without_url)?
            .to_vec();
        Ok(Self {
            status,
            headers,
            body,
        })
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for UpstreamResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'o> {
        let mut builder = Response::build();
        builder.status(Status::new(self.status));
        // Adjoin rather than replace so repeated headers like Set-Cookie survive
        for (name, value) in self.headers {
            builder.raw_header_adjoin(name, value);
        }
        builder
            .sized_body(self.body.len(), Cursor::new(self.body))
            .ok()
    }
}

/// HTTP client bound to the configured upstream.
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    http: reqwest::Client,
    base_url: Url,
}

impl UpstreamProxy {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url()?,
        })
    }

    /// Upstream URL for an inbound origin-form target such as `/a/b?c=d`.
    ///
    /// The path is set on the base URL rather than joined, so a target like
    /// `//other.host/x` cannot change the upstream authority.
    pub fn target_url(&self, origin: &str) -> Url {
        let (path, query) = match origin.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (origin, None),
        };
        let mut url = self.base_url.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }

    /// Replay `request` with `body` against the upstream.
    pub async fn forward(
        &self,
        request: &Request<'_>,
        body: Vec<u8>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let origin = request.uri().to_string();
        let url = self.target_url(&origin);
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|_| UpstreamError::Method(request.method().as_str().to_string()))?;
        let headers = forwarded_headers(request.headers(), request.client_ip());

        // The query may carry an authorization code, only the path is logged
        debug!("Forwarding {} {} upstream", method, request.uri().path());
        let response = self
            .http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        UpstreamResponse::from_reqwest(response).await
    }
}
