// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End-to-end tests of the login flow
//!
//! Both the identity provider and the upstream service are wiremock servers.
//! The proxy is driven through Rocket's local client, so no port is bound for
//! the proxy itself.

use rocket::http::{Cookie, Method, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use rust_auth0_proxy::config::Config;
use rust_auth0_proxy::gateway::{build_rocket, PendingLoginRegistry, SESSION_COOKIE_NAME};
use serde_json::json;
use std::sync::Once;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// Identity provider and upstream stand-ins for one test.
struct Harness {
    idp: MockServer,
    upstream: MockServer,
}

impl Harness {
    async fn start() -> Self {
        init_logger();
        Self {
            idp: MockServer::start().await,
            upstream: MockServer::start().await,
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.upstream.host = "127.0.0.1".to_string();
        config.upstream.port = self.upstream.address().port();
        config.auth0.domain = self.idp.address().to_string();
        config.auth0.scheme = "http".to_string();
        config.auth0.client_id = "proxy-client".to_string();
        config.auth0.client_secret = "proxy-secret".to_string();
        config.auth0.redirect_uri = "http://proxy.local/".to_string();
        config.auth0.exchange_timeout = 2;
        config.session.secret = "integration-test-secret".to_string();
        config
    }

    async fn token_endpoint_answers(&self, status: u16) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access",
                "id_token": "id",
                "token_type": "Bearer",
                "expires_in": 86400
            }))
        } else {
            ResponseTemplate::new(status).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization code"
            }))
        };

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(template)
            .mount(&self.idp)
            .await;
    }

    async fn upstream_answers(&self, body: &str) {
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.upstream)
            .await;
    }

    async fn idp_calls(&self) -> usize {
        self.idp.received_requests().await.unwrap_or_default().len()
    }

    async fn client_with(&self, config: &Config, tracked: bool) -> Client {
        let figment =
            rocket::Config::figment().merge(("log_level", rocket::config::LogLevel::Off));
        let rocket = build_rocket(figment, config)
            .await
            .expect("valid proxy configuration");
        if tracked {
            Client::tracked(rocket).await.expect("valid rocket instance")
        } else {
            Client::untracked(rocket).await.expect("valid rocket instance")
        }
    }

    async fn tracked_client(&self) -> Client {
        self.client_with(&self.config(), true).await
    }

    async fn untracked_client(&self) -> Client {
        self.client_with(&self.config(), false).await
    }
}

fn registry(client: &Client) -> &PendingLoginRegistry {
    client
        .rocket()
        .state::<PendingLoginRegistry>()
        .expect("registry is managed")
}

fn location(response: &LocalResponse<'_>) -> String {
    response
        .headers()
        .get_one("Location")
        .expect("Location header present")
        .to_string()
}

fn state_from(response: &LocalResponse<'_>) -> String {
    let url = Url::parse(&location(response)).expect("absolute authorize URL");
    url.query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state parameter present")
}

/// Go through the full login round trip starting at `target`.
async fn login(client: &Client, target: &str) {
    let response = client.get(target.to_string()).dispatch().await;
    assert_eq!(response.status(), Status::SeeOther);
    let state = state_from(&response);

    let response = client
        .get(format!("/?code=valid-code&state={}", state))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), target);
}

#[rocket::async_test]
async fn test_no_session_redirects_to_authorize() {
    let harness = Harness::start().await;
    let client = harness.untracked_client().await;

    let response = client.get("/reports?year=2024").dispatch().await;
    assert_eq!(response.status(), Status::SeeOther);

    let url = Url::parse(&location(&response)).unwrap();
    assert_eq!(url.scheme(), "http");
    assert_eq!(
        url.host_str(),
        Some(harness.idp.address().ip().to_string().as_str())
    );
    assert_eq!(url.path(), "/authorize");
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
    assert!(pairs.contains(&("client_id".to_string(), "proxy-client".to_string())));
    assert!(pairs.contains(&("redirect_uri".to_string(), "http://proxy.local/".to_string())));

    let state = state_from(&response);
    assert_eq!(state.len(), 43);
    assert_eq!(registry(&client).len(), 1);
    assert!(registry(&client).contains(&state));
    assert!(response.cookies().get(SESSION_COOKIE_NAME).is_none());
    assert_eq!(harness.idp_calls().await, 0);
}

#[rocket::async_test]
async fn test_each_redirect_uses_a_fresh_state() {
    let harness = Harness::start().await;
    let client = harness.untracked_client().await;

    let first = state_from(&client.get("/a").dispatch().await);
    let second = state_from(&client.get("/a").dispatch().await);

    assert_ne!(first, second);
    assert_eq!(registry(&client).len(), 2);
}

#[rocket::async_test]
async fn test_callback_sets_session_and_returns_to_original_request() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    let client = harness.untracked_client().await;

    let response = client.get("/reports?year=2024").dispatch().await;
    let state = state_from(&response);

    let response = client
        .get(format!("/?code=valid-code&state={}", state))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), "/reports?year=2024");
    let cookie = response
        .cookies()
        .get(SESSION_COOKIE_NAME)
        .expect("session cookie set");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.max_age(), Some(rocket::time::Duration::seconds(3600)));
    assert!(!registry(&client).contains(&state));
    assert_eq!(harness.idp_calls().await, 1);

    let exchange = &harness.idp.received_requests().await.unwrap()[0];
    let form = String::from_utf8_lossy(&exchange.body);
    assert!(form.contains("client_id=proxy-client"));
    assert!(form.contains("client_secret=proxy-secret"));
    assert!(form.contains("code=valid-code"));
}

#[rocket::async_test]
async fn test_replayed_state_is_forwarded() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    harness.upstream_answers("upstream content").await;
    let client = harness.untracked_client().await;

    let state = state_from(&client.get("/secret").dispatch().await);
    let callback = format!("/?code=valid-code&state={}", state);

    let first = client.get(callback.clone()).dispatch().await;
    assert_eq!(first.status(), Status::SeeOther);

    let replay = client.get(callback).dispatch().await;
    assert_eq!(replay.status(), Status::Ok);
    assert!(replay.headers().get_one("Location").is_none());
    assert_eq!(replay.into_string().await.unwrap(), "upstream content");
}

#[rocket::async_test]
async fn test_unknown_state_is_forwarded() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    harness.upstream_answers("callback page").await;
    let client = harness.untracked_client().await;

    let response = client
        .get("/?code=valid-code&state=never-issued")
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    assert!(response.cookies().get(SESSION_COOKIE_NAME).is_some());
    assert_eq!(response.into_string().await.unwrap(), "callback page");

    let forwarded = &harness.upstream.received_requests().await.unwrap()[0];
    assert_eq!(forwarded.url.path(), "/");
    assert_eq!(forwarded.url.query(), Some("code=valid-code&state=never-issued"));
}

#[rocket::async_test]
async fn test_rejected_code_creates_no_session() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(403).await;
    let client = harness.untracked_client().await;

    let state = state_from(&client.get("/reports").dispatch().await);
    let response = client
        .get(format!("/?code=forged&state={}", state))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
    assert!(response.headers().get_one("Location").is_none());
    assert!(response.cookies().get(SESSION_COOKIE_NAME).is_none());
    let body = response.into_string().await.unwrap();
    assert_eq!(body, "Authentication failed");
    assert!(!body.contains("invalid_grant"));

    // The pending login survives a failed exchange
    assert!(registry(&client).contains(&state));
}

#[rocket::async_test]
async fn test_unreachable_provider_is_internal_error() {
    let harness = Harness::start().await;
    let mut config = harness.config();
    // Nothing listens on the discard port
    config.auth0.domain = "127.0.0.1:9".to_string();
    let client = harness.client_with(&config, false).await;

    let response = client.get("/?code=valid-code&state=x").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
    assert!(response.cookies().get(SESSION_COOKIE_NAME).is_none());
}

#[rocket::async_test]
async fn test_valid_session_is_forwarded_without_provider_calls() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    harness.upstream_answers("dashboard").await;
    let client = harness.tracked_client().await;

    login(&client, "/dashboard").await;
    assert_eq!(harness.idp_calls().await, 1);

    for target in ["/dashboard", "/dashboard?code=stale&state=whatever", "/other"] {
        let response = client.get(target).dispatch().await;
        assert_eq!(response.status(), Status::Ok, "{} should be forwarded", target);
        assert_eq!(response.into_string().await.unwrap(), "dashboard");
    }

    assert_eq!(harness.idp_calls().await, 1);
    assert_eq!(registry(&client).len(), 0);
}

#[rocket::async_test]
async fn test_upstream_headers_are_not_augmented() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    harness.upstream_answers("plain").await;
    let client = harness.tracked_client().await;

    login(&client, "/plain").await;
    let response = client.get("/plain").dispatch().await;

    assert_eq!(response.status(), Status::Ok);
    assert!(response.headers().get_one("X-Frame-Options").is_none());
    assert!(response.headers().get_one("X-Content-Type-Options").is_none());
    assert!(response.headers().get_one("Permissions-Policy").is_none());
}

#[rocket::async_test]
async fn test_expired_session_cookie_redirects_to_login() {
    let harness = Harness::start().await;
    harness.upstream_answers("should not be reached").await;
    let client = harness.untracked_client().await;

    let response = client
        .get("/dashboard")
        .private_cookie(Cookie::new(
            SESSION_COOKIE_NAME,
            r#"{"issued_at":0,"expires_at":1}"#,
        ))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::SeeOther);
    let url = Url::parse(&location(&response)).unwrap();
    assert_eq!(url.path(), "/authorize");
    assert_eq!(registry(&client).len(), 1);
    assert!(harness
        .upstream
        .received_requests()
        .await
        .unwrap_or_default()
        .is_empty());
}

#[rocket::async_test]
async fn test_trace_requests_reach_the_gate() {
    let harness = Harness::start().await;
    let client = harness.untracked_client().await;

    let response = client.req(Method::Trace, "/diagnostics").dispatch().await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(registry(&client).len(), 1);
}

#[rocket::async_test]
async fn test_corrupt_session_cookie_is_rejected_and_cleared() {
    let harness = Harness::start().await;
    let client = harness.untracked_client().await;

    let response = client
        .get("/dashboard")
        .cookie(Cookie::new(SESSION_COOKIE_NAME, "tampered-value"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::InternalServerError);
    let removal = response
        .cookies()
        .get(SESSION_COOKIE_NAME)
        .expect("removal cookie sent")
        .clone();
    assert_eq!(removal.value(), "");
    assert_eq!(
        response.into_string().await.unwrap(),
        "Internal Server Error"
    );
    assert!(registry(&client).is_empty());
}

#[rocket::async_test]
async fn test_forwarding_rewrites_connection_headers() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    Mock::given(method("POST"))
        .and(path("/api/items"))
        .respond_with(
            ResponseTemplate::new(201)
                .append_header("set-cookie", "app=1; Path=/")
                .append_header("set-cookie", "theme=dark; Path=/")
                .set_body_string("created"),
        )
        .mount(&harness.upstream)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&harness.upstream)
        .await;
    let client = harness.tracked_client().await;
    login(&client, "/start").await;

    let response = client
        .post("/api/items?draft=true")
        .header(rocket::http::Header::new("X-Request-Id", "abc-123"))
        .header(rocket::http::Header::new("Upgrade", "h2c"))
        .remote("10.1.2.3:5555".parse().unwrap())
        .body(r#"{"name":"widget"}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Created);
    assert_eq!(response.headers().get("Set-Cookie").count(), 2);
    assert_eq!(response.into_string().await.unwrap(), "created");

    let requests = harness.upstream.received_requests().await.unwrap();
    let forwarded = requests
        .iter()
        .find(|request| request.url.path() == "/api/items")
        .expect("request forwarded upstream");
    assert_eq!(forwarded.url.query(), Some("draft=true"));
    assert_eq!(forwarded.body, br#"{"name":"widget"}"#.to_vec());
    assert_eq!(
        forwarded.headers.get("x-request-id").unwrap().to_str().unwrap(),
        "abc-123"
    );
    assert!(forwarded.headers.get("upgrade").is_none());
    assert_eq!(
        forwarded.headers.get("host").unwrap().to_str().unwrap(),
        format!("127.0.0.1:{}", harness.upstream.address().port())
    );
    assert_eq!(
        forwarded
            .headers
            .get("x-forwarded-for")
            .unwrap()
            .to_str()
            .unwrap(),
        "10.1.2.3"
    );
}

#[rocket::async_test]
async fn test_upstream_redirects_are_not_followed() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&harness.upstream)
        .await;
    harness.upstream_answers("elsewhere").await;
    let client = harness.tracked_client().await;
    login(&client, "/start").await;

    let response = client.get("/old").dispatch().await;
    assert_eq!(response.status(), Status::Found);
    assert_eq!(location(&response), "/new");
}

#[rocket::async_test]
async fn test_oversized_body_is_rejected() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    harness.upstream_answers("ok").await;
    let mut config = harness.config();
    config.server.body_limit = 16;
    let client = harness.client_with(&config, true).await;
    login(&client, "/start").await;

    let response = client.post("/upload").body(vec![b'x'; 64]).dispatch().await;
    assert_eq!(response.status(), Status::PayloadTooLarge);

    let response = client.post("/upload").body(vec![b'x'; 8]).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let harness = Harness::start().await;
    harness.token_endpoint_answers(200).await;
    let mut config = harness.config();
    config.upstream.port = 9;
    let client = harness.client_with(&config, true).await;

    let state = state_from(&client.get("/").dispatch().await);
    let response = client
        .get(format!("/?code=valid-code&state={}", state))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);

    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::BadGateway);
    assert_eq!(response.into_string().await.unwrap(), "Bad Gateway");
}
