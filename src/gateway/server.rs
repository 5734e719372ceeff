// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket assembly for the proxy
//!
//! [`build_rocket`] turns a validated [`Config`] into a Rocket instance with
//! the session gate mounted on every path, the pending-login registry under
//! Rocket state management and a background sweeper that drops expired
//! logins until shutdown.
//!
//! Rocket's default [`Shield`] is replaced by one without policies: upstream
//! responses go back to the client with the headers the upstream chose.

use log::{debug, info};
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::shield::Shield;
use rocket::{Build, Rocket};
use std::time::Duration;

use super::gate::AuthGate;
use super::registry::PendingLoginRegistry;
use crate::config::Config;

/// Build a Rocket instance serving the authenticating proxy
///
/// The figment is expected to carry the listener settings (`address`,
/// `port`, `log_level`). The cookie `secret_key` and the `ident` reported in
/// the `Server` header are derived from `config` and merged here.
///
/// ### Errors
///
/// Fails when the Auth0 or upstream endpoints cannot be turned into URLs, or
/// when an HTTP client cannot be created.
///
/// ### Example
///
/// ```no_run
/// use rust_auth0_proxy::config::Config;
/// use rust_auth0_proxy::gateway::server::build_rocket;
///
/// # async fn example(config: Config) -> anyhow::Result<()> {
/// let figment = rocket::Config::figment().merge(("port", config.server.port));
/// let rocket = build_rocket(figment, &config).await?;
/// let _ = rocket.launch().await?;
/// # Ok(())
/// # }
/// ```
pub async fn build_rocket(figment: Figment, config: &Config) -> anyhow::Result<Rocket<Build>> {
    let figment = figment
        .merge(("secret_key", config.session.secret_key_hex()))
        .merge(("ident", config.server.name.clone()));

    let registry = PendingLoginRegistry::from_config(&config.session);
    let gate = AuthGate::new(config, registry.clone())?;
    let sweep_every = Duration::from_secs(config.session.sweep_interval);

    info!(
        "Proxying authenticated traffic to {}",
        config.upstream.base_url()?
    );

    Ok(rocket::custom(figment)
        .mount("/", gate.routes())
        .manage(registry.clone())
        .attach(Shield::new())
        .attach(pending_login_sweeper(registry, sweep_every)))
}

/// Fairing that purges expired pending logins every `every` until Rocket shuts down.
pub fn pending_login_sweeper(registry: PendingLoginRegistry, every: Duration) -> AdHoc {
    AdHoc::on_liftoff("Pending login sweeper", move |rocket| {
        let shutdown = rocket.shutdown();
        Box::pin(async move {
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                // The first tick completes immediately
                ticker.tick().await;
                tokio::pin!(shutdown);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let purged = registry.purge_expired();
                            if purged > 0 {
                                debug!("Purged {} expired pending logins", purged);
                            }
                        }
                        _ = &mut shutdown => {
                            debug!("Pending login sweeper stopped");
                            break;
                        }
                    }
                }
            });
        })
    })
}
