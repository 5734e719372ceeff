// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the authenticating proxy
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings for the proxy. The configuration is backed by an
//! optional YAML file validated against a JSON schema, and every value can be
//! overridden from the command line or the environment (`AP_*` variables).
//!
//! ## Configuration Structure
//!
//! - `server`: Listener settings for the proxy itself
//! - `upstream`: The single host every authenticated request is forwarded to
//! - `auth0`: Identity provider domain, client credentials and redirect URI
//! - `session`: Session cookie secret and lifetime, pending-login bounds
//!
//! The configuration is read once at startup and never mutated afterwards.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_auth0_proxy::config::Config;
//! use std::path::Path;
//!
//! let config = Config::from_file(Path::new("config.yaml")).unwrap();
//! config.validate().unwrap();
//! println!("Forwarding to {}", config.upstream.base_url().unwrap());
//! ```

pub mod auth0;
pub mod server;
pub mod session;
pub mod upstream;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::cli::Args;

pub use auth0::Auth0Config;
pub use server::ServerConfig;
pub use session::SessionConfig;
pub use upstream::UpstreamConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure for the proxy.
///
/// Each section falls back to its defaults when absent from the file, so a
/// minimal file only needs the values that cannot be defaulted (upstream host
/// and Auth0 client settings), and even those may come from `AP_*` variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listener settings for the proxy.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream service that receives authenticated traffic.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Auth0 tenant and application credentials.
    #[serde(default)]
    pub auth0: Auth0Config,

    /// Session cookie and pending-login settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails schema
    /// validation, deserialization or the additional rules in
    /// [`utils::validate_specific_rules`] produces an error, and a
    /// `*.sample.yaml` file with default values is written next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only arguments that were supplied, either as flags or through their
    /// `AP_*` environment variable, replace the loaded values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            debug!("Overriding listen port from command line: {}", port);
            self.server.port = port;
        }
        if let Some(address) = &args.address {
            debug!("Overriding listen address from command line: {}", address);
            self.server.address = address.clone();
        }

        if let Some(host) = &args.proxy_host {
            debug!("Overriding upstream host from command line: {}", host);
            self.upstream.host = host.clone();
        }
        if let Some(port) = args.proxy_port {
            debug!("Overriding upstream port from command line: {}", port);
            self.upstream.port = port;
        }
        if let Some(scheme) = &args.proxy_scheme {
            debug!("Overriding upstream scheme from command line: {}", scheme);
            self.upstream.scheme = scheme.clone();
        }

        if let Some(domain) = &args.auth0_domain {
            debug!("Overriding Auth0 domain from command line: {}", domain);
            self.auth0.domain = domain.clone();
        }
        if let Some(client_id) = &args.auth0_client_id {
            debug!("Overriding Auth0 client id from command line: {}", client_id);
            self.auth0.client_id = client_id.clone();
        }
        if let Some(client_secret) = &args.auth0_client_secret {
            debug!("Overriding Auth0 client secret from command line");
            self.auth0.client_secret = client_secret.clone();
        }
        if let Some(redirect_uri) = &args.auth0_redirect_uri {
            debug!(
                "Overriding Auth0 redirect URI from command line: {}",
                redirect_uri
            );
            self.auth0.redirect_uri = redirect_uri.clone();
        }

        if let Some(secret) = &args.session_secret {
            debug!("Overriding session secret from command line");
            self.session.secret = secret.clone();
        }
        if let Some(timeout) = args.session_timeout {
            debug!("Overriding session timeout from command line: {}s", timeout);
            self.session.timeout = timeout;
        }
    }

    /// Check that the configuration holds everything needed to serve traffic.
    ///
    /// Unlike [`Config::from_file`], this runs after command line overrides,
    /// so values that only arrive through `AP_*` variables are accounted for.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.host.trim().is_empty() {
            anyhow::bail!("Upstream host is required (--proxy-host / AP_PROXY_HOST)");
        }
        if self.auth0.domain.trim().is_empty() {
            anyhow::bail!("Auth0 domain is required (--auth0-domain / AP_AUTH0_DOMAIN)");
        }
        if self.auth0.client_id.trim().is_empty() {
            anyhow::bail!("Auth0 client id is required (--auth0-client-id / AP_AUTH0_CLIENT_ID)");
        }
        if self.auth0.redirect_uri.trim().is_empty() {
            anyhow::bail!(
                "Auth0 redirect URI is required (--auth0-redirect-uri / AP_AUTH0_REDIRECT_URI)"
            );
        }
        if self.auth0.client_secret.is_empty() {
            warn!("Auth0 client secret is empty, token exchanges will most likely be rejected");
        }
        if self.session.uses_default_secret() {
            warn!("Session secret is the built-in default, set --session-secret for production");
        }

        utils::validate_specific_rules(self)?;

        self.upstream.base_url()?;
        self.auth0.authorize_url()?;
        self.auth0.token_url()?;

        Ok(())
    }
}
