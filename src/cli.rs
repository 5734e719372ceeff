// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Command line interface
//!
//! Every proxy setting can be given as a flag or as the matching `AP_*`
//! environment variable. Values left unset keep whatever the configuration
//! file (or the built-in defaults) provide, see
//! [`Config::apply_args`](crate::config::Config::apply_args).

use clap::Parser;
use std::path::PathBuf;

/// Authenticating reverse proxy that requires an Auth0 login before forwarding
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Port the proxy listens on (default: 80)
    #[arg(short = 'p', long, env = "AP_PORT")]
    pub port: Option<u16>,

    /// Address the proxy binds to (default: 0.0.0.0)
    #[arg(long, env = "AP_ADDRESS")]
    pub address: Option<String>,

    /// Upstream host receiving authenticated requests
    #[arg(long, env = "AP_PROXY_HOST")]
    pub proxy_host: Option<String>,

    /// Upstream port (default: 80)
    #[arg(long, env = "AP_PROXY_PORT")]
    pub proxy_port: Option<u16>,

    /// Upstream scheme, http or https (default: http)
    #[arg(long, env = "AP_PROXY_SCHEME")]
    pub proxy_scheme: Option<String>,

    /// Auth0 tenant domain
    #[arg(long, env = "AP_AUTH0_DOMAIN")]
    pub auth0_domain: Option<String>,

    /// Auth0 application client id
    #[arg(long, env = "AP_AUTH0_CLIENT_ID")]
    pub auth0_client_id: Option<String>,

    /// Auth0 application client secret
    #[arg(long, env = "AP_AUTH0_CLIENT_SECRET", hide_env_values = true)]
    pub auth0_client_secret: Option<String>,

    /// Callback URL registered in Auth0, must route back to this proxy
    #[arg(long, env = "AP_AUTH0_REDIRECT_URI")]
    pub auth0_redirect_uri: Option<String>,

    /// Secret the session cookie key is derived from
    #[arg(long, env = "AP_SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Session lifetime in seconds (default: 3600)
    #[arg(long, env = "AP_SESSION_TIMEOUT")]
    pub session_timeout: Option<u64>,

    /// Path to configuration file (YAML format)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    pub validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    pub show_config_schema: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Args {
    /// Log level selected by `--verbose` / `--quiet`.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            log::LevelFilter::Off
        } else if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}
