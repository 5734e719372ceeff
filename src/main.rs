// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the Auth0 authenticating proxy
use anyhow::Result;
use clap::Parser;
use log::info;
use rocket::config::LogLevel;

use rust_auth0_proxy::cli::Args;
use rust_auth0_proxy::config::{self, Config};
use rust_auth0_proxy::gateway::build_rocket;

#[rocket::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(args.log_level())
        .init();

    // Check if --show-config-schema flag is set
    if args.show_config_schema {
        return config::output_config_schema();
    }

    // Validate configuration file if --validate-config is set
    if let Some(validate_path) = &args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Without --config everything comes from flags and AP_* variables
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_args(&args);
    config.validate()?;

    let rocket_log_level = if args.quiet {
        LogLevel::Off
    } else {
        LogLevel::Normal
    };

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port))
        .merge(("log_level", rocket_log_level));

    info!(
        "Starting {} on {}:{}",
        config.server.name, config.server.address, config.server.port
    );

    let _rocket = build_rocket(figment, &config).await?.launch().await?;
    Ok(())
}
