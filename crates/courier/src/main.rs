// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - multi-tenant WhatsApp sessions and deferred message dispatch.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;
mod token;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config::CourierConfig;
use miette::IntoDiagnostic;

/// Courier - multi-tenant WhatsApp sessions and deferred message dispatch.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the scheduler and the HTTP/WebSocket gateway.
    Serve,
    /// Mint an API token for a tenant.
    Token {
        /// Tenant the token authenticates as.
        #[arg(long)]
        tenant: String,
        /// Display name carried in the token.
        #[arg(long)]
        username: Option<String>,
        /// Lifetime in hours; defaults to `auth.token_ttl_hours`.
        #[arg(long)]
        ttl_hours: Option<u64>,
    },
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> CourierConfig {
    let loaded = match path {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await.into_diagnostic(),
        Commands::Token {
            tenant,
            username,
            ttl_hours,
        } => {
            let token = token::mint(&config, &tenant, username.as_deref(), ttl_hours)
                .into_diagnostic()?;
            println!("{token}");
            Ok(())
        }
        Commands::CheckConfig => {
            eprintln!(
                "courier: config ok (listen={}, timezone={})",
                config.server.bind_address(),
                config.scheduler.timezone
            );
            Ok(())
        }
    }
}
