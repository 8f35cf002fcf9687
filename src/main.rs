// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! mailforge command-line entry point.
//!
//! Usage:
//!   mailforge apply manifest.toml                     # Create or update everything in the manifest
//!   mailforge refresh [--kind K] <key>                # Re-read one entry into the state file
//!   mailforge import [--kind K] <id> [--as LABEL]     # Start tracking something that already exists
//!   mailforge destroy [--kind K] <key>                # Delete one entry
//!   mailforge show                                    # Print everything tracked
//!   mailforge ownership-code                          # Print the DNS ownership proof value
//!
//! `--kind` is one of account (the default), domain, recovery-method,
//! routing-rule or app-password.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (partial progress, if any, is still written to the state file)
//!
//! Ctrl-C cancels the running pass between API calls.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, error, info};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use mailforge::api::HttpApiClient;
use mailforge::cli::{describe, App, CliError, Kind, Manifest};
use mailforge::config::Settings;
use mailforge::reconcile::ConvergeContext;
use mailforge::state_store::StateStore;

#[derive(Parser)]
#[command(name = "mailforge", about = "Converge Purelymail accounts and domains onto a declared config", version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, env = "MAILFORGE_CONFIG")]
    config: Option<String>,

    /// Give up on the whole pass after this many seconds
    #[arg(long, env = "MAILFORGE_DEADLINE_SECS")]
    deadline_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update everything declared in a manifest
    Apply { manifest: PathBuf },
    /// Re-read a tracked entry and record what the server reports
    Refresh {
        #[arg(long, value_enum, default_value = "account")]
        kind: Kind,
        /// Handle, domain name or label
        key: String,
    },
    /// Start tracking something that already exists
    Import {
        #[arg(long, value_enum, default_value = "account")]
        kind: Kind,
        /// Handle, domain name, rule id or `handle:target`
        id: String,
        /// State file label for recovery methods and routing rules
        #[arg(long = "as", value_name = "LABEL")]
        label: Option<String>,
    },
    /// Delete a tracked entry
    Destroy {
        #[arg(long, value_enum, default_value = "account")]
        kind: Kind,
        key: String,
    },
    /// Print every tracked entry
    Show,
    /// Print the TXT record value proving domain ownership
    OwnershipCode,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match Settings::new(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log.level.as_str())).init();
    debug!("Loaded settings: {:?}", settings);

    if let Err(e) = settings.validate() {
        error!("{}", e);
        process::exit(1);
    }

    let api = match HttpApiClient::from_settings(&settings) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!("Failed to build API client: {}", e);
            process::exit(1);
        }
    };
    let app = App::new(api.clone(), api, StateStore::new(&settings.state_path));

    let token = CancellationToken::new();
    let mut ctx = ConvergeContext::new().with_cancellation(token.clone());
    if let Some(secs) = cli.deadline_secs {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping once the call in flight returns");
            token.cancel();
        }
    });

    if let Err(e) = run(&app, cli.command, &ctx).await {
        error!("{}", e);
        if let Some(partial) = e.partial() {
            eprintln!("State after failure: {}", describe(partial));
        }
        process::exit(1);
    }
}

async fn run(app: &App, command: Command, ctx: &ConvergeContext) -> Result<(), CliError> {
    match command {
        Command::Apply { manifest } => {
            let manifest = Manifest::from_path(&manifest)?;
            let summary = app.apply(&manifest, ctx).await?;
            println!("created: {}, updated: {}", summary.created.len(), summary.updated.len());
            for warning in &summary.warnings {
                println!("warning: {}", warning);
            }
        }
        Command::Refresh { kind, key } => match app.refresh_entry(kind, &key, ctx).await? {
            Some(line) => println!("{}", line),
            None => println!("{} {} no longer exists; removed from state", kind, key),
        },
        Command::Import { kind, id, label } => {
            println!("{}", app.import_entry(kind, &id, label.as_deref(), ctx).await?);
        }
        Command::Destroy { kind, key } => {
            app.destroy_entry(kind, &key, ctx).await?;
            println!("deleted {} {}", kind, key);
        }
        Command::Show => {
            for line in app.inventory().await? {
                println!("{}", line);
            }
        }
        Command::OwnershipCode => println!("{}", app.ownership_code(ctx).await?),
    }
    Ok(())
}
