//! `aidj-watch`: follow render jobs and manage uploaded audio from a terminal.

mod cli;
mod commands;
mod ui;

use aidj_client::upload::UploadConfig;
use aidj_client::ChannelConfig;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "aidj_watch=debug,aidj_client=debug"
    } else {
        "aidj_watch=info,aidj_client=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Follow { job_id } => {
            let mut config = ChannelConfig::from_env().context("Invalid channel configuration")?;
            if let Some(ws_url) = cli.ws_url {
                config.base_url = ws_url;
            }
            commands::follow(&job_id, &config).await
        }
        Command::Upload { path } => commands::upload(&path, &upload_config(cli.api_url)).await,
        Command::Files => commands::files(&upload_config(cli.api_url)).await,
        Command::Delete { filename } => {
            commands::delete(&filename, &upload_config(cli.api_url)).await
        }
    }
}

fn upload_config(api_url: Option<String>) -> UploadConfig {
    let mut config = UploadConfig::from_env();
    if let Some(api_url) = api_url {
        config.api_url = api_url;
    }
    config
}
