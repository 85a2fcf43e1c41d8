#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

//! Command-line entry point for the Loadboard chat server.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use server::{commands::spec::generate_spec, server as http_server};
use shared::config::server::Config;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "loadboard")]
#[command(about = "Loadboard chat delivery server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands of `loadboard`.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to bind, overriding the config file and environment
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to a yaml, json, or toml configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Print or write the OpenAPI document
    Spec {
        /// `json`, `yaml`, or an output file path (defaults to YAML on stdout)
        output: Option<String>,
    },
}

async fn handle_serve_command(port: Option<u16>, config: Option<PathBuf>) -> anyhow::Result<()> {
    let resolved = Config::load_config(config, port).context("failed to load configuration")?;
    http_server::run(resolved).await.context("server exited")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => handle_serve_command(port, config).await,
        Commands::Spec { output } => {
            generate_spec(output.as_deref()).context("failed to generate OpenAPI document")
        }
    }
}
