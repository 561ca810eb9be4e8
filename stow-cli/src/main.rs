//! # stow
//!
//! Interactive demo for the stow library: a todo list kept in a local
//! store, and a pet adoption flow backed by cached queries against the
//! pets API.
//!
//! Commands are read one per line from stdin until `quit` or end of input.
//!
//! ## Example
//!
//! ```bash
//! $ stow --config stow.toml
//! add walk the dog
//! added 1718000000000
//! breeds dog
//! Havanese
//! ...
//! adopt 1
//! adopted Luna
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod repl;

use api::{BreedsFetcher, DetailsFetcher, PetsApi, SearchFetcher};
use config::Config;
use repl::{parse_command, App, Fetchers, Flow};

/// Interactive todo and pet adoption demo.
#[derive(Parser, Debug)]
#[command(name = "stow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "stow.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).context("Failed to load configuration")?;
    init_tracing(&config.log.filter);

    let api = PetsApi::new(&config.api).context("Failed to build HTTP client")?;
    let fetchers = Fetchers {
        breeds: Arc::new(BreedsFetcher(api.clone())),
        search: Arc::new(SearchFetcher(api.clone())),
        details: Arc::new(DetailsFetcher(api)),
    };
    let mut app = App::new(config.cache.cache_config(), fetchers);

    tracing::debug!(base_url = %config.api.base_url, "starting REPL");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let command = match parse_command(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                println!("error: {}", e);
                continue;
            }
        };

        match app.execute(command).await {
            Ok((flow, output)) => {
                for line in output {
                    println!("{}", line);
                }
                if flow == Flow::Quit {
                    break;
                }
            }
            Err(e) => println!("error: {:#}", e),
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the configured filter.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
