//! Console entry point: route resolution, reverse URLs and lock experiments
//! from the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use junction::cache::build_cache;
use junction::config::{load_config, AppConfig};
use junction::http::CliArgs;
use junction::mutex::build_mutex;
use junction::routing::ConsoleRouter;

#[derive(Parser)]
#[command(name = "junction-cli")]
#[command(about = "Console tools for the junction framework core", long_about = None)]
struct Cli {
    /// Config file (defaults to ./junction.toml if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve console-style arguments to a route target and params
    Resolve {
        /// Target followed by key=value and positional parameters
        args: Vec<String>,
    },
    /// Reverse-generate a URL for a target
    Url {
        target: String,
        /// Parameters as key=value pairs
        params: Vec<String>,
    },
    /// Acquire a named lock and hold it (for cross-process experiments)
    Lock {
        name: String,
        /// Seconds to wait for acquisition
        #[arg(long, default_value_t = 0)]
        timeout: u64,
        /// Seconds to hold the lock before releasing
        #[arg(long, default_value_t = 5)]
        hold: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "junction=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None if Path::new("junction.toml").exists() => {
            load_config(Path::new("junction.toml"))?
        }
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Resolve { args } => {
            let router = ConsoleRouter::new(config.router.default_route.clone());
            let resolved = router.resolve(&CliArgs::parse(&args))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "target": resolved.target,
                    "params": resolved.params,
                }))?
            );
        }
        Commands::Url { target, params } => {
            let router = config.router.build()?;
            let mut map = BTreeMap::new();
            for pair in &params {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("parameter {pair:?} is not key=value"))?;
                map.insert(key.to_string(), value.to_string());
            }
            println!("{}", router.make_url(&target, &map)?);
        }
        Commands::Lock { name, timeout, hold } => {
            let cache = build_cache(&config.cache).await?;
            let mutex = build_mutex(&config.mutex, Some(cache))?;

            mutex.lock(&name, Duration::from_secs(timeout)).await?;
            println!("acquired {name:?}, holding for {hold}s");
            tokio::time::sleep(Duration::from_secs(hold)).await;

            mutex.unlock(&name).await?;
            println!("released {name:?}");
        }
    }

    Ok(())
}
