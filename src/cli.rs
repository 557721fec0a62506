use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::fs;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "webcap-dispatch")]
#[command(about = "Dispatches web page captures across a pool of remote headless browsers")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the dispatch service: connect configured browsers, run the
    /// worker pool, and serve the submission/status HTTP endpoints.
    Serve {
        #[arg(short, long, help = "Configuration file path")]
        config: PathBuf,

        #[arg(long, default_value = "127.0.0.1", help = "Bind address")]
        host: String,

        #[arg(long, default_value = "8080", help = "Bind port")]
        port: u16,
    },

    /// Load and print a configuration file, failing if it is malformed.
    ValidateConfig {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

pub async fn load_config(path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

pub async fn validate_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration: {}", config_path.display());
    let config = load_config(&config_path).await?;

    println!("Configuration is valid:");
    println!("  Output directory: {}", config.output_dir);
    println!(
        "  Timeouts: pageLoad={}ms capture={}ms",
        config.timeouts.page_load, config.timeouts.capture
    );
    println!("  Max retries: {}", config.max_retries);
    println!("  Queue poll interval: {}ms", config.queue_poll_interval_ms);
    println!(
        "  Viewport: {}x{}",
        config.viewport.width, config.viewport.height
    );
    println!("  Reject duplicate URLs: {}", config.reject_duplicate_urls);
    println!("  Configured browsers: {}", config.browsers.len());
    for (i, browser) in config.browsers.iter().enumerate() {
        println!("    {}: {}", i + 1, browser.endpoint);
    }

    Ok(())
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}
