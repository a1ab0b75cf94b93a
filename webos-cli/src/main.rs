use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

mod commands;

/// Control an LG webOS TV from the command line
///
/// Reads the TV's address, MAC address, pairing key and app names from a
/// JSON config file. Run `lgtv generate-key --save` once to pair.
#[derive(Parser, Debug)]
#[command(name = "lgtv")]
#[command(version, about)]
pub struct Cli {
    /// Path to the config file [default: <config dir>/webos-sdk/config.json]
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// TV host, overriding the config file
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Seconds to wait for the TV before giving up
    #[arg(long, global = true, default_value = "5")]
    pub timeout: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Pair with the TV and print the key it issues
    GenerateKey {
        /// Store the key in the config file
        #[arg(long)]
        save: bool,

        /// Seconds to wait for the prompt on the TV to be accepted
        #[arg(long, default_value = "60")]
        pairing_timeout: u64,
    },
    /// List installed apps
    ListApps,
    /// Print the app in the foreground
    App,
    /// Launch an app by configured name or id
    SetApp {
        /// App name from the config file, or an app id
        app: String,
    },
    /// Print the volume
    Volume,
    /// Set the volume, clamped to 0-100
    SetVolume {
        #[arg(allow_negative_numbers = true)]
        level: i32,
    },
    /// Print volume changes until interrupted
    FollowVolume,
    /// Print foreground app changes until interrupted
    FollowApp,
    /// Turn the TV off
    TurnOff,
    /// Turn the TV on with Wake-on-LAN
    Wake,
}

impl Cli {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Initialize tracing/logging with the specified log level
fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = commands::run(&cli).await.context("lgtv failed") {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
