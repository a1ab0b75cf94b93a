use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::AsyncClient;
use std::path::PathBuf;
use tracing::{error, info, warn};
use webos_sdk::{Config, LgTv};

mod bridge;
mod topics;

use bridge::Bridge;

const REQUEST_CAPACITY: usize = 64;

/// Bridge an LG webOS TV to an MQTT broker
///
/// Messages on the configured power, input and volume topics control the TV;
/// the TV's state is published back to the same topics as retained messages.
#[derive(Parser, Debug)]
#[command(name = "lgtv-bridge")]
#[command(version, about)]
struct Cli {
    /// Path to the config file [default: <config dir>/webos-sdk/config.json]
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(
        long,
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,
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

async fn run(cli: &Cli) -> Result<()> {
    let path = match &cli.config_path {
        Some(path) => path.clone(),
        None => Config::default_path().context("Could not determine config directory")?,
    };
    let config = Config::load(&path)?;

    let options = bridge::broker_options(&config.broker)?;
    let (broker_host, broker_port) = options.broker_address();
    let key = config.tv.key.clone();
    let tv = LgTv::connect(config.host()?, key.clone())?.with_app_names(config.app_names());
    info!("Bridging TV at {} to broker {}:{}", config.tv.host, broker_host, broker_port);

    let bridge = Bridge::new(config, tv);
    let (client, events) = AsyncClient::new(options, REQUEST_CAPACITY);

    let _subscriptions = bridge.follow_tv(&client).await;
    let power = bridge.follow_power(client.clone());

    tokio::select! {
        _ = bridge.relay(events, &client) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Shutting down");
        }
    }

    if let Some(power) = power {
        power.abort();
    }
    if bridge.tv().pairing_key() != key {
        warn!("The TV issued a new pairing key; run `lgtv generate-key --save` to store one");
    }
    bridge.tv().shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = run(&cli).await.context("lgtv-bridge failed") {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from(["lgtv-bridge", "--config-path", "/etc/lgtv.json"]).unwrap();
        assert_eq!(cli.config_path, Some(PathBuf::from("/etc/lgtv.json")));
        assert_eq!(cli.log_level, "info");

        assert!(Cli::try_parse_from(["lgtv-bridge", "--log-level", "verbose"]).is_err());
    }
}
