//! Command implementations

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use webos_sdk::{Config, LgTv, SessionConfig, Volume};

use crate::{Cli, Command};

pub async fn run(cli: &Cli) -> Result<()> {
    let path = config_path(cli)?;
    let config = load_config(&path, cli.host.as_deref())?;

    match &cli.command {
        Command::GenerateKey {
            save,
            pairing_timeout,
        } => generate_key(config, &path, *save, Duration::from_secs(*pairing_timeout)).await,
        Command::Wake => wake(&config),
        command => {
            let tv = connect(&config, cli.timeout_duration()).await?;
            let result = execute(&tv, &config, command).await;

            if tv.pairing_key() != config.tv.key {
                warn!("The TV issued a new pairing key; run `lgtv generate-key --save` to store one");
            }
            tv.shutdown().await;
            result
        }
    }
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config_path {
        Some(path) => Ok(path.clone()),
        None => Config::default_path().context("Could not determine config directory"),
    }
}

/// Load the config file, tolerating a missing file when the host was given
/// on the command line
fn load_config(path: &Path, host: Option<&str>) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else if host.is_some() {
        info!("No config file at {}, using defaults", path.display());
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    } else {
        bail!("Config file {} not found; create it or pass --host", path.display());
    };

    if let Some(host) = host {
        config.tv.host = host.to_string();
    }
    Ok(config)
}

async fn connect(config: &Config, timeout: Duration) -> Result<LgTv> {
    let host = config.host()?;
    let tv = LgTv::connect_with_config(host, config.tv.key.clone(), SessionConfig::interactive())?
        .with_app_names(config.app_names());

    tv.wait_until_connected(timeout)
        .await
        .with_context(|| format!("TV at {} is not reachable", host))?;
    Ok(tv)
}

async fn execute(tv: &LgTv, config: &Config, command: &Command) -> Result<()> {
    match command {
        Command::ListApps => {
            for app in tv.list_apps().await? {
                println!("{}\t{}", app.id, app.name);
            }
        }
        Command::App => {
            let app = tv.app().await?;
            if app.name.is_empty() {
                println!("{}", app.id);
            } else {
                println!("{} ({})", app.name, app.id);
            }
        }
        Command::SetApp { app } => {
            let id = config.resolve_app(app);
            tv.set_app(id)
                .await
                .with_context(|| format!("Failed to launch {}", id))?;
            info!("Launched {}", id);
        }
        Command::Volume => {
            let volume = tv.volume().await?;
            println!("{}{}", volume.level, if volume.muted { " (muted)" } else { "" });
        }
        Command::SetVolume { level } => {
            let clamped = Volume::clamp_level(*level);
            if clamped != *level {
                warn!("Volume {} is out of range, using {}", level, clamped);
            }
            tv.set_volume(clamped).await?;
            info!("Volume set to {}", clamped);
        }
        Command::FollowVolume => {
            let subscription = tv
                .subscribe_volume(|event| match event {
                    Ok(volume) => println!("{}{}", volume.level, if volume.muted { " (muted)" } else { "" }),
                    Err(e) => warn!("Volume event failed: {}", e),
                })
                .await;
            wait_for_interrupt().await?;
            subscription.cancel();
        }
        Command::FollowApp => {
            let subscription = tv
                .subscribe_app(|event| match event {
                    Ok(app) if app.name.is_empty() => println!("{}", app.id),
                    Ok(app) => println!("{} ({})", app.name, app.id),
                    Err(e) => warn!("App event failed: {}", e),
                })
                .await;
            wait_for_interrupt().await?;
            subscription.cancel();
        }
        Command::TurnOff => {
            tv.turn_off().await?;
            info!("TV turned off");
        }
        Command::GenerateKey { .. } | Command::Wake => {
            return Err(anyhow!("{:?} does not need a connection", command));
        }
    }
    Ok(())
}

async fn generate_key(mut config: Config, path: &Path, save: bool, timeout: Duration) -> Result<()> {
    let host = config.host()?.to_string();
    println!("Accept the pairing prompt on the TV at {}", host);

    let key = webos_sdk::pair(&host, "", timeout)
        .await
        .context("Pairing failed")?;
    println!("key: {}", key);

    if save {
        config.tv.key = key;
        config
            .save(path)
            .with_context(|| format!("Failed to save key to {}", path.display()))?;
        info!("Saved key to {}", path.display());
    }
    Ok(())
}

fn wake(config: &Config) -> Result<()> {
    let mac = config.mac_address()?;
    webos_sdk::wake(&mac).with_context(|| format!("Failed to wake {}", mac))?;
    info!("Sent Wake-on-LAN packet to {}", mac);
    Ok(())
}

async fn wait_for_interrupt() -> Result<()> {
    info!("Following changes, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")
}
