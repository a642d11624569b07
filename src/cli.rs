//! # Relay CLI

use crate::{config::RelayConfig, spawn::try_spawn};
use clap::Parser;
use eyre::WrapErr;
use std::{net::IpAddr, path::PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The relay service sponsors stablecoin payments for smart accounts and
/// settles claimable payment links.
#[derive(Debug, Parser)]
#[command(author, about = "Relay", long_about = None)]
pub struct Args {
    /// The configuration file.
    #[arg(long, value_name = "CONFIG", env = "RELAY_CONFIG", default_value = "relay.json")]
    pub config: PathBuf,
    /// The address to serve on. Overrides the configuration file.
    #[arg(long = "http.addr", value_name = "ADDR")]
    pub address: Option<IpAddr>,
    /// The port to serve on. Overrides the configuration file.
    #[arg(long = "http.port", value_name = "PORT")]
    pub port: Option<u16>,
}

impl Args {
    /// Runs the relay service until the server exits.
    pub async fn run(self) -> eyre::Result<()> {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();

        let raw = std::fs::read_to_string(&self.config)
            .wrap_err_with(|| format!("failed to read config file {}", self.config.display()))?;
        let mut config: RelayConfig = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config file {}", self.config.display()))?;

        if let Some(address) = self.address {
            config = config.with_address(address);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }

        let handle = try_spawn(config).await?;
        handle.server.await??;
        Ok(())
    }
}
