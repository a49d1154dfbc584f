pub mod config;
pub mod controller;
pub mod emit;
pub mod machine;
pub mod provider;
pub mod readiness;
pub mod tunnel;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use config::{Config, expand_key_path};
use controller::FleetController;
use provider::digitalocean::DigitalOcean;
use tunnel::SshLauncher;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "cloud-proxy",
    version,
    about = "Deploy a fleet of droplets and run SOCKS proxies through them over SSH"
)]
pub struct Cli {
    /// DigitalOcean API token
    #[arg(long, env = "DIGITALOCEAN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// SSH private key used to reach the droplets
    #[arg(long = "key-location", default_value = "~/.ssh/id_rsa")]
    pub key_location: String,

    /// Fingerprint of an SSH public key registered with DigitalOcean
    #[arg(long = "key")]
    pub key: Option<String>,

    /// Amount of droplets to deploy
    #[arg(long, default_value_t = 5)]
    pub count: u32,

    /// Droplet name prefix
    #[arg(long, default_value = "cloud-proxy")]
    pub name: String,

    /// Region to deploy droplets to
    #[arg(long, default_value = "nyc3")]
    pub region: String,

    /// TCP port to start the first proxy on, incrementing from there
    #[arg(long = "start-tcp", default_value_t = 55555)]
    pub start_tcp: u16,

    /// Bypass the protection that prevents deploying more than 50 droplets
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Seconds to wait after creation before polling droplets for addresses
    #[arg(
        long = "warmup-secs",
        env = "CLOUD_PROXY_WARMUP_SECS",
        default_value_t = 100
    )]
    pub warmup_secs: u64,
}

impl Cli {
    pub fn into_config(self) -> Config {
        Config {
            token: self.token.unwrap_or_default(),
            key_path: expand_key_path(&self.key_location),
            key_fingerprint: self.key.unwrap_or_default(),
            count: self.count,
            name_prefix: self.name,
            region: self.region,
            start_tcp: self.start_tcp,
            force: self.force,
            warmup: Duration::from_secs(self.warmup_secs),
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.into_config();
    cfg.validate()?;

    let provider = DigitalOcean::new(cfg.token.clone()).context("building http client")?;
    let launcher = SshLauncher::new(cfg.key_path.clone());
    let mut controller = FleetController::new(cfg, provider, launcher);

    controller
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_defaults_match_the_documented_surface() {
        let cli = Cli::try_parse_from(["cloud-proxy", "--token", "t", "--key", "fp"]).unwrap();
        assert_eq!(cli.count, 5);
        assert_eq!(cli.name, "cloud-proxy");
        assert_eq!(cli.region, "nyc3");
        assert_eq!(cli.start_tcp, 55555);
        assert!(!cli.force);
    }

    #[test]
    fn flags_flow_through_into_the_config() {
        let cli = Cli::try_parse_from([
            "cloud-proxy",
            "--token",
            "t",
            "--key",
            "fp",
            "--count",
            "3",
            "--start-tcp",
            "60000",
            "--warmup-secs",
            "0",
        ])
        .unwrap();
        let cfg = cli.into_config();
        assert_eq!(cfg.count, 3);
        assert_eq!(cfg.start_tcp, 60000);
        assert_eq!(cfg.warmup, Duration::ZERO);
        assert_eq!(cfg.token, "t");
        assert_eq!(cfg.key_fingerprint, "fp");
        assert!(cfg.validate().is_ok());
    }
}
