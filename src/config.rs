//! Run configuration and up-front validation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Deploying more droplets than this needs an explicit `--force`.
pub const MAX_FLEET_SIZE: u32 = 50;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("an API token is required (--token or DIGITALOCEAN_TOKEN)")]
    MissingToken,

    #[error("an SSH key fingerprint is required (--key)")]
    MissingFingerprint,

    #[error("--count must be at least 1")]
    EmptyFleet,

    #[error("refusing to deploy {0} droplets without --force")]
    FleetTooLarge(u32),

    #[error("{count} proxies starting at port {start} would run past the end of the TCP port range")]
    PortRangeExhausted { start: u16, count: u32 },
}

/// Everything a run needs, validated before the first API call.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    /// Private key the ssh tunnels authenticate with.
    pub key_path: PathBuf,
    /// Fingerprint of the matching public key registered with the provider.
    pub key_fingerprint: String,
    pub count: u32,
    pub name_prefix: String,
    pub region: String,
    /// First local SOCKS port; each tunnel attempt takes the next one.
    pub start_tcp: u16,
    pub force: bool,
    /// Fleet-wide pause between creation and the readiness polls.
    pub warmup: Duration,
}

impl Config {
    /// Idempotent dry check: runs before anything is created, so a rejected
    /// run has zero side effects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.key_fingerprint.is_empty() {
            return Err(ConfigError::MissingFingerprint);
        }
        if self.count == 0 {
            return Err(ConfigError::EmptyFleet);
        }
        if self.count > MAX_FLEET_SIZE && !self.force {
            return Err(ConfigError::FleetTooLarge(self.count));
        }
        if u32::from(self.start_tcp) + self.count - 1 > u32::from(u16::MAX) {
            return Err(ConfigError::PortRangeExhausted {
                start: self.start_tcp,
                count: self.count,
            });
        }
        Ok(())
    }

    /// Droplet names in creation order: `<prefix>-1` through `<prefix>-N`.
    pub fn droplet_names(&self) -> Vec<String> {
        (1..=self.count)
            .map(|i| format!("{}-{}", self.name_prefix, i))
            .collect()
    }
}

/// Expand a leading `~` so the flag default works outside a shell.
pub fn expand_key_path(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}
