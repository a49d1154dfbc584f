//! Droplet provider contract.
//!
//! The controller talks to the cloud through this trait; the production
//! implementation lives in [`digitalocean`], and tests plug in an in-memory
//! fake. All three operations map to single API calls with no retries.

pub mod digitalocean;

use std::net::Ipv4Addr;

use thiserror::Error;

/// Creation result for one droplet: the only facts the core needs to track.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub id: u64,
    pub name: String,
    pub region: String,
}

/// Fatal for the run: nothing exists locally yet, so there is nothing to
/// tear down.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("droplet API rejected the create request ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("transport error talking to the droplet API: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Non-fatal: the affected machine degrades to `NotReady` and is skipped for
/// the rest of the run.
#[derive(Error, Debug)]
pub enum AddressError {
    #[error("droplet API rejected the address query ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("transport error querying the droplet address: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("droplet reported an unparseable public address: {0}")]
    BadAddress(String),
}

/// Non-fatal during teardown: logged, and the loop moves on to the next
/// machine. The operator reconciles leaked droplets out of band.
#[derive(Error, Debug)]
pub enum DestroyError {
    #[error("droplet API refused the destroy request ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("transport error destroying the droplet: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The provider operations the fleet lifecycle consumes.
#[allow(async_fn_in_trait)]
pub trait Provider {
    /// Create the whole batch in one call. All-or-nothing from the core's
    /// perspective: partial creation before an API error is not reconciled.
    async fn create_fleet(
        &self,
        names: &[String],
        region: &str,
        fingerprint: &str,
    ) -> Result<Vec<Descriptor>, ProvisionError>;

    /// The droplet's public IPv4 address, or `None` while unassigned.
    async fn public_address(&self, id: u64) -> Result<Option<Ipv4Addr>, AddressError>;

    /// Request provider-side termination of one droplet.
    async fn destroy(&self, id: u64) -> Result<(), DestroyError>;
}
