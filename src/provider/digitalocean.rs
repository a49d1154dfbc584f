//! DigitalOcean v2 API client.
//!
//! Thin reqwest wrapper over the three calls the fleet lifecycle needs:
//! batch create, droplet lookup (for the public address), and destroy.
//! Bearer-token auth, JSON bodies, one shared client with a request timeout.

use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AddressError, Descriptor, DestroyError, Provider, ProvisionError};

const API_BASE: &str = "https://api.digitalocean.com/v2";

/// Fixed droplet shape: the smallest slug that runs sshd comfortably.
const DROPLET_SIZE: &str = "s-1vcpu-1gb";
const DROPLET_IMAGE: &str = "ubuntu-22-04-x64";

const HTTP_TIMEOUT_SECS: u64 = 30;

pub struct DigitalOcean {
    http: Client,
    token: String,
}

impl DigitalOcean {
    pub fn new(token: impl Into<String>) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("cloud-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
        })
    }
}

impl Provider for DigitalOcean {
    async fn create_fleet(
        &self,
        names: &[String],
        region: &str,
        fingerprint: &str,
    ) -> Result<Vec<Descriptor>, ProvisionError> {
        let ssh_keys = [fingerprint];
        let request = CreateDropletsRequest {
            names,
            region,
            size: DROPLET_SIZE,
            image: DROPLET_IMAGE,
            ssh_keys: &ssh_keys,
        };

        let response = self
            .http
            .post(format!("{API_BASE}/droplets"))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DropletsEnvelope = response.json().await?;
        debug!(count = envelope.droplets.len(), "droplet batch created");
        Ok(envelope
            .droplets
            .into_iter()
            .map(|droplet| Descriptor {
                id: droplet.id,
                name: droplet.name,
                region: droplet.region.map(|r| r.slug).unwrap_or_default(),
            })
            .collect())
    }

    async fn public_address(&self, id: u64) -> Result<Option<Ipv4Addr>, AddressError> {
        let response = self
            .http
            .get(format!("{API_BASE}/droplets/{id}"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AddressError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DropletEnvelope = response.json().await?;
        let Some(raw) = envelope.droplet.public_v4() else {
            return Ok(None);
        };
        let address = raw
            .parse()
            .map_err(|_| AddressError::BadAddress(raw.to_string()))?;
        Ok(Some(address))
    }

    async fn destroy(&self, id: u64) -> Result<(), DestroyError> {
        let response = self
            .http
            .delete(format!("{API_BASE}/droplets/{id}"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DestroyError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CreateDropletsRequest<'a> {
    names: &'a [String],
    region: &'a str,
    size: &'a str,
    image: &'a str,
    ssh_keys: &'a [&'a str],
}

#[derive(Deserialize)]
struct DropletsEnvelope {
    droplets: Vec<Droplet>,
}

#[derive(Deserialize)]
struct DropletEnvelope {
    droplet: Droplet,
}

#[derive(Deserialize)]
struct Droplet {
    id: u64,
    name: String,
    #[serde(default)]
    region: Option<Region>,
    #[serde(default)]
    networks: Networks,
}

impl Droplet {
    /// First public v4 entry, the address the tunnels dial.
    fn public_v4(&self) -> Option<&str> {
        self.networks
            .v4
            .iter()
            .find(|network| network.kind == "public")
            .map(|network| network.ip_address.as_str())
    }
}

#[derive(Deserialize)]
struct Region {
    slug: String,
}

#[derive(Deserialize, Default)]
struct Networks {
    #[serde(default)]
    v4: Vec<V4Network>,
}

#[derive(Deserialize)]
struct V4Network {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_serializes_the_batch_shape() {
        let names = vec!["cloud-proxy-1".to_string(), "cloud-proxy-2".to_string()];
        let ssh_keys = ["3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa"];
        let request = CreateDropletsRequest {
            names: &names,
            region: "nyc3",
            size: DROPLET_SIZE,
            image: DROPLET_IMAGE,
            ssh_keys: &ssh_keys,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["names"][1], "cloud-proxy-2");
        assert_eq!(value["region"], "nyc3");
        assert_eq!(value["ssh_keys"][0], ssh_keys[0]);
    }

    #[test]
    fn extracts_the_public_v4_address() {
        let body = r#"{
            "droplet": {
                "id": 3164494,
                "name": "cloud-proxy-1",
                "region": {"slug": "nyc3"},
                "networks": {
                    "v4": [
                        {"ip_address": "10.128.192.124", "type": "private"},
                        {"ip_address": "104.236.32.182", "type": "public"}
                    ]
                }
            }
        }"#;
        let envelope: DropletEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.droplet.public_v4(), Some("104.236.32.182"));
    }

    #[test]
    fn a_droplet_without_networks_has_no_address_yet() {
        let body = r#"{"droplet": {"id": 3164494, "name": "cloud-proxy-1"}}"#;
        let envelope: DropletEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.droplet.public_v4().is_none());
    }

    #[test]
    fn private_only_networks_do_not_count_as_ready() {
        let body = r#"{
            "droplet": {
                "id": 3164494,
                "name": "cloud-proxy-1",
                "networks": {"v4": [{"ip_address": "10.128.192.124", "type": "private"}]}
            }
        }"#;
        let envelope: DropletEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.droplet.public_v4().is_none());
    }

    #[test]
    fn batch_create_response_preserves_order() {
        let body = r#"{
            "droplets": [
                {"id": 1, "name": "cloud-proxy-1"},
                {"id": 2, "name": "cloud-proxy-2"}
            ]
        }"#;
        let envelope: DropletsEnvelope = serde_json::from_str(body).unwrap();
        let ids: Vec<u64> = envelope.droplets.iter().map(|d| d.id).collect();
        assert_eq!(ids, [1, 2]);
    }
}
