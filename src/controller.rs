//! Fleet orchestration.
//!
//! A single control task drives the run end to end: provision the batch,
//! wait out the warm-up, make one readiness-plus-tunnel pass over the fleet,
//! print the proxy client configs, then park until the caller's cancellation
//! future resolves and tear everything down. Machines are only ever mutated
//! from this task; once a machine's relay task is running, its record is not
//! touched again until teardown.

use std::future::Future;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::emit;
use crate::machine::Machine;
use crate::provider::{Provider, ProvisionError};
use crate::readiness::{self, Readiness};
use crate::tunnel::{TunnelLauncher, TunnelSupervisor};

pub struct FleetController<P: Provider, L: TunnelLauncher> {
    provider: P,
    supervisor: TunnelSupervisor<L>,
    cfg: Config,
    machines: Vec<Machine>,
}

impl<P: Provider, L: TunnelLauncher> FleetController<P, L> {
    pub fn new(cfg: Config, provider: P, launcher: L) -> Self {
        let supervisor = TunnelSupervisor::new(launcher, cfg.start_tcp);
        Self {
            provider,
            supervisor,
            cfg,
            machines: Vec::new(),
        }
    }

    /// The tracked fleet, in provisioner-returned order.
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// One batch create call. On failure nothing exists locally, so the run
    /// aborts with no teardown.
    pub async fn provision(&mut self) -> Result<(), ProvisionError> {
        let names = self.cfg.droplet_names();
        let descriptors = self
            .provider
            .create_fleet(&names, &self.cfg.region, &self.cfg.key_fingerprint)
            .await?;
        self.machines = descriptors.into_iter().map(Machine::from).collect();
        info!(count = self.machines.len(), "droplets deployed");
        Ok(())
    }

    /// One fixed pause for the whole fleet, not per machine.
    pub async fn warm_up(&self) {
        info!(
            secs = self.cfg.warmup.as_secs(),
            "waiting for droplets to boot"
        );
        tokio::time::sleep(self.cfg.warmup).await;
    }

    /// Poll each machine once, in creation order, and attach a tunnel to the
    /// ones that are ready. Machines that are not ready consume no port.
    pub async fn assign(&mut self) {
        for i in 0..self.machines.len() {
            let readiness = readiness::poll(&self.provider, &mut self.machines[i]).await;
            match readiness {
                Readiness::Ready(address) => {
                    self.supervisor.attach(&mut self.machines[i], address);
                }
                Readiness::NotReady => {
                    warn!(droplet = %self.machines[i].name, "droplet not ready yet, skipping");
                }
            }
        }
    }

    /// Print both proxy client configs to stdout.
    pub fn emit(&self) -> Result<()> {
        info!("proxychains config");
        print!("{}", emit::proxychains(&self.machines));
        info!("socksd config");
        println!("{}", emit::socksd(&self.machines).context("rendering socksd config")?);
        Ok(())
    }

    /// Sequentially request destruction of every tracked machine, regardless
    /// of its state. Failures are logged and never stop the loop.
    pub async fn teardown(&mut self) {
        let mut leaked = 0u32;
        for machine in &mut self.machines {
            match self.provider.destroy(machine.id).await {
                Ok(()) => {
                    machine.mark_destroyed();
                    info!(droplet = %machine.name, "deleted droplet");
                }
                Err(err) => {
                    leaked += 1;
                    warn!(droplet = %machine.name, error = %err, "could not delete droplet");
                }
            }
        }
        if leaked > 0 {
            warn!(leaked, "some droplets could not be deleted; remove them in the control panel");
        }
    }

    /// Drive the whole lifecycle. `cancel` is a one-shot cancellation future,
    /// in production `tokio::signal::ctrl_c()`.
    pub async fn run(&mut self, cancel: impl Future<Output = ()>) -> Result<()> {
        self.provision().await.context("creating droplets")?;
        self.warm_up().await;
        self.assign().await;
        self.emit()?;

        info!("press ctrl-c to destroy the fleet");
        cancel.await;

        info!("tearing down the fleet");
        self.teardown().await;
        Ok(())
    }
}
