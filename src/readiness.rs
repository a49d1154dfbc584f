//! Single-shot readiness polling.
//!
//! One query per machine per run, no retry loop: the fleet-wide warm-up
//! delay is the only concession to boot time. A transport error and an
//! as-yet-unassigned address both resolve to `NotReady`; the distinction is
//! logged but not acted on.

use std::net::Ipv4Addr;

use tracing::warn;

use crate::machine::Machine;
use crate::provider::Provider;

/// Outcome of one readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready(Ipv4Addr),
    NotReady,
}

/// Query the provider once and settle the machine's state accordingly.
pub async fn poll<P: Provider>(provider: &P, machine: &mut Machine) -> Readiness {
    match provider.public_address(machine.id).await {
        Ok(Some(address)) => {
            machine.assign_address(address);
            Readiness::Ready(address)
        }
        Ok(None) => {
            warn!(droplet = %machine.name, "no public address assigned yet");
            machine.mark_not_ready();
            Readiness::NotReady
        }
        Err(err) => {
            warn!(droplet = %machine.name, error = %err, "address query failed");
            machine.mark_not_ready();
            Readiness::NotReady
        }
    }
}
