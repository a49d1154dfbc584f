//! Per-droplet fleet records and their lifecycle.
//!
//! A [`Machine`] tracks one provisioned droplet from creation through proxy
//! setup to teardown. All mutation happens on the control task; once a tunnel
//! is running, its relay task only ever touches the handle it was given at
//! spawn time, never the record itself.

use std::net::Ipv4Addr;

use crate::provider::Descriptor;
use crate::tunnel::TunnelHandle;

/// Lifecycle states of a fleet machine.
///
/// `Destroyed` is terminal and reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Created by the provider, address not yet known.
    Provisioned,
    /// Readiness poll found no usable address; skipped for the rest of the run.
    NotReady,
    /// Public address assigned, eligible for a tunnel.
    Ready,
    /// Local SSH proxy running against this droplet.
    Proxying,
    /// Tunnel spawn failed; the allocated port stays consumed.
    ProxyFailed,
    /// Provider-side destroy confirmed; the record is inert.
    Destroyed,
}

/// One provisioned droplet and its derived proxy state.
#[derive(Debug)]
pub struct Machine {
    /// Provider-assigned droplet id.
    pub id: u64,
    /// Droplet name (`<prefix>-<n>`).
    pub name: String,
    address: Option<Ipv4Addr>,
    proxy_port: Option<u16>,
    tunnel: Option<TunnelHandle>,
    state: MachineState,
}

impl Machine {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: None,
            proxy_port: None,
            tunnel: None,
            state: MachineState::Provisioned,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    /// Local SOCKS port, present once a tunnel attempt has been made.
    pub fn proxy_port(&self) -> Option<u16> {
        self.proxy_port
    }

    pub fn is_proxying(&self) -> bool {
        self.state == MachineState::Proxying
    }

    /// The running tunnel, present exactly while `Proxying`.
    pub fn tunnel(&self) -> Option<&TunnelHandle> {
        self.tunnel.as_ref()
    }

    /// Record the address the readiness poll resolved and mark the machine
    /// eligible for a tunnel. Valid only while still `Provisioned`.
    pub fn assign_address(&mut self, address: Ipv4Addr) {
        debug_assert_eq!(self.state, MachineState::Provisioned);
        self.address = Some(address);
        self.state = MachineState::Ready;
    }

    /// Mark the machine as skipped for the remainder of the run.
    pub fn mark_not_ready(&mut self) {
        debug_assert_eq!(self.state, MachineState::Provisioned);
        self.state = MachineState::NotReady;
    }

    /// Record a successfully spawned tunnel. The handle lives here for
    /// exactly as long as the machine stays `Proxying`.
    pub fn begin_proxying(&mut self, port: u16, tunnel: TunnelHandle) {
        debug_assert_eq!(self.state, MachineState::Ready);
        debug_assert!(self.proxy_port.is_none());
        self.proxy_port = Some(port);
        self.tunnel = Some(tunnel);
        self.state = MachineState::Proxying;
    }

    /// Record a failed tunnel attempt. The port stays consumed so later
    /// machines keep their slots.
    pub fn fail_proxy(&mut self, port: u16) {
        debug_assert_eq!(self.state, MachineState::Ready);
        debug_assert!(self.proxy_port.is_none());
        self.proxy_port = Some(port);
        self.state = MachineState::ProxyFailed;
    }

    /// Mark the droplet destroyed. Dropping the tunnel handle here also kills
    /// the local ssh child.
    pub fn mark_destroyed(&mut self) {
        self.tunnel = None;
        self.state = MachineState::Destroyed;
    }
}

impl From<Descriptor> for Machine {
    fn from(descriptor: Descriptor) -> Self {
        Self::new(descriptor.id, descriptor.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel;

    fn addr() -> Ipv4Addr {
        Ipv4Addr::new(203, 0, 113, 10)
    }

    #[test]
    fn starts_provisioned_with_nothing_derived() {
        let m = Machine::new(7, "test-1");
        assert_eq!(m.state(), MachineState::Provisioned);
        assert!(m.address().is_none());
        assert!(m.proxy_port().is_none());
        assert!(!m.is_proxying());
    }

    #[test]
    fn assigning_an_address_makes_the_machine_ready() {
        let mut m = Machine::new(7, "test-1");
        m.assign_address(addr());
        assert_eq!(m.state(), MachineState::Ready);
        assert_eq!(m.address(), Some(addr()));
    }

    #[test]
    fn not_ready_machines_never_carry_a_port() {
        let mut m = Machine::new(7, "test-1");
        m.mark_not_ready();
        assert_eq!(m.state(), MachineState::NotReady);
        assert!(m.proxy_port().is_none());
    }

    #[test]
    fn failed_tunnel_attempt_still_consumes_the_port() {
        let mut m = Machine::new(7, "test-1");
        m.assign_address(addr());
        m.fail_proxy(60000);
        assert_eq!(m.state(), MachineState::ProxyFailed);
        assert_eq!(m.proxy_port(), Some(60000));
        assert!(!m.is_proxying());
    }

    #[tokio::test]
    async fn proxying_holds_the_tunnel_until_destroyed() {
        let mut m = Machine::new(7, "test-1");
        m.assign_address(addr());
        m.begin_proxying(60000, tunnel::idle_handle());
        assert!(m.is_proxying());
        assert!(m.tunnel().is_some());
        assert_eq!(m.proxy_port(), Some(60000));

        m.mark_destroyed();
        assert_eq!(m.state(), MachineState::Destroyed);
        assert!(m.tunnel().is_none());
    }

    #[test]
    fn destroyed_is_reachable_from_every_setup_state() {
        for prepare in [
            (|_m: &mut Machine| {}) as fn(&mut Machine),
            |m| m.mark_not_ready(),
            |m| m.assign_address(Ipv4Addr::new(203, 0, 113, 10)),
            |m| {
                m.assign_address(Ipv4Addr::new(203, 0, 113, 10));
                m.fail_proxy(60000);
            },
        ] {
            let mut m = Machine::new(7, "test-1");
            prepare(&mut m);
            m.mark_destroyed();
            assert_eq!(m.state(), MachineState::Destroyed);
        }
    }

    #[test]
    fn built_from_a_provider_descriptor() {
        let m = Machine::from(Descriptor {
            id: 42,
            name: "test-3".to_string(),
            region: "nyc3".to_string(),
        });
        assert_eq!(m.id, 42);
        assert_eq!(m.name, "test-3");
        assert_eq!(m.state(), MachineState::Provisioned);
    }
}
