//! Local SSH tunnel management.
//!
//! This module owns everything between a `Ready` machine and a listening
//! SOCKS port: deterministic port allocation, spawning the `ssh -D` child,
//! and the detached stderr relay that keeps the child's diagnostics flowing
//! into the log.
//!
//! Relay tasks are fire-and-forget on purpose: each one lives until its ssh
//! child exits or the whole program does, and is never joined. Output may be
//! truncated at program exit.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{info, warn};

use crate::machine::Machine;

/// Errors from a single tunnel spawn attempt. Never fatal for the run; the
/// affected machine degrades to `ProxyFailed` and the fleet moves on.
#[derive(Error, Debug)]
pub enum TunnelStartError {
    #[error("failed to spawn ssh: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Owning handle of a running tunnel child process.
///
/// The child is spawned with `kill_on_drop`, so dropping the handle (at
/// destroy time or program exit) also terminates the local ssh process.
#[derive(Debug)]
pub struct TunnelHandle {
    child: Child,
    stderr: Option<ChildStderr>,
}

impl TunnelHandle {
    pub fn new(mut child: Child) -> Self {
        let stderr = child.stderr.take();
        Self { child, stderr }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }
}

/// Hands out strictly increasing local ports, one per tunnel attempt.
#[derive(Debug)]
pub struct PortAllocator {
    next: u16,
}

impl PortAllocator {
    pub fn new(base: u16) -> Self {
        Self { next: base }
    }

    /// Consume and return the next port. The configured range is validated
    /// up front, so the counter never runs off the end of u16 in practice.
    pub fn allocate(&mut self) -> u16 {
        let port = self.next;
        self.next = self.next.saturating_add(1);
        port
    }
}

/// Seam between the supervisor and the actual `ssh` binary, so tests can
/// substitute a harmless child process.
pub trait TunnelLauncher {
    fn launch(&self, address: Ipv4Addr, port: u16) -> Result<TunnelHandle, TunnelStartError>;
}

/// Spawns `ssh -N -D <port>` against a droplet, authenticated with the
/// operator's private key.
pub struct SshLauncher {
    key_path: PathBuf,
}

impl SshLauncher {
    pub fn new(key_path: PathBuf) -> Self {
        Self { key_path }
    }
}

impl TunnelLauncher for SshLauncher {
    fn launch(&self, address: Ipv4Addr, port: u16) -> Result<TunnelHandle, TunnelStartError> {
        let child = Command::new("ssh")
            .arg("-N")
            .arg("-D")
            .arg(port.to_string())
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg("UserKnownHostsFile=/dev/null")
            .arg("-i")
            .arg(&self.key_path)
            .arg(format!("root@{address}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(TunnelHandle::new(child))
    }
}

/// Attaches tunnels to ready machines, in fleet order.
pub struct TunnelSupervisor<L: TunnelLauncher> {
    launcher: L,
    ports: PortAllocator,
}

impl<L: TunnelLauncher> TunnelSupervisor<L> {
    pub fn new(launcher: L, base_port: u16) -> Self {
        Self {
            launcher,
            ports: PortAllocator::new(base_port),
        }
    }

    /// Allocate the next port and attempt a tunnel for a `Ready` machine.
    ///
    /// The port is consumed before the spawn, so a failed attempt still
    /// advances the counter. A spawn failure degrades this machine only.
    pub fn attach(&mut self, machine: &mut Machine, address: Ipv4Addr) {
        let port = self.ports.allocate();
        match self.launcher.launch(address, port) {
            Ok(mut handle) => {
                if let Some(stderr) = handle.take_stderr() {
                    spawn_stderr_relay(machine.name.clone(), stderr);
                }
                info!(
                    droplet = %machine.name,
                    address = %address,
                    port,
                    pid = handle.pid(),
                    "ssh proxy started"
                );
                machine.begin_proxying(port, handle);
            }
            Err(err) => {
                warn!(droplet = %machine.name, error = %err, "could not start ssh proxy");
                machine.fail_proxy(port);
            }
        }
    }
}

/// Drain an ssh child's stderr into the log, line by line, until the child
/// exits. Detached: the task is never joined and never cancelled.
fn spawn_stderr_relay(name: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(droplet = %name, "ssh: {line}");
        }
    });
}

#[cfg(test)]
pub(crate) fn idle_handle() -> TunnelHandle {
    let child = Command::new("sleep")
        .arg("30")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("spawn sleep");
    TunnelHandle::new(child)
}
