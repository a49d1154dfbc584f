//! Proxy client configuration renderers.
//!
//! Both renderers are pure functions of the final machine list: they walk it
//! in creation order, include exactly the machines currently proxying, and
//! produce byte-identical output for identical state.

use std::fmt::Write as _;

use serde::Serialize;

use crate::machine::Machine;

/// One `socks5` line per proxying machine, ready to paste into a
/// proxychains.conf `[ProxyList]` section.
pub fn proxychains(machines: &[Machine]) -> String {
    let mut out = String::new();
    for machine in machines.iter().filter(|m| m.is_proxying()) {
        if let Some(port) = machine.proxy_port() {
            let _ = writeln!(out, "socks5 127.0.0.1 {port}");
        }
    }
    out
}

#[derive(Serialize)]
struct SocksdConfig {
    upstreams: Vec<SocksdUpstream>,
}

#[derive(Serialize)]
struct SocksdUpstream {
    #[serde(rename = "type")]
    kind: &'static str,
    address: String,
}

/// The socksd daemon's upstream list as pretty-printed JSON.
pub fn socksd(machines: &[Machine]) -> serde_json::Result<String> {
    let upstreams = machines
        .iter()
        .filter(|m| m.is_proxying())
        .filter_map(|m| m.proxy_port())
        .map(|port| SocksdUpstream {
            kind: "socks5",
            address: format!("127.0.0.1:{port}"),
        })
        .collect();
    serde_json::to_string_pretty(&SocksdConfig { upstreams })
}
