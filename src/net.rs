//! Host-side IPv4 selection for the drone's ad-hoc network.
//!
//! The drone hands out addresses in 192.168.0.0/24 and expects the
//! controller to speak from one of them. When the host holds several
//! (wifi + a stale lease, a second adapter), the official app picks the
//! numerically smallest, so we do too.

use std::net::Ipv4Addr;

const DRONE_SUBNET: [u8; 3] = [192, 168, 0];

/// Pick the numerically smallest address inside 192.168.0.0/24.
///
/// Returns `None` when no candidate is on the drone subnet, in which case
/// callers fall back to an OS-assigned source address.
pub fn pick_local(addrs: impl IntoIterator<Item = Ipv4Addr>) -> Option<Ipv4Addr> {
    addrs
        .into_iter()
        .filter(|ip| ip.octets()[..3] == DRONE_SUBNET)
        .min()
}

/// Scan the host's interfaces for the best source address on the drone
/// subnet.
pub fn local_ip() -> Option<Ipv4Addr> {
    let ifaces = if_addrs::get_if_addrs().ok()?;
    pick_local(ifaces.iter().filter_map(|iface| match iface.ip() {
        std::net::IpAddr::V4(ip) => Some(ip),
        std::net::IpAddr::V6(_) => None,
    }))
}
