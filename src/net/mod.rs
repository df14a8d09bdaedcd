//! Local LAN address discovery.
//!
//! The upload page is reached by typing the server's own address into a
//! browser, so the primary WiFi interface's IPv4 address has to be found by
//! enumerating interfaces rather than by asking a peer.

use std::net::Ipv4Addr;

/// Best-effort IPv4 address of the primary LAN interface.
///
/// Prefers WiFi-style interface names (`en*` on macOS/iOS, `wl*` on Linux),
/// then falls back to any non-loopback interface, then to a UDP route probe.
pub fn primary_ipv4() -> Option<Ipv4Addr> {
    interface_ipv4().or_else(route_probe_ipv4)
}

#[cfg(unix)]
fn interface_ipv4() -> Option<Ipv4Addr> {
    use nix::net::if_::InterfaceFlags;

    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::warn!("Interface enumeration failed: {}", e);
            return None;
        }
    };

    let mut fallback = None;
    for ifaddr in addrs {
        if !ifaddr.flags.contains(InterfaceFlags::IFF_UP)
            || ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK)
        {
            continue;
        }

        let Some(ip) = ifaddr
            .address
            .as_ref()
            .and_then(|a| a.as_sockaddr_in())
            .map(|sin| sin.ip())
        else {
            continue;
        };

        let name = ifaddr.interface_name.as_str();
        if name.starts_with("en") || name.starts_with("wl") {
            return Some(ip);
        }
        if fallback.is_none() {
            fallback = Some(ip);
        }
    }

    fallback
}

#[cfg(not(unix))]
fn interface_ipv4() -> Option<Ipv4Addr> {
    None
}

/// Learn the outbound-facing address by opening a UDP socket towards a
/// public address. No packet is sent; the kernel just picks a route.
fn route_probe_ipv4() -> Option<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()? {
        std::net::SocketAddr::V4(addr) => Some(*addr.ip()),
        std::net::SocketAddr::V6(_) => None,
    }
}
