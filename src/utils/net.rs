use std::net::IpAddr;
use std::net::UdpSocket;

use tracing::warn;

/// Public resolver used only as a routing target; no packet is sent.
const PROBE_ADDR: &str = "8.8.8.8:53";

/// Local address of the interface that routes to the outside world.
///
/// "Connecting" a UDP socket only selects a route, so this works offline as
/// long as a default route exists.
pub(crate) fn detect_local_ip() -> Option<IpAddr> {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(PROBE_ADDR)?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) => Some(ip),
        Err(e) => {
            warn!("detect_local_ip failed: {}", e);
            None
        }
    }
}

/// Configured ip if set, else the detected one, else empty.
pub(crate) fn resolve_client_ip(configured: &str) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    detect_local_ip().map(|ip| ip.to_string()).unwrap_or_default()
}
