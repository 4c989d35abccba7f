use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

use rand::Rng;

pub type Port = u16;

// Try to bind to a socket using TCP, the listener is dropped right away
fn test_bind_tcp(addr: SocketAddr) -> Option<Port> {
    Some(TcpListener::bind(addr).ok()?.local_addr().ok()?.port())
}

/// Check if a port is free on TCP
pub fn is_free_tcp(ip: IpAddr, port: Port) -> bool {
    test_bind_tcp(SocketAddr::new(ip, port)).is_some()
}

/// Picks a TCP port nobody listens on. Connecting to it is expected to be
/// refused, unless some other process grabs it in between.
pub fn pick_unused_port(ip: IpAddr) -> Port {
    let mut rng = rand::rng();

    loop {
        // Try random port first
        for _ in 0..10 {
            let port = rng.random_range(15000..25000);
            if is_free_tcp(ip, port) {
                return port;
            }
        }

        // Ask the OS for a port
        if let Some(port) = test_bind_tcp(SocketAddr::new(ip, 0)) {
            return port;
        }
    }
}

pub fn pick_unused_local_port() -> Port {
    pick_unused_port(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
