use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, ToSocketAddrs};

use rand::Rng;

pub type Port = u16;

// Try to bind to a socket using TCP
fn test_bind_tcp<A: ToSocketAddrs>(addr: A) -> Option<Port> {
    Some(TcpListener::bind(addr).ok()?.local_addr().ok()?.port())
}

/// Check if a port is free on TCP
pub fn is_free_tcp(ip: IpAddr, port: Port) -> bool {
    test_bind_tcp(SocketAddr::new(ip, port)).is_some()
}

/// Asks the OS for a free port
fn ask_free_tcp_port(ip: IpAddr) -> Option<Port> {
    test_bind_tcp(SocketAddr::new(ip, 0))
}

/// Picks a TCP port that nothing listens on right now. Nothing keeps it
/// reserved, so it is only good for "connection refused" style tests or a
/// listener bound right away.
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
        for _ in 0..10 {
            if let Some(port) = ask_free_tcp_port(ip) {
                return port;
            }
        }
    }
}

pub fn pick_unused_local_port() -> Port {
    pick_unused_port(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
