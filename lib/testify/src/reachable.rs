use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

/// The probe timeout live-cluster tests use to decide whether to run at all
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Whether a TCP connection to the host of `api_host` can be opened within one
/// second. Tests which need a live API server call this first and return
/// early when it is `false`.
pub fn is_reachable(api_host: &str) -> bool {
    is_reachable_within(api_host, PROBE_TIMEOUT)
}

pub fn is_reachable_within(api_host: &str, timeout: Duration) -> bool {
    let Some(addrs) = socket_addrs(api_host) else {
        debug!(message = "cannot resolve api host", api_host);
        return false;
    };

    addrs
        .iter()
        .any(|addr| TcpStream::connect_timeout(addr, timeout).is_ok())
}

fn socket_addrs(api_host: &str) -> Option<Vec<SocketAddr>> {
    let uri = api_host.parse::<http::Uri>().ok()?;
    let host = uri.host()?.trim_start_matches('[').trim_end_matches(']');
    let port = match uri.port_u16() {
        Some(port) => port,
        None if uri.scheme_str() == Some("http") => 80,
        None => 443,
    };

    (host, port)
        .to_socket_addrs()
        .ok()
        .map(|addrs| addrs.collect())
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn listening() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(is_reachable(&format!("http://{addr}")));
    }

    #[test]
    fn refused() {
        let port = crate::pick_unused_local_port();
        assert!(!is_reachable(&format!("http://127.0.0.1:{port}")));
    }

    #[test]
    fn unparsable() {
        assert!(!is_reachable(""));
        assert!(!is_reachable("not a url"));
    }
}
