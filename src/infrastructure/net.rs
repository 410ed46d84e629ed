//! Network reachability checks

use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

/// Try a TCP connection to `host:port`.
///
/// Returns true iff one of the resolved addresses accepts the connection.
/// The socket is closed before returning; no bytes are exchanged.
pub fn probe_tcp(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!(host, port, error = %e, "cannot resolve host");
            return false;
        }
    };

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
                return true;
            }
            Err(e) => debug!(%addr, error = %e, "connection attempt failed"),
        }
    }
    false
}
