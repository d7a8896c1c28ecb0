//! Equipment host monitoring.
//!
//! Probes remote equipment PCs with a bounded TCP connect and reports
//! ON/OFF status plus connect latency. Probes run sequentially, like the
//! batch loop, so a dead host never delays the others by more than the
//! probe timeout.

use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

/// Default probe port when an endpoint omits one (the Oracle listener).
const DEFAULT_PROBE_PORT: u16 = 1521;

/// Result of probing one endpoint.
#[derive(Debug, Clone)]
pub struct HostStatus {
    /// Endpoint as given (`host` or `host:port`).
    pub endpoint: String,
    pub online: bool,
    /// Connect latency when online.
    pub latency: Option<Duration>,
    /// Failure description when offline.
    pub error: Option<String>,
}

impl HostStatus {
    /// ON/OFF label for display.
    pub fn label(&self) -> &'static str {
        if self.online {
            "ON"
        } else {
            "OFF"
        }
    }
}

/// Splits `host[:port]` into its parts, defaulting the port.
fn split_endpoint(endpoint: &str) -> (String, u16) {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (endpoint.to_string(), DEFAULT_PROBE_PORT),
        },
        None => (endpoint.to_string(), DEFAULT_PROBE_PORT),
    }
}

/// Probes one endpoint with a bounded TCP connect.
pub async fn probe_host(endpoint: &str, timeout: Duration) -> HostStatus {
    let (host, port) = split_endpoint(endpoint);
    let target = format!("{host}:{port}");
    let start = Instant::now();

    let status = match tokio::time::timeout(timeout, TcpStream::connect(&target)).await {
        Ok(Ok(_stream)) => HostStatus {
            endpoint: endpoint.to_string(),
            online: true,
            latency: Some(start.elapsed()),
            error: None,
        },
        Ok(Err(e)) => HostStatus {
            endpoint: endpoint.to_string(),
            online: false,
            latency: None,
            error: Some(e.to_string()),
        },
        Err(_) => HostStatus {
            endpoint: endpoint.to_string(),
            online: false,
            latency: None,
            error: Some(format!("no answer within {} ms", timeout.as_millis())),
        },
    };

    debug!("Probe {}: {}", endpoint, status.label());
    status
}

/// Probes every endpoint in order.
pub async fn probe_all(endpoints: &[String], timeout: Duration) -> Vec<HostStatus> {
    let mut statuses = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        statuses.push(probe_host(endpoint, timeout).await);
    }
    statuses
}
