//! Port allocation for local backends.

use std::net::TcpListener;

use runway_core::domain::LOCAL_HOST;
use thiserror::Error;
use tracing::debug;

/// Number of ports tried above the base port.
const PORT_RANGE: u16 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("No available ports in range {base}-{last}")]
pub struct PortAllocationError {
    pub base: u16,
    pub last: u16,
}

/// Check if a port is free by binding to it and dropping the listener.
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind((LOCAL_HOST, port))
        .and_then(|listener| listener.local_addr())
        .is_ok()
}

/// First free port at or above `base_port`, skipping ports already claimed
/// by other runners.
pub fn allocate_port(base_port: u16, used_ports: &[u16]) -> Result<u16, PortAllocationError> {
    for offset in 0..PORT_RANGE {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        if used_ports.contains(&port) {
            continue;
        }
        if is_port_available(port) {
            debug!(port = %port, "Allocated available port");
            return Ok(port);
        }
        debug!(port = %port, "Port unavailable on system, skipping");
    }

    Err(PortAllocationError {
        base: base_port,
        last: base_port.saturating_add(PORT_RANGE - 1),
    })
}
