//! UDP broadcast device

use std::net::SocketAddr;
use std::sync::Arc;

use sensa_core::{SensaError, SensaResult};
use tokio::net::UdpSocket;
use tracing::warn;

use crate::NetDevice;

/// Broadcast link over UDP.
///
/// The socket is bound asynchronously, but `transmit` is a non-blocking
/// `try_send_to` so it can run inside synchronous timer callbacks.
pub struct UdpBroadcastDevice {
    name: String,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    destination: SocketAddr,
    send_errors: u64,
}

impl UdpBroadcastDevice {
    /// Bind to a local address and broadcast to `destination`
    pub async fn bind(local: SocketAddr, destination: SocketAddr) -> SensaResult<Self> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| SensaError::TransportError(e.to_string()))?;

        socket
            .set_broadcast(true)
            .map_err(|e| SensaError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| SensaError::TransportError(e.to_string()))?;

        Ok(UdpBroadcastDevice {
            name: format!("udp:{}", local_addr),
            socket: Arc::new(socket),
            local_addr,
            destination,
            send_errors: 0,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Frames that failed to leave the socket
    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }
}

impl NetDevice for UdpBroadcastDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn transmit(&mut self, frame: &[u8]) {
        if let Err(e) = self.socket.try_send_to(frame, self.destination) {
            self.send_errors += 1;
            warn!(device = %self.name, dest = %self.destination, "UDP send error: {}", e);
        }
    }
}
