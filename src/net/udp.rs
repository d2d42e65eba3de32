//! Connected-UDP wire record transport

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::warn;

use crate::constants::MAX_PACKET_SIZE;
use crate::error::NetworkError;

/// Datagram counters
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStats {
    pub packets: u64,
    pub bytes: u64,
    pub oversized: u64,
}

/// Sends wire records to one receiver.
pub struct WireSender {
    socket: UdpSocket,
    packets: u64,
    bytes: u64,
    oversized: u64,
}

impl WireSender {
    /// Bind an ephemeral local port and connect it to the target.
    pub async fn connect(target: SocketAddr) -> Result<Self, NetworkError> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
        socket
            .connect(target)
            .await
            .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
        Ok(Self {
            socket,
            packets: 0,
            bytes: 0,
            oversized: 0,
        })
    }

    /// Send one wire record as a single datagram.
    ///
    /// Oversized records are dropped and counted rather than fragmented;
    /// the pipeline prefers loss over delay.
    pub async fn send(&mut self, record: &[u8]) -> Result<(), NetworkError> {
        if record.len() > MAX_PACKET_SIZE {
            self.oversized += 1;
            warn!("Dropping oversized wire record: {} bytes", record.len());
            return Ok(());
        }
        self.socket
            .send(record)
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
        self.packets += 1;
        self.bytes += record.len() as u64;
        Ok(())
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            packets: self.packets,
            bytes: self.bytes,
            oversized: self.oversized,
        }
    }
}

/// Receives wire records from any sender.
pub struct WireReceiver {
    socket: UdpSocket,
    recv_buf: Vec<u8>,
    packets: u64,
    bytes: u64,
}

impl WireReceiver {
    pub async fn bind(port: u16) -> Result<Self, NetworkError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
        Ok(Self {
            socket,
            recv_buf: vec![0u8; MAX_PACKET_SIZE],
            packets: 0,
            bytes: 0,
        })
    }

    /// Receive one whole wire record.
    ///
    /// The returned slice borrows the receive buffer and is only valid
    /// until the next call; the deframer copies the payload out.
    pub async fn recv(&mut self) -> Result<&[u8], NetworkError> {
        let (len, _peer) = self
            .socket
            .recv_from(&mut self.recv_buf)
            .await
            .map_err(|e| NetworkError::ReceiveFailed(e.to_string()))?;
        self.packets += 1;
        self.bytes += len as u64;
        Ok(&self.recv_buf[..len])
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.socket
            .local_addr()
            .map_err(|e| NetworkError::BindFailed(e.to_string()))
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            packets: self.packets,
            bytes: self.bytes,
            oversized: 0,
        }
    }
}
