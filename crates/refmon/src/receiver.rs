//! UDP status receiver.
//!
//! Owns the bound socket, decodes each datagram, and publishes accepted
//! records to the [`StateCell`] under its debounce. Malformed datagrams are
//! logged and dropped; nothing short of an explicit shutdown ends the loop.
//! After every accepted packet a keepalive ack is sent back to the packet's
//! source, best effort.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::protocol::{AckRecord, DecodeError, StatusRecord};
use crate::state::StateCell;

/// Ack message byte: robot requests manual penalization.
const ANSWER_MANUAL_PENALIZE: u8 = 0;
/// Ack message byte: plain alive sign.
const ANSWER_ALIVE: u8 = 2;

/// Receive buffer, deliberately larger than the record so oversized
/// datagrams surface as a size mismatch instead of being truncated to a
/// decodable prefix.
const RECV_BUFFER_SIZE: usize = 512;

pub struct StateReceiver {
    socket: UdpSocket,
    cell: StateCell,
    team: u8,
    player: u8,
    answer_port: u16,
    man_penalize: bool,
    recv_timeout: Duration,
}

impl StateReceiver {
    /// Bind the listening socket described by the config.
    pub async fn bind(config: &MonitorConfig, cell: StateCell) -> io::Result<Self> {
        let socket = UdpSocket::bind(config.listen_addr).await?;
        tracing::info!(addr = %socket.local_addr()?, "listening for status packets");
        Ok(Self {
            socket,
            cell,
            team: config.team,
            player: config.player,
            answer_port: config.answer_port,
            man_penalize: config.man_penalize,
            recv_timeout: config.recv_timeout(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Whether the ack reply requests manual penalization.
    pub fn set_manual_penalize(&mut self, flag: bool) {
        self.man_penalize = flag;
    }

    /// Receive until the token is cancelled. The bounded receive wait keeps
    /// shutdown latency within one timeout interval.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                received = timeout(self.recv_timeout, self.socket.recv_from(&mut buf)) => {
                    match received {
                        // Timeout: go around and re-check the shutdown token.
                        Err(_) => continue,
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "socket receive failed");
                        }
                        Ok(Ok((len, peer))) => {
                            self.handle_datagram(&buf[..len], peer).await;
                        }
                    }
                }
            }
        }
        tracing::info!("receiver loop exiting");
    }

    async fn handle_datagram(&self, payload: &[u8], peer: SocketAddr) {
        let record = match StatusRecord::decode(payload) {
            Ok(record) => record,
            Err(e @ DecodeError::SizeMismatch { .. }) => {
                tracing::warn!(%peer, error = %e, "dropping malformed datagram");
                return;
            }
            Err(DecodeError::BadMagicOrVersion) => {
                tracing::warn!(
                    %peer,
                    "dropping datagram with wrong magic or version, \
                     sender probably speaks another protocol generation"
                );
                return;
            }
        };

        if self.cell.publish(record) {
            tracing::info!(
                phase = %record.state,
                packet = record.packet_number,
                "game state changed"
            );
        }

        self.answer(peer).await;
    }

    /// Send the keepalive ack to the packet's source. Failures are logged,
    /// never retried.
    async fn answer(&self, peer: SocketAddr) {
        let ack = AckRecord {
            team: self.team,
            player: self.player,
            message: if self.man_penalize {
                ANSWER_MANUAL_PENALIZE
            } else {
                ANSWER_ALIVE
            },
        };

        let destination = SocketAddr::new(peer.ip(), self.answer_port);
        if let Err(e) = self.socket.send_to(&ack.encode(), destination).await {
            tracing::debug!(%destination, error = %e, "ack send failed");
        }
    }
}
