//! Monitor service: wires the receiver and supervisor together.
//!
//! Owns the shared cell, the latency tracker, and the cancellation token.
//! `shutdown()` cancels both loops and joins them; the receiver reacts
//! within one receive timeout, the supervisor terminates any live child on
//! its way out.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::latency::{LatencyTracker, Statistics};
use crate::receiver::StateReceiver;
use crate::state::StateCell;
use crate::supervisor::ProcessSupervisor;

/// Point-in-time view of the running monitor.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Last observed phase, `None` before the first valid packet.
    pub phase: Option<String>,
    /// Wall-clock time of the last accepted packet (RFC 3339).
    pub last_packet_at: Option<String>,
    pub seconds_since_last_packet: Option<f64>,
    pub latency: Statistics,
}

pub struct Monitor {
    cell: StateCell,
    tracker: Arc<LatencyTracker>,
    shutdown: CancellationToken,
    receiver_task: JoinHandle<()>,
    supervisor_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl Monitor {
    /// Bind the socket and spawn both loops.
    pub async fn start(config: MonitorConfig) -> io::Result<Self> {
        let cell = StateCell::new();
        let tracker = Arc::new(LatencyTracker::new(config.latency_capacity));

        let receiver = StateReceiver::bind(&config, cell.clone()).await?;
        let local_addr = receiver.local_addr()?;
        let supervisor = ProcessSupervisor::new(&cell, &config, Arc::clone(&tracker));

        let shutdown = CancellationToken::new();
        let receiver_task = tokio::spawn(receiver.run(shutdown.clone()));
        let supervisor_task = tokio::spawn(supervisor.run(shutdown.clone()));

        Ok(Self {
            cell,
            tracker,
            shutdown,
            receiver_task,
            supervisor_task,
            local_addr,
        })
    }

    /// Address the receiver actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &StateCell {
        &self.cell
    }

    pub fn latency_statistics(&self) -> Statistics {
        self.tracker.statistics()
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.cell.current().map(|o| o.phase().to_string()),
            last_packet_at: self.cell.last_packet_at().map(|t| t.to_rfc3339()),
            seconds_since_last_packet: self
                .cell
                .time_since_last_packet()
                .map(|d| d.as_secs_f64()),
            latency: self.tracker.statistics(),
        }
    }

    /// Cancel both loops and wait for them to finish. The supervisor
    /// terminates its child through the normal escalation on the way out.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let (receiver, supervisor) = tokio::join!(self.receiver_task, self.supervisor_task);
        if let Err(e) = receiver {
            tracing::error!(error = %e, "receiver task panicked");
        }
        if let Err(e) = supervisor {
            tracing::error!(error = %e, "supervisor task panicked");
        }
        tracing::info!("monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GamePhase, StatusRecord};
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    #[tokio::test]
    async fn monitor_end_to_end_status_and_shutdown() {
        let config = MonitorConfig::default()
            .with_listen_addr("127.0.0.1:0".parse().unwrap())
            .with_recv_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_millis(20));
        let monitor = Monitor::start(config).await.unwrap();

        let status = monitor.status();
        assert!(status.phase.is_none());
        assert_eq!(status.latency.count, 0);

        let controller = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let packet = StatusRecord {
            state: GamePhase::Ready,
            ..StatusRecord::default()
        }
        .encode();

        let mut rx = monitor.state().subscribe();
        controller
            .send_to(&packet, monitor.local_addr())
            .await
            .unwrap();
        timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();

        let status = monitor.status();
        assert_eq!(status.phase.as_deref(), Some("READY"));
        assert!(status.last_packet_at.is_some());
        assert!(status.seconds_since_last_packet.unwrap() < 1.0);

        timeout(Duration::from_secs(2), monitor.shutdown())
            .await
            .expect("shutdown did not complete in bounded time");
    }
}
