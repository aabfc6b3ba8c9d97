//! Observable shared state between the receiver and the supervisor.
//!
//! The receiver is the only writer; the supervisor subscribes for change
//! notifications and may also read the current value on its poll tick. The
//! debounce (update iff the phase differs from the stored one) runs inside
//! `watch::Sender::send_if_modified`, so compare and update share one
//! critical section.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::protocol::{GamePhase, StatusRecord};

/// Debounced cell payload: the record that caused the last phase change and
/// the instant the new phase was first observed.
#[derive(Debug, Clone, Copy)]
pub struct ObservedState {
    pub record: StatusRecord,
    pub changed_at: Instant,
}

impl ObservedState {
    pub fn phase(&self) -> GamePhase {
        self.record.state
    }
}

#[derive(Debug, Clone, Copy)]
struct PacketStamp {
    at: Instant,
    wall: DateTime<Utc>,
}

/// Shared state cell. Clones share the same underlying channel and stamp.
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: watch::Sender<Option<ObservedState>>,
    last_packet: std::sync::Arc<Mutex<Option<PacketStamp>>>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            last_packet: std::sync::Arc::new(Mutex::new(None)),
        }
    }

    /// Publish a freshly decoded record. Returns true when the phase changed
    /// and subscribers were notified; repeats of the stored phase only
    /// refresh the staleness stamp.
    pub fn publish(&self, record: StatusRecord) -> bool {
        let now = Instant::now();
        self.stamp_packet(now);

        self.tx.send_if_modified(|current| {
            let changed = current.map(|o| o.record.state) != Some(record.state);
            if changed {
                *current = Some(ObservedState {
                    record,
                    changed_at: now,
                });
            }
            changed
        })
    }

    /// Subscribe for change notifications.
    pub fn subscribe(&self) -> watch::Receiver<Option<ObservedState>> {
        self.tx.subscribe()
    }

    /// Current value, `None` before the first valid packet.
    pub fn current(&self) -> Option<ObservedState> {
        *self.tx.borrow()
    }

    /// Wall-clock time of the last accepted packet.
    pub fn last_packet_at(&self) -> Option<DateTime<Utc>> {
        self.lock_stamp().map(|s| s.wall)
    }

    /// Time elapsed since the last accepted packet.
    pub fn time_since_last_packet(&self) -> Option<Duration> {
        self.lock_stamp().map(|s| s.at.elapsed())
    }

    fn stamp_packet(&self, at: Instant) {
        let stamp = PacketStamp {
            at,
            wall: Utc::now(),
        };
        match self.last_packet.lock() {
            Ok(mut guard) => *guard = Some(stamp),
            Err(poisoned) => *poisoned.into_inner() = Some(stamp),
        }
    }

    fn lock_stamp(&self) -> Option<PacketStamp> {
        match self.last_packet.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
