//! Process supervisor.
//!
//! Observes the shared state cell and keeps exactly one child process
//! running for the currently mapped game phase. A transition always
//! terminates the old child (escalating, bounded) and waits for the outcome
//! before the new target is launched; spawn failures leave the supervisor
//! idle and ready for the next change.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::latency::LatencyTracker;
use crate::process::{
    self, ChildSpawner, CommandSpawner, LaunchRequest, ManagedChild, TerminationOutcome,
};
use crate::protocol::{GamePhase, StatusRecord};
use crate::state::{ObservedState, StateCell};

struct ActiveChild {
    path: PathBuf,
    phase: GamePhase,
    launch_id: Uuid,
    child: Box<dyn ManagedChild>,
    launched_at: Instant,
}

pub struct ProcessSupervisor {
    updates: watch::Receiver<Option<ObservedState>>,
    scripts: HashMap<u8, PathBuf>,
    team: u8,
    player: u8,
    poll_interval: Duration,
    grace: Duration,
    reap: Duration,
    spawner: Arc<dyn ChildSpawner>,
    tracker: Arc<LatencyTracker>,
    current: Option<ActiveChild>,
}

impl ProcessSupervisor {
    pub fn new(cell: &StateCell, config: &MonitorConfig, tracker: Arc<LatencyTracker>) -> Self {
        Self {
            updates: cell.subscribe(),
            scripts: config.scripts.clone(),
            team: config.team,
            player: config.player,
            poll_interval: config.poll_interval(),
            grace: config.grace_timeout(),
            reap: config.reap_timeout(),
            spawner: Arc::new(CommandSpawner),
            tracker,
            current: None,
        }
    }

    /// Substitute how children are created (tests use fakes).
    pub fn with_spawner(mut self, spawner: Arc<dyn ChildSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Supervise until the token is cancelled. Change notifications wake the
    /// loop immediately; the poll tick bounds staleness when a notification
    /// is missed.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                changed = self.updates.changed() => {
                    if changed.is_err() {
                        // State cell dropped; nothing left to observe.
                        break;
                    }
                }

                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let observed = *self.updates.borrow_and_update();
            self.apply(observed).await;
        }

        self.stop_current("shutdown").await;
        tracing::info!("supervisor loop exiting");
    }

    /// One transition-rule evaluation against the observed state.
    async fn apply(&mut self, observed: Option<ObservedState>) {
        let desired = observed.and_then(|o| {
            self.scripts
                .get(&o.record.state.raw())
                .map(|path| (path.clone(), o))
        });

        match desired {
            Some((path, observed)) => {
                if self.current.as_ref().is_some_and(|c| c.path == path) {
                    return;
                }
                // Old child must be confirmed dead (or released after a
                // timed-out reap) before the new target is considered.
                self.stop_current("state change").await;
                self.launch(path, &observed);
            }
            None => {
                if self.current.is_some() {
                    self.stop_current("no mapped state").await;
                }
            }
        }
    }

    fn launch(&mut self, path: PathBuf, observed: &ObservedState) {
        let launch_id = Uuid::new_v4();
        let request = LaunchRequest {
            path: path.clone(),
            args: state_args(self.team, self.player, &observed.record),
            launch_id,
        };

        match self.spawner.spawn(&request) {
            Ok(child) => {
                let launched_at = Instant::now();
                self.tracker.record(observed.changed_at, launched_at);
                let stats = self.tracker.statistics();
                tracing::info!(
                    %launch_id,
                    phase = %observed.record.state,
                    path = %path.display(),
                    pid = ?child.pid(),
                    latency_ms = stats.latest_ms,
                    "child launched"
                );
                tracing::debug!(
                    target: "refmon::latency",
                    count = stats.count,
                    mean_ms = stats.mean_ms,
                    median_ms = stats.median_ms,
                    min_ms = stats.min_ms,
                    max_ms = stats.max_ms,
                    std_dev_ms = stats.std_dev_ms,
                    "transition latency statistics"
                );
                self.current = Some(ActiveChild {
                    path,
                    phase: observed.record.state,
                    launch_id,
                    child,
                    launched_at,
                });
            }
            Err(e) => {
                tracing::error!(
                    phase = %observed.record.state,
                    path = %path.display(),
                    error = %e,
                    "failed to launch child, staying idle"
                );
            }
        }
    }

    async fn stop_current(&mut self, reason: &str) {
        let Some(mut active) = self.current.take() else {
            return;
        };

        tracing::info!(
            launch_id = %active.launch_id,
            phase = %active.phase,
            pid = ?active.child.pid(),
            reason,
            "terminating child"
        );
        let outcome = process::terminate(active.child.as_mut(), self.grace, self.reap).await;
        match outcome {
            TerminationOutcome::ReapTimeout => {
                tracing::error!(
                    launch_id = %active.launch_id,
                    "child not reaped in time, releasing handle"
                );
            }
            outcome => {
                tracing::debug!(
                    launch_id = %active.launch_id,
                    ?outcome,
                    uptime_ms = active.launched_at.elapsed().as_millis() as u64,
                    "child terminated"
                );
            }
        }
    }
}

/// Positional/flag arguments handed to every child: identity plus the
/// state fields of the record that caused the transition.
fn state_args(team: u8, player: u8, record: &StatusRecord) -> Vec<String> {
    vec![
        "--team".to_string(),
        team.to_string(),
        "--player".to_string(),
        player.to_string(),
        "--state".to_string(),
        record.state.raw().to_string(),
        "--first-half".to_string(),
        record.first_half.to_string(),
        "--kick-off-team".to_string(),
        record.kickoff_team.to_string(),
        "--secondary-state".to_string(),
        record.secondary_state.raw().to_string(),
        "--seconds-remaining".to_string(),
        record.seconds_remaining.to_string(),
        "--secondary-seconds-remaining".to_string(),
        record.secondary_seconds_remaining.to_string(),
    ]
}
