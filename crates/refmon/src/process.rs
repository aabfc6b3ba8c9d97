//! Child process lifecycle: spawning, output forwarding, and escalating
//! termination.
//!
//! The supervisor talks to children through the [`ManagedChild`] seam so the
//! escalation protocol (graceful signal → grace window → forced kill →
//! bounded reap) is testable without real processes. [`CommandSpawner`] is
//! the production implementation on top of `tokio::process`.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use uuid::Uuid;

/// Launch request resolved by the supervisor: executable plus the
/// state-derived argument set, tagged with a correlation id for logs.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub launch_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("executable not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] io::Error),
}

/// How a termination attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The child was already gone before any signal was sent.
    AlreadyExited,
    /// Exited within the grace window after the graceful signal.
    Graceful,
    /// Needed the forced kill, then exited within the reap window.
    Forced,
    /// Still not reaped after the final bounded wait. The handle is
    /// released anyway so the supervisor stays live.
    ReapTimeout,
}

/// Seam over a spawned child process.
#[async_trait]
pub trait ManagedChild: Send {
    fn pid(&self) -> Option<u32>;

    /// True if the child is already known to have exited.
    fn has_exited(&mut self) -> bool;

    /// Graceful termination signal (SIGTERM on unix).
    fn signal_graceful(&mut self) -> io::Result<()>;

    /// Forced kill signal (SIGKILL on unix).
    fn signal_kill(&mut self) -> io::Result<()>;

    /// Wait until the child exits and is reaped.
    async fn wait_exit(&mut self) -> io::Result<()>;
}

/// Extension point for how children are created; lets tests substitute fakes
/// for real processes.
pub trait ChildSpawner: Send + Sync {
    fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ManagedChild>, SpawnError>;
}

/// Real child backed by `tokio::process`.
pub struct ChildProcess {
    child: Child,
    pid: Option<u32>,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self { child, pid }
    }
}

#[async_trait]
impl ManagedChild for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    #[cfg(unix)]
    fn signal_graceful(&mut self) -> io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let pid = self
            .pid
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "child has no pid"))?;
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|errno| io::Error::from_raw_os_error(errno as i32))
    }

    #[cfg(not(unix))]
    fn signal_graceful(&mut self) -> io::Result<()> {
        // No graceful signal on this platform; hard kill is the only option.
        self.child.start_kill()
    }

    fn signal_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait_exit(&mut self) -> io::Result<()> {
        let status = self.child.wait().await?;
        tracing::debug!(pid = ?self.pid, code = ?status.code(), "child exited");
        Ok(())
    }
}

/// Spawns the target executable with piped stdio and a best-effort reader
/// task per output stream.
pub struct CommandSpawner;

impl ChildSpawner for CommandSpawner {
    fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ManagedChild>, SpawnError> {
        if !request.path.exists() {
            return Err(SpawnError::NotFound(request.path.clone()));
        }

        let mut child = Command::new(&request.path)
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            spawn_line_forwarder(stdout, request.launch_id, OutputStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_forwarder(stderr, request.launch_id, OutputStream::Stderr);
        }

        Ok(Box::new(ChildProcess::new(child)))
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Drains one child output stream line-by-line into the log. Best effort:
/// exits when the stream closes, not synchronized with termination beyond
/// the process being dead.
fn spawn_line_forwarder<R>(reader: R, launch_id: Uuid, stream: OutputStream)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match stream {
                    OutputStream::Stdout => {
                        tracing::info!(target: "refmon::child", %launch_id, "{}", line)
                    }
                    OutputStream::Stderr => {
                        tracing::warn!(target: "refmon::child", %launch_id, "{}", line)
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(%launch_id, error = %e, "child output stream closed");
                    break;
                }
            }
        }
    });
}

/// Escalating termination: graceful signal, bounded grace wait, forced kill,
/// final bounded reap. Never blocks past `grace + reap`; on reap timeout the
/// caller releases the handle regardless.
pub async fn terminate(
    child: &mut dyn ManagedChild,
    grace: Duration,
    reap: Duration,
) -> TerminationOutcome {
    if child.has_exited() {
        return TerminationOutcome::AlreadyExited;
    }

    if let Err(e) = child.signal_graceful() {
        // Likely lost the race with the child exiting on its own.
        tracing::debug!(pid = ?child.pid(), error = %e, "graceful signal failed");
    }

    if timeout(grace, child.wait_exit()).await.is_ok() {
        return TerminationOutcome::Graceful;
    }

    tracing::warn!(
        pid = ?child.pid(),
        grace_ms = grace.as_millis() as u64,
        "grace window elapsed, sending kill signal"
    );
    if let Err(e) = child.signal_kill() {
        tracing::error!(pid = ?child.pid(), error = %e, "kill signal failed");
    }

    match timeout(reap, child.wait_exit()).await {
        Ok(_) => TerminationOutcome::Forced,
        Err(_) => {
            tracing::error!(pid = ?child.pid(), "reap wait timed out, releasing handle");
            TerminationOutcome::ReapTimeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::watch;

    struct FakeChild {
        honors_graceful: bool,
        honors_kill: bool,
        exit_tx: watch::Sender<bool>,
        // Keep a receiver alive so `exit_tx.send` persists its value; a
        // `watch` send with no live receivers is dropped on the floor.
        _exit_keepalive: watch::Receiver<bool>,
        signals: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FakeChild {
        fn new(honors_graceful: bool, honors_kill: bool) -> Self {
            let (exit_tx, exit_keepalive) = watch::channel(false);
            Self {
                honors_graceful,
                honors_kill,
                exit_tx,
                _exit_keepalive: exit_keepalive,
                signals: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn signals(&self) -> Vec<&'static str> {
            self.signals.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ManagedChild for FakeChild {
        fn pid(&self) -> Option<u32> {
            Some(4242)
        }

        fn has_exited(&mut self) -> bool {
            *self.exit_tx.borrow()
        }

        fn signal_graceful(&mut self) -> io::Result<()> {
            self.signals.lock().unwrap().push("term");
            if self.honors_graceful {
                let _ = self.exit_tx.send(true);
            }
            Ok(())
        }

        fn signal_kill(&mut self) -> io::Result<()> {
            self.signals.lock().unwrap().push("kill");
            if self.honors_kill {
                let _ = self.exit_tx.send(true);
            }
            Ok(())
        }

        async fn wait_exit(&mut self) -> io::Result<()> {
            let mut rx = self.exit_tx.subscribe();
            rx.wait_for(|exited| *exited)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "fake exited"))?;
            Ok(())
        }
    }

    const GRACE: Duration = Duration::from_millis(200);
    const REAP: Duration = Duration::from_millis(200);

    #[tokio::test(start_paused = true)]
    async fn cooperative_child_terminates_gracefully() {
        let mut child = FakeChild::new(true, true);
        let outcome = terminate(&mut child, GRACE, REAP).await;
        assert_eq!(outcome, TerminationOutcome::Graceful);
        assert_eq!(child.signals(), vec!["term"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_child_is_killed_after_grace_window() {
        let mut child = FakeChild::new(false, true);
        let outcome = terminate(&mut child, GRACE, REAP).await;
        assert_eq!(outcome, TerminationOutcome::Forced);
        assert_eq!(child.signals(), vec!["term", "kill"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unreapable_child_times_out_but_returns() {
        let mut child = FakeChild::new(false, false);
        let outcome = terminate(&mut child, GRACE, REAP).await;
        assert_eq!(outcome, TerminationOutcome::ReapTimeout);
        assert_eq!(child.signals(), vec!["term", "kill"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exited_child_gets_no_signals() {
        let mut child = FakeChild::new(true, true);
        let _ = child.exit_tx.send(true);
        let outcome = terminate(&mut child, GRACE, REAP).await;
        assert_eq!(outcome, TerminationOutcome::AlreadyExited);
        assert!(child.signals().is_empty());
    }

    #[test]
    fn missing_executable_is_not_found() {
        let request = LaunchRequest {
            path: PathBuf::from("/definitely/not/here"),
            args: Vec::new(),
            launch_id: Uuid::new_v4(),
        };
        // The existence check rejects before anything is spawned.
        assert!(matches!(
            CommandSpawner.spawn(&request),
            Err(SpawnError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_child_graceful_termination() {
        let mut child = ChildProcess::new(
            Command::new("sleep")
                .arg("30")
                .stdin(Stdio::null())
                .spawn()
                .unwrap(),
        );

        let outcome = terminate(&mut child, Duration::from_secs(1), Duration::from_secs(1)).await;
        assert_eq!(outcome, TerminationOutcome::Graceful);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_child_ignoring_sigterm_is_killed() {
        let mut child = ChildProcess::new(
            Command::new("sh")
                .args(["-c", "trap '' TERM; sleep 30"])
                .stdin(Stdio::null())
                .spawn()
                .unwrap(),
        );
        // Give the shell a moment to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let outcome = terminate(
            &mut child,
            Duration::from_millis(300),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(outcome, TerminationOutcome::Forced);
    }
}
