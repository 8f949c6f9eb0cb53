//! Cancellable background work units.
//!
//! Each worker runs its body on a dedicated thread. The owner can request
//! cancellation at any time; the body polls the flag between chunks. When
//! the body returns, the worker publishes its final state and sends one
//! [`Completion`] on the channel it was given, so the owner learns which
//! worker finished without blocking on any of them.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, trace, warn};

use crate::error::{FsError, FsResult};

/// Identity of one worker, unique within the process that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Load,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Pending,
            1 => WorkerState::Running,
            2 => WorkerState::Completed,
            3 => WorkerState::Failed,
            _ => WorkerState::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Completed | WorkerState::Failed | WorkerState::Cancelled)
    }
}

/// Message sent by a worker thread as its very last action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub id: WorkerId,
    pub kind: JobKind,
    pub state: WorkerState,
}

/// Bytes processed so far and the expected total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
}

impl Progress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.done.min(self.total) * 100) / self.total) as u8
    }
}

#[derive(Debug, Default)]
struct Shared {
    cancel: AtomicBool,
    state: AtomicU8,
    done: AtomicU64,
    total: AtomicU64,
}

/// Handle given to a work body for polling cancellation and reporting progress.
#[derive(Debug, Clone)]
pub struct WorkerControl {
    shared: Arc<Shared>,
    sleep: Duration,
}

impl WorkerControl {
    /// Control for running a body inline on the calling thread.
    pub fn detached() -> Self {
        Self { shared: Arc::new(Shared::default()), sleep: Duration::ZERO }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::Acquire)
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    pub fn checkpoint(&self) -> FsResult<()> {
        if self.is_cancelled() { Err(FsError::Cancelled) } else { Ok(()) }
    }

    pub fn set_total(&self, total: u64) {
        self.shared.total.store(total, Ordering::Relaxed);
    }

    /// Record cumulative bytes processed.
    pub fn report(&self, done: u64) {
        self.shared.done.store(done, Ordering::Relaxed);
        let total = self.shared.total.load(Ordering::Relaxed);
        if done > total {
            self.shared.total.store(done, Ordering::Relaxed);
        }
    }

    /// Yield between chunks when a sleep interval is configured.
    pub fn pause(&self) {
        if !self.sleep.is_zero() {
            thread::sleep(self.sleep);
        }
    }
}

/// Final result of a worker as seen by its owner.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Failed(FsError),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn from_result(result: FsResult<T>) -> Self {
        match result {
            Ok(value) => Outcome::Completed(value),
            Err(FsError::Cancelled) => Outcome::Cancelled,
            Err(err) => Outcome::Failed(err),
        }
    }

    fn state(result: &FsResult<T>) -> WorkerState {
        match result {
            Ok(_) => WorkerState::Completed,
            Err(FsError::Cancelled) => WorkerState::Cancelled,
            Err(_) => WorkerState::Failed,
        }
    }
}

/// One load or save running on its own thread.
///
/// Dropping a worker requests cancellation and waits for the thread to
/// finish, so the thread never outlives its owner.
pub struct Worker<T> {
    id: WorkerId,
    kind: JobKind,
    path: PathBuf,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<FsResult<T>>>,
}

impl<T> fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Send + 'static> Worker<T> {
    /// Start `body` on a new thread.
    pub fn spawn<F>(
        id: WorkerId,
        kind: JobKind,
        path: PathBuf,
        sleep: Duration,
        completions: Sender<Completion>,
        body: F,
    ) -> FsResult<Self>
    where
        F: FnOnce(&WorkerControl) -> FsResult<T> + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let control = WorkerControl { shared: Arc::clone(&shared), sleep };
        let name = format!("niv-{}-{}", if kind == JobKind::Load { "load" } else { "save" }, id.0);

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                control.shared.state.store(WorkerState::Running as u8, Ordering::Release);
                trace!(worker = %id, "running");

                let result = catch_unwind(AssertUnwindSafe(|| body(&control)))
                    .unwrap_or(Err(FsError::WorkerPanicked));

                let state = Outcome::state(&result);
                control.shared.state.store(state as u8, Ordering::Release);
                debug!(worker = %id, ?state, "finished");
                if completions.send(Completion { id, kind, state }).is_err() {
                    trace!(worker = %id, "completion receiver gone");
                }
                result
            })
            .map_err(FsError::Spawn)?;

        Ok(Self { id, kind, path, shared, handle: Some(handle) })
    }
}

impl<T> Worker<T> {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ask the body to stop at its next chunk boundary.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Set by the worker thread once the body has returned.
    pub fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            done: self.shared.done.load(Ordering::Relaxed),
            total: self.shared.total.load(Ordering::Relaxed),
        }
    }

    /// Block until the thread finishes and take its outcome.
    pub fn wait(mut self) -> Outcome<T> {
        self.join()
    }

    fn join(&mut self) -> Outcome<T> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => Outcome::from_result(result),
                Err(_) => Outcome::Failed(FsError::WorkerPanicked),
            },
            None => Outcome::Cancelled,
        }
    }
}

impl<T> Drop for Worker<T> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
            if let Outcome::Failed(err) = self.join() {
                warn!(worker = %self.id, error = %err, "worker dropped after failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_completion_sent_with_result() {
        let (tx, rx) = unbounded();
        let worker = Worker::spawn(WorkerId(1), JobKind::Load, PathBuf::from("a"), Duration::ZERO, tx, |ctl| {
            ctl.set_total(10);
            ctl.report(10);
            Ok(42)
        })
        .unwrap();

        let done = rx.recv().unwrap();
        assert_eq!(done, Completion { id: WorkerId(1), kind: JobKind::Load, state: WorkerState::Completed });
        assert!(worker.is_completed());
        assert_eq!(worker.progress(), Progress { done: 10, total: 10 });
        assert!(matches!(worker.wait(), Outcome::Completed(42)));
    }

    #[test]
    fn test_cancel_is_observed_at_checkpoint() {
        let (tx, rx) = unbounded();
        let worker: Worker<()> =
            Worker::spawn(WorkerId(2), JobKind::Save, PathBuf::from("b"), Duration::from_millis(1), tx, |ctl| {
                loop {
                    ctl.checkpoint()?;
                    ctl.pause();
                }
            })
            .unwrap();

        worker.cancel();
        let done = rx.recv().unwrap();
        assert_eq!(done.state, WorkerState::Cancelled);
        assert!(matches!(worker.wait(), Outcome::Cancelled));
    }

    #[test]
    fn test_failure_and_panic_become_outcomes() {
        let (tx, rx) = unbounded();
        let failing: Worker<()> = Worker::spawn(WorkerId(3), JobKind::Load, PathBuf::from("c"), Duration::ZERO, tx.clone(), |_| {
            Err(FsError::DiskFull { path: PathBuf::from("c") })
        })
        .unwrap();
        assert_eq!(rx.recv().unwrap().state, WorkerState::Failed);
        assert!(matches!(failing.wait(), Outcome::Failed(FsError::DiskFull { .. })));

        let panicking: Worker<()> =
            Worker::spawn(WorkerId(4), JobKind::Load, PathBuf::from("d"), Duration::ZERO, tx, |_| panic!("boom")).unwrap();
        assert_eq!(rx.recv().unwrap().state, WorkerState::Failed);
        assert!(matches!(panicking.wait(), Outcome::Failed(FsError::WorkerPanicked)));
    }

    #[test]
    fn test_drop_cancels_and_joins() {
        let (tx, rx) = unbounded();
        let worker: Worker<()> = Worker::spawn(WorkerId(5), JobKind::Load, PathBuf::from("e"), Duration::from_millis(1), tx, |ctl| {
            loop {
                ctl.checkpoint()?;
                ctl.pause();
            }
        })
        .unwrap();
        drop(worker);
        assert_eq!(rx.try_recv().unwrap().state, WorkerState::Cancelled);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress { done: 5, total: 20 }.percent(), 25);
        assert_eq!(Progress { done: 0, total: 0 }.percent(), 100);
    }
}
