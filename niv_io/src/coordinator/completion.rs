use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use niv_fs::{Completion, FsError, LoadedFile, Outcome, SavedFile};
use tracing::{debug, info, trace, warn};

use super::IoCoordinator;
use super::open::Apply;
use crate::buffer::{LifeState, PendingLoad, WorkerKind};
use crate::collaborators::{Dialogs, Extension};
use crate::events::IoEvent;

/// Interval at which blocking waits refresh the progress display.
const WAIT_TICK: Duration = Duration::from_millis(100);

/// What a storer was started with, needed once it reports back.
struct FinishedSave {
    target: PathBuf,
    revision: u64,
    read_only: bool,
    close_after: bool,
}

impl<D: Dialogs, E: Extension> IoCoordinator<D, E> {
    /// Handle every worker that finished since the last call, then refresh
    /// the progress display. Returns the number of completions handled.
    pub fn poll_completions(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.handle_completion(completion);
            handled += 1;
        }
        self.report_progress();
        handled
    }

    /// Block up to `timeout` for one completion, then drain the rest.
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        match self.completions_rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.handle_completion(completion);
                self.poll_completions();
                true
            }
            Err(_) => false,
        }
    }

    /// Block until no background save remains.
    pub fn wait_all_saves(&mut self) {
        while self.buffers.saving_in_background() {
            match self.completions_rx.recv_timeout(WAIT_TICK) {
                Ok(completion) => self.handle_completion(completion),
                Err(RecvTimeoutError::Timeout) => self.report_progress(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Swap in a finished background load if the buffer is waiting for one.
    pub(super) fn complete_pending_load(&mut self, index: usize) {
        let Some(buffer) = self.buffers.get_mut(index) else {
            return;
        };
        let Some(PendingLoad { loaded, read_only }) = buffer.pending.take() else {
            return;
        };
        let how = Apply { read_only, background: true, ..Apply::default() };
        self.apply_loaded(index, loaded, how);
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Some(slot) = self.buffers.find_by_worker(completion.id) else {
            // The buffer was closed and its worker joined already.
            trace!(worker = %completion.id, "completion without owner");
            return;
        };
        let Some(kind) = self.buffers.slot_mut(slot).and_then(|b| b.worker.take()) else {
            return;
        };
        debug!(worker = %completion.id, state = ?completion.state, slot, "worker completed");

        match kind {
            WorkerKind::Load { worker, close_after: true, .. } => {
                let cancelled = matches!(worker.wait(), Outcome::Cancelled);
                if self.buffers.purge(slot).is_some() {
                    debug!(slot, cancelled, "closed buffer released after load stopped");
                }
            }
            WorkerKind::Load { worker, reload, read_only, close_after: false } => {
                self.finish_load(slot, worker.wait(), reload, read_only);
            }
            WorkerKind::Save { worker, path, revision, read_only, close_after } => {
                let save = FinishedSave { target: path, revision, read_only, close_after };
                self.finish_save(slot, worker.wait(), save);
            }
        }
    }

    fn finish_load(
        &mut self,
        slot: usize,
        outcome: Outcome<LoadedFile>,
        reload: bool,
        read_only: bool,
    ) {
        let cancel_requested = self.buffers.slot(slot).is_some_and(|b| b.cancel_requested);
        match outcome {
            Outcome::Completed(loaded) if !cancel_requested => {
                let Some(buffer) = self.buffers.slot_mut(slot) else {
                    return;
                };
                debug!(buffer = %buffer.id(), reload, "background load finished");
                buffer.life = LifeState::ReadAll;
                buffer.pending = Some(PendingLoad { loaded, read_only });
                if self.buffers.is_visible(slot) && slot == self.buffers.current_index() {
                    self.complete_pending_load(slot);
                }
            }
            Outcome::Completed(_) | Outcome::Cancelled => self.load_failed(slot, &FsError::Cancelled),
            Outcome::Failed(err) => self.load_failed(slot, &err),
        }
    }

    fn finish_save(&mut self, slot: usize, outcome: Outcome<SavedFile>, save: FinishedSave) {
        let FinishedSave { target, revision, read_only, close_after } = save;
        match outcome {
            Outcome::Completed(saved) => {
                self.save_succeeded(slot, saved, revision);
                if close_after && self.buffers.purge(slot).is_some() {
                    debug!(slot, "closed buffer released after save");
                }
            }
            Outcome::Failed(err) => self.save_failed(slot, &target, &err, read_only),
            Outcome::Cancelled => self.save_failed(slot, &target, &FsError::Cancelled, read_only),
        }
        self.run_deferred_if_idle();
    }

    /// Record a finished save on slot `slot`.
    ///
    /// The buffer is marked clean only when the file written is still the
    /// buffer's file and nothing was edited after the snapshot.
    pub(super) fn save_succeeded(&mut self, slot: usize, saved: SavedFile, revision: u64) {
        let Some(buffer) = self.buffers.slot_mut(slot) else {
            return;
        };
        let id = buffer.id();

        if buffer.path.as_deref() != Some(saved.path.as_path()) {
            let current = buffer.path.clone();
            let now = current
                .as_deref()
                .map_or_else(|| "(Untitled)".to_string(), |p| p.display().to_string());
            warn!(buffer = %id, saved = %saved.path.display(), now = %now, "buffer renamed during save");
            self.notify(&format!(
                "Saved {} but the buffer is now {now}; it is still modified",
                saved.path.display()
            ));
            self.events.push(IoEvent::SavedElsewhere { buffer: id, saved: saved.path, current });
            return;
        }

        if buffer.document.revision() == revision {
            buffer.dirty = false;
        }
        buffer.identity = saved.identity;
        buffer.encoding = saved.encoding;
        buffer.mod_last_asked = None;
        info!(buffer = %id, path = %saved.path.display(), bytes = saved.bytes_written, "saved");

        if saved.unrepresentable > 0 {
            self.notify(&format!(
                "{} characters cannot be written as {} and were replaced in {}",
                saved.unrepresentable,
                saved.encoding,
                saved.path.display()
            ));
        }
        self.extension.on_save(&saved.path);
        self.events.push(IoEvent::Saved {
            buffer: id,
            path: saved.path,
            encoding: saved.encoding,
            bytes: saved.bytes_written,
        });
    }

    /// A failed save leaves the buffer visible and dirty, with the
    /// read-only state it had before the save.
    pub(super) fn save_failed(&mut self, slot: usize, target: &Path, err: &FsError, read_only: bool) {
        let index = if self.buffers.is_visible(slot) { Some(slot) } else { self.buffers.restore(slot) };
        let Some(buffer) = index.and_then(|i| self.buffers.get_mut(i)) else {
            return;
        };
        buffer.dirty = true;
        buffer.read_only = read_only;
        let id = buffer.id();

        warn!(buffer = %id, path = %target.display(), error = %err, "save failed");
        let message = format!("Could not save {}: {err}", target.display());
        self.notify(&message);
        self.events.push(IoEvent::SaveFailed { buffer: id, path: target.to_path_buf(), message });
    }
}
