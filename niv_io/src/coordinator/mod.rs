//! Orchestration of open, save, revert and reload.
//!
//! The coordinator runs on the interactive thread. Workers report back
//! through a completion channel; nothing here blocks on a worker except
//! the explicit waits used for save-all and exit.

mod completion;
mod external;
mod open;
mod revert;
mod save;


use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use niv_config::IoSettings;
use niv_fs::{Completion, Encoding, FileSinkFactory, JobKind, SinkFactory, WorkerId};
use tracing::{debug, info};

use crate::buffer::{Buffer, LifeState, ViewState, WorkerKind};
use crate::collaborators::{Choice, Dialogs, Extension, NoExtension};
use crate::error::{IoError, IoResult};
use crate::events::IoEvent;
use crate::registry::BufferList;

pub use external::ExternalChange;
pub use save::SaveStatus;

/// Options for [`IoCoordinator::open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Load on the calling thread whatever the size.
    pub force_sync: bool,
    /// Load as one undoable replacement of the current content. Implies sync.
    pub preserve_undo: bool,
    /// Load again even if a buffer already shows the file.
    pub force_reload: bool,
    /// Override the read-only-on-open setting.
    pub read_only: Option<bool>,
    /// Decode as this encoding instead of detecting (a BOM still wins).
    pub encoding: Option<Encoding>,
    /// One-based line to put the caret on. Implies sync.
    pub go_to_line: Option<usize>,
    /// Do not ask before opening an oversized file; reject it.
    pub quiet: bool,
}

type Deferred = Box<dyn FnOnce()>;

/// Drives loads and saves for every open buffer.
pub struct IoCoordinator<D: Dialogs, E: Extension = NoExtension> {
    settings: IoSettings,
    default_encoding: Encoding,
    buffers: BufferList,
    dialogs: D,
    extension: E,
    sinks: Arc<dyn SinkFactory>,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
    next_worker: u64,
    deferred: Vec<Deferred>,
    events: Vec<IoEvent>,
}

impl<D: Dialogs> IoCoordinator<D, NoExtension> {
    pub fn new(settings: IoSettings, dialogs: D) -> IoResult<Self> {
        Self::with_extension(settings, dialogs, NoExtension)
    }
}

impl<D: Dialogs, E: Extension> IoCoordinator<D, E> {
    /// Create a coordinator holding one empty untitled buffer.
    pub fn with_extension(settings: IoSettings, dialogs: D, extension: E) -> IoResult<Self> {
        let default_encoding: Encoding = settings.default_encoding.parse()?;
        let mut buffers = BufferList::new(settings.max_buffers);
        buffers.add(None, default_encoding)?;
        let (completions_tx, completions_rx) = unbounded();
        Ok(Self {
            settings,
            default_encoding,
            buffers,
            dialogs,
            extension,
            sinks: Arc::new(FileSinkFactory),
            completions_tx,
            completions_rx,
            next_worker: 1,
            deferred: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Write files through `sinks` instead of the filesystem directly.
    pub fn with_sinks(mut self, sinks: Arc<dyn SinkFactory>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn settings(&self) -> &IoSettings {
        &self.settings
    }

    /// Apply reloaded settings. Running workers keep the values they started with.
    pub fn set_settings(&mut self, settings: IoSettings) -> IoResult<()> {
        self.default_encoding = settings.default_encoding.parse()?;
        self.buffers.set_max(settings.max_buffers);
        self.settings = settings;
        Ok(())
    }

    pub fn buffers(&self) -> &BufferList {
        &self.buffers
    }

    pub fn buffer(&self, index: usize) -> Option<&Buffer> {
        self.buffers.get(index)
    }

    pub fn current_index(&self) -> usize {
        self.buffers.current_index()
    }

    pub fn current(&self) -> Option<&Buffer> {
        self.buffers.current()
    }

    pub fn dialogs(&self) -> &D {
        &self.dialogs
    }

    pub fn dialogs_mut(&mut self) -> &mut D {
        &mut self.dialogs
    }

    pub fn extension(&self) -> &E {
        &self.extension
    }

    /// Drain events produced since the last call.
    pub fn take_events(&mut self) -> Vec<IoEvent> {
        std::mem::take(&mut self.events)
    }

    /// Switch the active buffer.
    ///
    /// A background load that already finished for this buffer is swapped
    /// in now, and the file is checked for external changes.
    pub fn set_current(&mut self, index: usize) -> IoResult<()> {
        self.buffers.set_current(index)?;
        self.complete_pending_load(index);
        if self.settings.load_on_activate {
            self.check_external_change(index)?;
        }
        Ok(())
    }

    /// Create an untitled buffer and make it current.
    pub fn new_untitled(&mut self) -> IoResult<usize> {
        let index = self.make_room()?;
        self.buffers.set_current(index)?;
        if let Some(buffer) = self.buffers.get_mut(index) {
            buffer.life = LifeState::Opened;
        }
        Ok(index)
    }

    /// Replace `range` of buffer `index` with `text`.
    pub fn edit(&mut self, index: usize, range: Range<usize>, text: &str) -> IoResult<()> {
        self.buffer_mut(index)?.edit(range, text)
    }

    /// Move the caret, selection or scroll position of buffer `index`.
    pub fn set_view(&mut self, index: usize, view: ViewState) -> IoResult<()> {
        self.buffer_mut(index)?.set_view(view);
        Ok(())
    }

    pub fn undo(&mut self, index: usize) -> IoResult<bool> {
        let buffer = self.buffer_mut(index)?;
        if !buffer.is_editable() {
            return Err(IoError::NotEditable);
        }
        let undone = buffer.document.undo();
        if undone {
            buffer.dirty = true;
        }
        Ok(undone)
    }

    /// Close buffer `index`, asking about unsaved changes first.
    ///
    /// Returns `false` if the user cancelled. A buffer still loading or
    /// saving in the background disappears from the list but is kept until
    /// its worker reports back; this call never waits for it.
    pub fn close(&mut self, index: usize) -> IoResult<bool> {
        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        if buffer.is_dirty() && buffer.job() != Some(JobKind::Save) {
            let message = format!("Save changes to '{}'?", buffer.display_name());
            match self.dialogs.confirm(&message) {
                Choice::Yes => {
                    if self.save(index)? == SaveStatus::Declined {
                        return Ok(false);
                    }
                }
                Choice::No => {}
                Choice::Cancel => return Ok(false),
            }
        }

        let buffer = self.buffer_mut(index)?;
        let id = buffer.id();
        let path = buffer.path.clone();
        match &mut buffer.worker {
            Some(WorkerKind::Load { worker, close_after, .. }) => {
                worker.cancel();
                *close_after = true;
                buffer.cancel_requested = true;
            }
            Some(WorkerKind::Save { close_after, .. }) => *close_after = true,
            None => {}
        }

        drop(self.buffers.remove(index));
        if let Some(path) = &path {
            self.extension.on_close(path);
        }
        debug!(buffer = %id, "closed");
        self.events.push(IoEvent::Closed { buffer: id, path });

        if self.buffers.is_empty() {
            self.new_untitled()?;
        }
        Ok(true)
    }

    /// Run `action` once no background save remains.
    ///
    /// Returns `true` if it ran immediately.
    pub fn defer_until_saved(&mut self, action: impl FnOnce() + 'static) -> bool {
        if self.buffers.saving_in_background() {
            self.deferred.push(Box::new(action));
            false
        } else {
            action();
            true
        }
    }

    /// Show the aggregate of running jobs on the progress display.
    pub fn report_progress(&mut self) {
        let summary = self.buffers.in_flight();
        if summary.is_idle() {
            return;
        }
        let verb = if summary.saves > 0 { "Saving" } else { "Loading" };
        let name = summary
            .representative
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let label = match summary.count() {
            1 => format!("{verb} {name}"),
            n => format!("{verb} {name} (+{} more)", n - 1),
        };
        self.dialogs.show_progress(&label, summary.progress.total, summary.progress.done);
    }

    fn buffer_mut(&mut self, index: usize) -> IoResult<&mut Buffer> {
        self.buffers.get_mut(index).ok_or(IoError::NoSuchBuffer(index))
    }

    fn allocate_worker_id(&mut self) -> WorkerId {
        let id = WorkerId(self.next_worker);
        self.next_worker += 1;
        id
    }

    /// Add a visible buffer, closing the oldest clean idle one if full.
    fn make_room(&mut self) -> IoResult<usize> {
        if self.buffers.is_full() {
            let Some(victim) = self.buffers.oldest_evictable() else {
                return Err(IoError::BufferLimit { max: self.buffers.max() });
            };
            info!(index = victim, "closing oldest buffer to make room");
            self.close(victim)?;
        }
        self.buffers.add(None, self.default_encoding)
    }

    fn notify(&mut self, message: &str) {
        self.dialogs.notify(message);
    }

    fn run_deferred_if_idle(&mut self) {
        if self.buffers.saving_in_background() {
            return;
        }
        let deferred = std::mem::take(&mut self.deferred);
        if !deferred.is_empty() {
            debug!(count = deferred.len(), "running deferred actions");
        }
        for action in deferred {
            action();
        }
        self.events.push(IoEvent::AllSavesFinished);
    }
}

impl<D: Dialogs, E: Extension> Drop for IoCoordinator<D, E> {
    fn drop(&mut self) {
        // Never drop a buffer while its storer is still writing.
        self.wait_all_saves();
    }
}
