//! One open document slot and its lifecycle.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use niv_fs::{
    Document, DocumentOptions, Encoding, EolType, FileIdentity, JobKind, LoadedFile, Progress,
    SavedFile, Worker, WorkerId,
};

use crate::error::{IoError, IoResult};

/// Identity of a buffer that survives index changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Where a buffer is in the load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifeState {
    /// Created, nothing assigned yet.
    #[default]
    Empty,
    /// Content assigned; steady state.
    Opened,
    /// A background load is streaming in.
    Reading,
    /// All bytes decoded; waiting to be swapped into the editor.
    ReadAll,
}

/// Caret, scroll and fold state saved across a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub caret: usize,
    pub anchor: usize,
    pub first_line: usize,
    /// Lines whose folds are collapsed.
    pub folds: Vec<usize>,
}

impl ViewState {
    pub fn at(caret: usize) -> Self {
        Self { caret, anchor: caret, ..Default::default() }
    }

    /// Pull every position back inside `document`.
    pub fn clamp_to(&mut self, document: &Document) {
        self.caret = document.clamp(self.caret);
        self.anchor = document.clamp(self.anchor);
        let lines = document.line_count();
        self.first_line = self.first_line.min(lines.saturating_sub(1));
        self.folds.retain(|&line| line < lines);
    }

    /// Move positions across the replacement of `old` by `new_len` bytes.
    pub fn shift_for_replace(&mut self, old: &Range<usize>, new_len: usize) {
        let shift = |pos: usize| {
            if pos >= old.end {
                pos - old.end + old.start + new_len
            } else if pos > old.start {
                old.start
            } else {
                pos
            }
        };
        self.caret = shift(self.caret);
        self.anchor = shift(self.anchor);
    }
}

/// The single background job a buffer may own.
#[derive(Debug)]
pub enum WorkerKind {
    Load {
        worker: Worker<LoadedFile>,
        /// Replacing the content of an already open buffer.
        reload: bool,
        /// Read-only state to apply once the content is swapped in.
        read_only: bool,
        /// Buffer was closed while loading; drop it once the worker stops.
        close_after: bool,
    },
    Save {
        worker: Worker<SavedFile>,
        /// Target of this save; the buffer may be renamed meanwhile.
        path: PathBuf,
        /// Document revision the snapshot was taken at.
        revision: u64,
        /// Read-only state to restore if the save fails.
        read_only: bool,
        /// Buffer was closed while saving; drop it once the save ends.
        close_after: bool,
    },
}

impl WorkerKind {
    pub fn id(&self) -> WorkerId {
        match self {
            WorkerKind::Load { worker, .. } => worker.id(),
            WorkerKind::Save { worker, .. } => worker.id(),
        }
    }

    pub fn job(&self) -> JobKind {
        match self {
            WorkerKind::Load { .. } => JobKind::Load,
            WorkerKind::Save { .. } => JobKind::Save,
        }
    }

    pub fn progress(&self) -> Progress {
        match self {
            WorkerKind::Load { worker, .. } => worker.progress(),
            WorkerKind::Save { worker, .. } => worker.progress(),
        }
    }

    pub fn cancel(&self) {
        match self {
            WorkerKind::Load { worker, .. } => worker.cancel(),
            WorkerKind::Save { worker, .. } => worker.cancel(),
        }
    }
}

/// A finished background load waiting for its buffer to become current.
#[derive(Debug)]
pub(crate) struct PendingLoad {
    pub loaded: LoadedFile,
    pub read_only: bool,
}

/// One open document slot.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    pub(crate) path: Option<PathBuf>,
    pub(crate) life: LifeState,
    pub(crate) dirty: bool,
    pub(crate) read_only: bool,
    /// Last load failed or was cancelled; content must not be persisted.
    pub(crate) save_blocked: bool,
    pub(crate) encoding: Encoding,
    pub(crate) eol: EolType,
    /// Modification stamp from the last load or save.
    pub(crate) identity: Option<FileIdentity>,
    /// Stamp the user was last asked about; never asked twice for one stamp.
    pub(crate) mod_last_asked: Option<SystemTime>,
    pub(crate) document: Document,
    pub(crate) pending: Option<PendingLoad>,
    pub(crate) view: ViewState,
    pub(crate) view_at_load: Option<ViewState>,
    pub(crate) worker: Option<WorkerKind>,
    pub(crate) cancel_requested: bool,
}

impl Buffer {
    pub(crate) fn new(id: BufferId, path: Option<PathBuf>, encoding: Encoding) -> Self {
        Self {
            id,
            path,
            life: LifeState::Empty,
            dirty: false,
            read_only: false,
            save_blocked: false,
            encoding,
            eol: EolType::default(),
            identity: None,
            mod_last_asked: None,
            document: Document::new(DocumentOptions::default()),
            pending: None,
            view: ViewState::default(),
            view_at_load: None,
            worker: None,
            cancel_requested: false,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_untitled(&self) -> bool {
        self.path.is_none()
    }

    /// File name for titles and messages.
    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "(Untitled)".to_string())
    }

    pub fn life(&self) -> LifeState {
        self.life
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_save_blocked(&self) -> bool {
        self.save_blocked
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn eol(&self) -> EolType {
        self.eol
    }

    pub fn modified_time(&self) -> Option<SystemTime> {
        self.identity.as_ref().map(|id| id.mtime)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn set_view(&mut self, mut view: ViewState) {
        view.clamp_to(&self.document);
        self.view = view;
    }

    pub fn job(&self) -> Option<JobKind> {
        self.worker.as_ref().map(WorkerKind::job)
    }

    pub fn worker_id(&self) -> Option<WorkerId> {
        self.worker.as_ref().map(WorkerKind::id)
    }

    pub fn progress(&self) -> Option<Progress> {
        self.worker.as_ref().map(WorkerKind::progress)
    }

    pub fn is_busy(&self) -> bool {
        self.worker.is_some()
    }

    /// Untitled, unmodified and empty: can be reused for the next open.
    pub fn is_pristine(&self) -> bool {
        self.path.is_none() && !self.dirty && self.document.is_empty() && !self.is_busy()
    }

    /// Can be edited by the user right now.
    pub fn is_editable(&self) -> bool {
        !self.read_only && matches!(self.life, LifeState::Empty | LifeState::Opened)
    }

    pub(crate) fn attach_worker(&mut self, kind: WorkerKind) -> IoResult<()> {
        if self.worker.is_some() {
            return Err(self.in_flight_error());
        }
        self.cancel_requested = false;
        self.worker = Some(kind);
        Ok(())
    }

    pub(crate) fn in_flight_error(&self) -> IoError {
        IoError::AlreadyInFlight { path: self.path.clone().unwrap_or_default() }
    }

    pub(crate) fn edit(&mut self, range: Range<usize>, text: &str) -> IoResult<()> {
        if !self.is_editable() {
            return Err(IoError::NotEditable);
        }
        let start = self.document.clamp(range.start);
        let end = self.document.clamp(range.end).max(start);
        self.document.replace(start..end, text);
        self.view.shift_for_replace(&(start..end), text.len());
        self.life = LifeState::Opened;
        self.dirty = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> Buffer {
        Buffer::new(BufferId(1), Some(PathBuf::from("/tmp/a.txt")), Encoding::Utf8)
    }

    #[test]
    fn test_edit_marks_dirty_and_shifts_caret() {
        let mut buf = buffer();
        buf.edit(0..0, "hello world").unwrap();
        buf.set_view(ViewState::at(11));
        buf.edit(0..5, "hi").unwrap();
        assert!(buf.is_dirty());
        assert_eq!(buf.document().text(), "hi world");
        assert_eq!(buf.view().caret, 8);
    }

    #[test]
    fn test_not_editable_while_reading() {
        let mut buf = buffer();
        buf.life = LifeState::Reading;
        assert!(matches!(buf.edit(0..0, "x"), Err(IoError::NotEditable)));
        buf.life = LifeState::Opened;
        buf.read_only = true;
        assert!(matches!(buf.edit(0..0, "x"), Err(IoError::NotEditable)));
    }

    #[test]
    fn test_view_clamped_and_shifted() {
        let doc = Document::from_text("ab\ncd", DocumentOptions::default());
        let mut view = ViewState { caret: 40, anchor: 1, first_line: 9, folds: vec![0, 7] };
        view.clamp_to(&doc);
        assert_eq!(view, ViewState { caret: 5, anchor: 1, first_line: 1, folds: vec![0] });

        let mut view = ViewState::at(10);
        view.shift_for_replace(&(2..6), 1);
        assert_eq!(view.caret, 7);
        let mut inside = ViewState::at(4);
        inside.shift_for_replace(&(2..6), 1);
        assert_eq!(inside.caret, 2);
    }

    #[test]
    fn test_display_name_and_pristine() {
        let untitled = Buffer::new(BufferId(2), None, Encoding::Utf8);
        assert_eq!(untitled.display_name(), "(Untitled)");
        assert!(untitled.is_pristine());
        assert_eq!(buffer().display_name(), "a.txt");
        assert!(!buffer().is_pristine());
    }
}
