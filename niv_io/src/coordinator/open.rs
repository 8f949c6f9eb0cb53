use std::io;
use std::path::{Path, PathBuf};

use niv_fs::{Document, DocumentOptions, FileLoadConfig, FileLoader, FsError, LoadedFile};
use tracing::{debug, info, warn};

use super::{IoCoordinator, OpenFlags};
use crate::buffer::{LifeState, ViewState, WorkerKind};
use crate::collaborators::{Choice, Dialogs, Extension};
use crate::error::{IoError, IoResult};
use crate::events::IoEvent;

/// How a decoded file is applied to its buffer.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Apply {
    pub read_only: bool,
    pub preserve_undo: bool,
    pub go_to_line: Option<usize>,
    pub background: bool,
}

impl<D: Dialogs, E: Extension> IoCoordinator<D, E> {
    /// Open `path` and make its buffer current.
    ///
    /// Small files are decoded before this returns. Files over the
    /// background threshold start a load worker and the buffer stays
    /// [`LifeState::Reading`] until a later [`IoCoordinator::poll_completions`].
    pub fn open(&mut self, path: impl AsRef<Path>, flags: OpenFlags) -> IoResult<usize> {
        let requested = path.as_ref();
        let path = std::path::absolute(requested).map_err(|e| FsError::open(requested, e))?;

        let existing = self.buffers.find_by_path(&path, false);
        // A buffer whose last load failed is loaded again rather than shown.
        let blocked = existing
            .and_then(|i| self.buffers.get(i))
            .is_some_and(|b| b.is_save_blocked());
        if let Some(index) = existing {
            if self.settings.check_if_already_open && !flags.force_reload && !blocked {
                debug!(path = %path.display(), index, "already open");
                self.set_current(index)?;
                return Ok(index);
            }
        }

        let size = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                let err = io::Error::new(io::ErrorKind::IsADirectory, "is a directory");
                return Err(FsError::open(&path, err).into());
            }
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(FsError::open(&path, e).into()),
        };

        if let Some(size) = size {
            if self.settings.exceeds_max_size(size) {
                self.confirm_oversize(&path, size, flags.quiet)?;
            }
        }

        let (index, reload) = match existing.filter(|_| flags.force_reload || blocked) {
            Some(index) => {
                if let Some(buffer) = self.buffers.get(index).filter(|b| b.is_busy()) {
                    return Err(buffer.in_flight_error());
                }
                (index, true)
            }
            None => (self.target_for_open()?, false),
        };

        self.buffers.set_current(index)?;
        let buffer = self.buffer_mut(index)?;
        buffer.path = Some(path.clone());

        let Some(size) = size else {
            self.open_new_file(index, flags)?;
            return Ok(index);
        };
        self.start_load(index, path, size, flags, reload)?;
        Ok(index)
    }

    /// Stop a background load. The buffer becomes save-blocked once the
    /// worker reports back. Returns `false` if no load was running.
    pub fn cancel_load(&mut self, index: usize) -> IoResult<bool> {
        let buffer = self.buffer_mut(index)?;
        match &buffer.worker {
            Some(WorkerKind::Load { worker, .. }) => {
                worker.cancel();
                buffer.cancel_requested = true;
                debug!(buffer = %buffer.id(), "load cancel requested");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Start loading `path` into buffer `index`, inline or on a worker.
    pub(super) fn start_load(
        &mut self,
        index: usize,
        path: PathBuf,
        size: u64,
        flags: OpenFlags,
        reload: bool,
    ) -> IoResult<()> {
        let options = DocumentOptions {
            large_file: self.settings.is_large(size),
            no_styling: self.settings.skips_styling(size),
        };
        let config = FileLoadConfig {
            chunk_size: self.settings.chunk_size,
            sleep: self.settings.async_sleep(),
            options,
            declared: flags.encoding,
            default_encoding: self.default_encoding,
            ..Default::default()
        };
        let read_only = flags.read_only.unwrap_or(self.settings.read_only_on_open);
        let background = self.settings.opens_in_background(size)
            && !flags.force_sync
            && !flags.preserve_undo
            && flags.go_to_line.is_none();

        let buffer = self.buffer_mut(index)?;
        buffer.view_at_load = reload.then(|| buffer.view.clone());

        if background {
            let id = self.allocate_worker_id();
            let worker = FileLoader::spawn(id, path.clone(), config, self.completions_tx.clone())?;
            let buffer = self.buffer_mut(index)?;
            buffer.attach_worker(WorkerKind::Load { worker, reload, read_only, close_after: false })?;
            buffer.life = LifeState::Reading;
            info!(buffer = %buffer.id(), worker = %id, path = %path.display(), size, "loading in background");
            return Ok(());
        }

        buffer.life = LifeState::Opened;
        debug!(buffer = %buffer.id(), path = %path.display(), size, "loading inline");
        match FileLoader::load_blocking(&path, &config) {
            Ok(loaded) => {
                let how = Apply {
                    read_only,
                    preserve_undo: flags.preserve_undo,
                    go_to_line: flags.go_to_line,
                    background: false,
                };
                self.apply_loaded(index, loaded, how);
                Ok(())
            }
            Err(err) => {
                self.load_failed(index, &err);
                Err(err.into())
            }
        }
    }

    /// Swap a decoded file into buffer slot `slot` and restore its view.
    pub(super) fn apply_loaded(&mut self, slot: usize, loaded: LoadedFile, how: Apply) {
        let warning = loaded.warning();
        let LoadedFile { path, document, encoding, eol, binary, identity, bytes_read, .. } = loaded;
        let Some(buffer) = self.buffers.slot_mut(slot) else {
            return;
        };

        if how.preserve_undo && buffer.document.options() == document.options() {
            let end = buffer.document.len();
            buffer.document.replace(0..end, document.text());
        } else {
            buffer.document = document;
        }
        buffer.encoding = encoding;
        buffer.eol = eol;
        buffer.identity = identity;
        buffer.mod_last_asked = None;
        buffer.dirty = false;
        buffer.save_blocked = false;
        buffer.read_only = how.read_only || binary;
        buffer.life = LifeState::Opened;

        let mut view = buffer.view_at_load.take().unwrap_or_default();
        if let Some(line) = how.go_to_line {
            view = ViewState::at(buffer.document.line_start(line.saturating_sub(1)));
        }
        view.clamp_to(&buffer.document);
        buffer.view = view;

        let id = buffer.id();
        info!(buffer = %id, path = %path.display(), %encoding, bytes = bytes_read, "opened");
        if binary {
            self.notify(&format!("{} looks like binary data; opened read-only", path.display()));
        }
        if let Some(warning) = warning {
            warn!(path = %path.display(), %warning, "decoding problem");
            self.notify(&format!("{}: {warning}", path.display()));
        }
        self.extension.on_open(&path);
        self.events.push(IoEvent::Opened { buffer: id, path, encoding, background: how.background });
    }

    /// Mark slot `slot` unusable for saving after a failed or cancelled load.
    ///
    /// Whatever content the buffer held before the load is kept.
    pub(super) fn load_failed(&mut self, slot: usize, err: &FsError) {
        let Some(buffer) = self.buffers.slot_mut(slot) else {
            return;
        };
        buffer.save_blocked = true;
        buffer.life = LifeState::Opened;
        buffer.view_at_load = None;
        buffer.pending = None;
        buffer.cancel_requested = false;
        let id = buffer.id();
        let path = buffer.path.clone().unwrap_or_default();

        if matches!(err, FsError::Cancelled) {
            info!(buffer = %id, path = %path.display(), "load cancelled");
            self.events.push(IoEvent::LoadCancelled { buffer: id, path });
        } else {
            warn!(buffer = %id, error = %err, "load failed");
            let message = err.to_string();
            self.notify(&message);
            self.events.push(IoEvent::LoadFailed { buffer: id, path, message });
        }
    }

    /// Reuse a pristine current buffer, or add one.
    fn target_for_open(&mut self) -> IoResult<usize> {
        let current = self.buffers.current_index();
        if self.buffers.current().is_some_and(|b| b.is_pristine()) {
            return Ok(current);
        }
        self.make_room()
    }

    /// A path that does not exist yet opens as an empty clean buffer.
    fn open_new_file(&mut self, index: usize, flags: OpenFlags) -> IoResult<()> {
        let encoding = flags.encoding.unwrap_or(self.default_encoding);
        let read_only = flags.read_only.unwrap_or(self.settings.read_only_on_open);
        let buffer = self.buffer_mut(index)?;
        buffer.document = Document::new(DocumentOptions::default());
        buffer.encoding = encoding;
        buffer.identity = None;
        buffer.dirty = false;
        buffer.save_blocked = false;
        buffer.read_only = read_only;
        buffer.life = LifeState::Opened;
        buffer.view = ViewState::default();

        let id = buffer.id();
        let path = buffer.path.clone().unwrap_or_default();
        debug!(buffer = %id, path = %path.display(), "new file");
        self.extension.on_open(&path);
        self.events.push(IoEvent::Opened { buffer: id, path, encoding, background: false });
        Ok(())
    }

    fn confirm_oversize(&mut self, path: &Path, size: u64, quiet: bool) -> IoResult<()> {
        let limit = self.settings.max_file_size.unwrap_or_default();
        let rejected = || IoError::SizeRejected { path: path.to_path_buf(), size, limit };
        if quiet {
            return Err(rejected());
        }
        let message = format!(
            "{} is {size} bytes, over the {limit} byte limit. Open it anyway?",
            path.display()
        );
        match self.dialogs.confirm(&message) {
            Choice::Yes => Ok(()),
            Choice::No | Choice::Cancel => Err(rejected()),
        }
    }
}
