use std::path::{Path, PathBuf};
use std::sync::Arc;

use niv_fs::{Encoding, FileIdentity, FileSaveConfig, FileStorer, FsError, JobKind, SavedFile};
use tracing::{debug, info, warn};

use super::IoCoordinator;
use crate::buffer::WorkerKind;
use crate::collaborators::{Choice, Dialogs, Extension};
use crate::error::{IoError, IoResult};

/// How a save request was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// Written before the call returned.
    Saved,
    /// Running on a storer; the outcome arrives through
    /// [`IoCoordinator::poll_completions`].
    Started,
    /// Nothing written: the file changed on disk and the user chose not to
    /// overwrite it.
    Declined,
}

impl<D: Dialogs, E: Extension> IoCoordinator<D, E> {
    /// Save buffer `index` to its own file in its current encoding.
    pub fn save(&mut self, index: usize) -> IoResult<SaveStatus> {
        self.complete_pending_load(index);
        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        if buffer.is_busy() {
            return Err(buffer.in_flight_error());
        }
        let path = buffer.path.clone().ok_or(IoError::NoPath)?;
        if buffer.is_save_blocked() {
            return Err(IoError::SaveBlocked { path });
        }
        let encoding = buffer.encoding();
        if !self.confirm_overwrite(index, &path)? {
            return Ok(SaveStatus::Declined);
        }
        self.save_to(index, path, encoding)
    }

    /// With `save_check_modified_time`, ask before writing over a file that
    /// changed since it was loaded or last saved.
    fn confirm_overwrite(&mut self, index: usize, path: &Path) -> IoResult<bool> {
        if !self.settings.save_check_modified_time {
            return Ok(true);
        }
        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        let Some(known) = buffer.identity.as_ref() else {
            return Ok(true);
        };
        let Ok(current) = FileIdentity::from_path(path) else {
            return Ok(true);
        };
        if !known.is_modified(&current) {
            return Ok(true);
        }
        let message = format!(
            "{} has been modified outside the editor. Save it anyway?",
            buffer.display_name()
        );
        if self.dialogs.confirm(&message) == Choice::Yes {
            return Ok(true);
        }
        info!(path = %path.display(), "save declined, file changed on disk");
        Ok(false)
    }

    /// Point buffer `index` at `path` (and optionally a new encoding), then save.
    pub fn save_as(
        &mut self,
        index: usize,
        path: impl AsRef<Path>,
        encoding: Option<Encoding>,
    ) -> IoResult<SaveStatus> {
        self.complete_pending_load(index);
        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        if buffer.is_busy() {
            return Err(buffer.in_flight_error());
        }
        if buffer.is_save_blocked() {
            return Err(IoError::SaveBlocked { path: buffer.path.clone().unwrap_or_default() });
        }
        let path = self.set_path(index, path)?;
        let buffer = self.buffer_mut(index)?;
        if let Some(encoding) = encoding {
            buffer.encoding = encoding;
        }
        let encoding = buffer.encoding;
        self.save_to(index, path, encoding)
    }

    /// Rename buffer `index` without writing anything.
    ///
    /// The file identity is dropped, so the next activation treats the new
    /// path as unknown. Returns the absolute path now used.
    pub fn set_path(&mut self, index: usize, path: impl AsRef<Path>) -> IoResult<PathBuf> {
        let requested = path.as_ref();
        let path = std::path::absolute(requested).map_err(|e| FsError::open(requested, e))?;
        if let Some(other) = self.buffers.find_by_path(&path, false) {
            if other != index {
                return Err(IoError::AlreadyOpen { path });
            }
        }
        let buffer = self.buffer_mut(index)?;
        if buffer.path.as_deref() != Some(path.as_path()) {
            debug!(buffer = %buffer.id(), path = %path.display(), "renamed");
            buffer.path = Some(path.clone());
            buffer.identity = None;
            buffer.mod_last_asked = None;
        }
        Ok(path)
    }

    /// Save every modified buffer that has a file name.
    ///
    /// With `ask`, each one is confirmed first; `Cancel` stops and returns
    /// `false`. A buffer that cannot be saved is reported through
    /// [`Dialogs::notify`] and the rest are still saved, but the result is
    /// `false` so an exit does not discard it.
    pub fn save_all(&mut self, ask: bool) -> IoResult<bool> {
        let mut complete = true;
        for index in 0..self.buffers.len() {
            let Some(buffer) = self.buffer(index) else {
                continue;
            };
            if !buffer.is_dirty() || buffer.is_busy() {
                continue;
            }
            if ask {
                let message = format!("Save changes to '{}'?", buffer.display_name());
                match self.dialogs.confirm(&message) {
                    Choice::Yes => {}
                    Choice::No => continue,
                    Choice::Cancel => return Ok(false),
                }
            } else if buffer.is_untitled() || buffer.is_save_blocked() {
                continue;
            }
            match self.save(index) {
                Ok(SaveStatus::Saved | SaveStatus::Started) => {}
                Ok(SaveStatus::Declined) => complete = false,
                Err(err) => {
                    complete = false;
                    self.save_rejected(index, &err);
                }
            }
        }
        Ok(complete)
    }

    /// Tell the user why buffer `index` was not saved. Write failures were
    /// already reported when they happened.
    fn save_rejected(&mut self, index: usize, err: &IoError) {
        if matches!(err, IoError::Fs(_)) {
            return;
        }
        let name = self.buffer(index).map(|b| b.display_name()).unwrap_or_default();
        warn!(index, error = %err, "buffer not saved");
        self.notify(&format!("{name} was not saved: {err}"));
    }

    /// Get ready to quit: settle unsaved changes, stop loads and wait for
    /// every background save. Returns `false` if the user cancelled.
    pub fn prepare_exit(&mut self) -> IoResult<bool> {
        if !self.save_all(true)? {
            return Ok(false);
        }
        for index in 0..self.buffers.len() {
            if self.buffer(index).and_then(|b| b.job()) == Some(JobKind::Load) {
                self.cancel_load(index)?;
            }
        }
        self.wait_all_saves();
        info!("ready to exit");
        Ok(true)
    }

    /// Write a snapshot of buffer `index` to `path`.
    ///
    /// An extension whose `on_before_save` returns `true` has written the
    /// file itself; the buffer is then treated as saved without a write.
    fn save_to(&mut self, index: usize, path: PathBuf, encoding: Encoding) -> IoResult<SaveStatus> {
        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        let revision = buffer.document.revision();
        let read_only = buffer.read_only;

        if self.extension.on_before_save(&path) {
            info!(path = %path.display(), "save handled by extension");
            let identity = FileIdentity::from_path(&path).ok();
            let saved = SavedFile {
                bytes_written: identity.as_ref().map_or(0, |i| i.size),
                path,
                encoding,
                unrepresentable: 0,
                identity,
            };
            self.save_succeeded(index, saved, revision);
            return Ok(SaveStatus::Saved);
        }

        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        let snapshot = buffer.document.snapshot();
        let config = FileSaveConfig {
            encoding,
            chunk_size: self.settings.chunk_size,
            sleep: self.settings.async_sleep(),
            preserve_permissions: self.settings.preserve_permissions,
            atomic_writes: self.settings.atomic_save,
            ..Default::default()
        };

        if self.settings.saves_in_background(snapshot.len() as u64) {
            let id = self.allocate_worker_id();
            let size = snapshot.len();
            let worker = FileStorer::spawn(
                id,
                path.clone(),
                snapshot,
                config,
                Arc::clone(&self.sinks),
                self.completions_tx.clone(),
            )?;
            let buffer = self.buffer_mut(index)?;
            info!(buffer = %buffer.id(), worker = %id, path = %path.display(), size, "saving in background");
            let kind = WorkerKind::Save { worker, path, revision, read_only, close_after: false };
            buffer.attach_worker(kind)?;
            return Ok(SaveStatus::Started);
        }

        match FileStorer::store_blocking(&path, &snapshot, &config, self.sinks.as_ref()) {
            Ok(saved) => {
                self.save_succeeded(index, saved, revision);
                Ok(SaveStatus::Saved)
            }
            Err(err) => {
                self.save_failed(index, &path, &err, read_only);
                Err(err.into())
            }
        }
    }
}
