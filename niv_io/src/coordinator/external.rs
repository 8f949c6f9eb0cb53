use std::io;
use std::path::PathBuf;

use niv_fs::FileIdentity;
use tracing::{debug, info, warn};

use super::IoCoordinator;
use crate::buffer::LifeState;
use crate::collaborators::{Choice, Dialogs, Extension};
use crate::error::{IoError, IoResult};
use crate::events::IoEvent;

/// Result of comparing a buffer with its file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalChange {
    Unchanged,
    /// A load or save is running; checked again on the next activation.
    Busy,
    /// The file changed and was loaded again.
    Reloaded,
    /// The file changed but the user kept the buffer as it is.
    Declined,
    /// The file disappeared; the buffer is now modified.
    Deleted,
}

impl<D: Dialogs, E: Extension> IoCoordinator<D, E> {
    /// Compare buffer `index` with its file and react to outside changes.
    ///
    /// A clean buffer is reloaded silently unless `ask_before_reload` is
    /// set. A modified one always asks, but only once for each file
    /// modification time.
    pub fn check_external_change(&mut self, index: usize) -> IoResult<ExternalChange> {
        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        if buffer.is_busy() || buffer.life() != LifeState::Opened {
            return Ok(ExternalChange::Busy);
        }
        let Some(path) = buffer.path.clone() else {
            return Ok(ExternalChange::Unchanged);
        };
        let known = buffer.identity.clone();

        let current = match FileIdentity::from_path(&path) {
            Ok(current) => current,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return match known {
                    Some(_) => self.file_deleted(index, path),
                    None => Ok(ExternalChange::Unchanged),
                };
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot stat");
                return Ok(ExternalChange::Unchanged);
            }
        };
        let changed = known.as_ref().is_none_or(|known| known.is_modified(&current));
        if !changed {
            return Ok(ExternalChange::Unchanged);
        }

        let dirty = buffer.is_dirty();
        if dirty || self.settings.ask_before_reload {
            if buffer.mod_last_asked == Some(current.mtime) {
                return Ok(ExternalChange::Declined);
            }
            let name = buffer.display_name();
            self.buffer_mut(index)?.mod_last_asked = Some(current.mtime);
            let message = if dirty {
                format!("{name} has been modified outside the editor. Reload and lose your changes?")
            } else {
                format!("{name} has been modified outside the editor. Reload it?")
            };
            if self.dialogs.confirm(&message) != Choice::Yes {
                debug!(path = %path.display(), "reload declined");
                return Ok(ExternalChange::Declined);
            }
        }

        info!(path = %path.display(), "file changed on disk, reloading");
        let preserve_undo = self.settings.reload_preserves_undo;
        self.reload(index, path, current.size, preserve_undo)?;
        Ok(ExternalChange::Reloaded)
    }

    fn file_deleted(&mut self, index: usize, path: PathBuf) -> IoResult<ExternalChange> {
        let buffer = self.buffer_mut(index)?;
        buffer.identity = None;
        buffer.mod_last_asked = None;
        buffer.dirty = true;
        let id = buffer.id();

        warn!(buffer = %id, path = %path.display(), "file deleted outside the editor");
        self.notify(&format!("{} has been deleted", path.display()));
        self.events.push(IoEvent::ExternalDeleted { buffer: id, path });
        Ok(ExternalChange::Deleted)
    }
}
