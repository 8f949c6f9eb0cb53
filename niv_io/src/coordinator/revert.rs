use std::path::{Path, PathBuf};

use niv_fs::{Document, Encoding, FileIdentity, FsError, decode_all};
use tracing::{debug, info};

use super::{IoCoordinator, OpenFlags};
use crate::buffer::{LifeState, ViewState};
use crate::collaborators::{Dialogs, Extension};
use crate::error::{IoError, IoResult};
use crate::events::IoEvent;

impl<D: Dialogs, E: Extension> IoCoordinator<D, E> {
    /// Discard unsaved changes in buffer `index` and show the file as it is
    /// on disk.
    ///
    /// Small 8-bit and UTF-8 files are patched in place by replacing only the
    /// range that differs, so the caret stays where it was. Anything else is
    /// loaded again.
    pub fn revert(&mut self, index: usize) -> IoResult<()> {
        self.complete_pending_load(index);
        let buffer = self.buffer(index).ok_or(IoError::NoSuchBuffer(index))?;
        if buffer.is_busy() {
            return Err(buffer.in_flight_error());
        }
        let encoding = buffer.encoding();
        let minimal_allowed = buffer.life() == LifeState::Opened && !buffer.is_save_blocked();
        let Some(path) = buffer.path.clone() else {
            self.clear_untitled(index)?;
            return Ok(());
        };

        let size = std::fs::metadata(&path).map_err(|e| FsError::open(&path, e))?.len();
        let patchable = encoding == Encoding::EightBit || encoding.is_utf8();
        if minimal_allowed
            && patchable
            && size <= self.settings.revert_minimal_size
            && self.revert_minimal(index, &path, encoding)?
        {
            return Ok(());
        }

        self.reload(index, path, size, false)?;
        let id = self.buffer(index).map(|b| b.id()).ok_or(IoError::NoSuchBuffer(index))?;
        self.events.push(IoEvent::Reverted { buffer: id, minimal: false });
        Ok(())
    }

    /// Load the file of buffer `index` again, keeping its view.
    pub(super) fn reload(
        &mut self,
        index: usize,
        path: PathBuf,
        size: u64,
        preserve_undo: bool,
    ) -> IoResult<()> {
        let read_only = self.buffer(index).map(|b| b.is_read_only());
        let flags = OpenFlags { preserve_undo, read_only, ..OpenFlags::default() };
        self.start_load(index, path, size, flags, true)
    }

    /// Patch the differing middle of the document. Returns `false` when the
    /// file's encoding no longer matches and a full reload is needed.
    fn revert_minimal(&mut self, index: usize, path: &Path, encoding: Encoding) -> IoResult<bool> {
        let bytes = std::fs::read(path).map_err(|e| FsError::read(path, e))?;
        if encoding == Encoding::Utf8Bom && !bytes.starts_with(encoding.bom()) {
            return Ok(false);
        }
        let (text, found) = decode_all(&bytes, encoding);
        if found != encoding {
            debug!(path = %path.display(), %encoding, %found, "encoding changed on disk");
            return Ok(false);
        }
        let identity = FileIdentity::from_path(path).ok();

        let buffer = self.buffer_mut(index)?;
        let (start, old_end, new_end) = common_ends(buffer.document.text(), &text);
        if start != old_end || start != new_end {
            buffer.document.replace(start..old_end, &text[start..new_end]);
            buffer.view.shift_for_replace(&(start..old_end), new_end - start);
        }
        buffer.view.clamp_to(&buffer.document);
        buffer.identity = identity;
        buffer.mod_last_asked = None;
        buffer.dirty = false;

        let id = buffer.id();
        info!(buffer = %id, replaced = old_end - start, inserted = new_end - start, "reverted in place");
        self.events.push(IoEvent::Reverted { buffer: id, minimal: true });
        Ok(true)
    }

    fn clear_untitled(&mut self, index: usize) -> IoResult<()> {
        let buffer = self.buffer_mut(index)?;
        buffer.document = Document::new(buffer.document.options());
        buffer.view = ViewState::default();
        buffer.dirty = false;
        buffer.life = LifeState::Opened;
        let id = buffer.id();
        self.events.push(IoEvent::Reverted { buffer: id, minimal: false });
        Ok(())
    }
}

/// Bounds of the differing middle: `old[start..old_end]` becomes
/// `new[start..new_end]`. Both ends fall on character boundaries.
fn common_ends(old: &str, new: &str) -> (usize, usize, usize) {
    let (a, b) = (old.as_bytes(), new.as_bytes());
    let mut prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    while !old.is_char_boundary(prefix) || !new.is_char_boundary(prefix) {
        prefix -= 1;
    }

    let room = a.len().min(b.len()) - prefix;
    let mut suffix = a.iter().rev().zip(b.iter().rev()).take(room).take_while(|(x, y)| x == y).count();
    while !old.is_char_boundary(a.len() - suffix) || !new.is_char_boundary(b.len() - suffix) {
        suffix -= 1;
    }
    (prefix, a.len() - suffix, b.len() - suffix)
}

#[cfg(test)]
mod tests {
    use super::common_ends;

    #[test]
    fn test_common_ends_single_change() {
        assert_eq!(common_ends("hello world", "hello there world"), (6, 6, 12));
        assert_eq!(common_ends("abc", "abc"), (3, 3, 3));
        assert_eq!(common_ends("", "new"), (0, 0, 3));
        assert_eq!(common_ends("gone", ""), (0, 4, 0));
    }

    #[test]
    fn test_common_ends_overlap_is_bounded() {
        // "aa" -> "aaa": prefix takes both, suffix may not reuse them.
        assert_eq!(common_ends("aa", "aaa"), (2, 2, 3));
    }

    #[test]
    fn test_common_ends_respect_char_boundaries() {
        // é = C3 A9, è = C3 A8: shared lead byte must not split.
        let (start, old_end, new_end) = common_ends("xé", "xè");
        assert_eq!((start, old_end, new_end), (1, 3, 3));
        let (start, old_end, new_end) = common_ends("éz", "èz");
        assert_eq!((start, old_end, new_end), (0, 2, 2));
    }
}
