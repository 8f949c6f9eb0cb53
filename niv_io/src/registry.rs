//! Ordered collection of open buffers.
//!
//! Visible buffers occupy indices `0..visible`. Buffers closed while a
//! background save is still running are moved past that range: they keep
//! their worker and data but are no longer addressable by index until the
//! save finishes and they are purged (or restored after a failure).

use std::path::{Path, PathBuf};

use niv_fs::{Encoding, JobKind, Progress, WorkerId};

use crate::buffer::{Buffer, BufferId};
use crate::error::{IoError, IoResult};

/// Aggregate of all running loads and saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InFlight {
    pub loads: usize,
    pub saves: usize,
    /// One of the files being worked on, for display.
    pub representative: Option<PathBuf>,
    pub progress: Progress,
}

impl InFlight {
    pub fn count(&self) -> usize {
        self.loads + self.saves
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }
}

#[derive(Debug)]
pub struct BufferList {
    buffers: Vec<Buffer>,
    visible: usize,
    current: usize,
    max: usize,
    next_id: u64,
}

impl BufferList {
    pub fn new(max: usize) -> Self {
        Self { buffers: Vec::new(), visible: 0, current: 0, max: max.max(1), next_id: 1 }
    }

    /// Number of visible buffers.
    pub fn len(&self) -> usize {
        self.visible
    }

    pub fn is_empty(&self) -> bool {
        self.visible == 0
    }

    /// Visible plus closed buffers whose worker is still running.
    pub fn total(&self) -> usize {
        self.buffers.len()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn set_max(&mut self, max: usize) {
        self.max = max.max(1);
    }

    pub fn is_full(&self) -> bool {
        self.visible >= self.max
    }

    /// Append a new visible buffer and return its index.
    pub fn add(&mut self, path: Option<PathBuf>, encoding: Encoding) -> IoResult<usize> {
        if self.is_full() {
            return Err(IoError::BufferLimit { max: self.max });
        }
        let id = BufferId(self.next_id);
        self.next_id += 1;
        let index = self.visible;
        self.buffers.insert(index, Buffer::new(id, path, encoding));
        self.visible += 1;
        tracing::debug!(buffer = %id, index, "buffer added");
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&Buffer> {
        self.buffers[..self.visible].get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Buffer> {
        self.buffers[..self.visible].get_mut(index)
    }

    /// Any buffer, including closed ones whose worker is still running.
    pub(crate) fn slot(&self, index: usize) -> Option<&Buffer> {
        self.buffers.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Buffer> {
        self.buffers.get_mut(index)
    }

    pub(crate) fn is_visible(&self, index: usize) -> bool {
        index < self.visible
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Buffer> {
        self.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut Buffer> {
        let current = self.current;
        self.get_mut(current)
    }

    pub fn set_current(&mut self, index: usize) -> IoResult<()> {
        if index >= self.visible {
            return Err(IoError::NoSuchBuffer(index));
        }
        self.current = index;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers[..self.visible].iter()
    }

    pub(crate) fn iter_all(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }

    /// Visible buffer showing `path`, optionally ignoring the current one.
    pub fn find_by_path(&self, path: &Path, exclude_current: bool) -> Option<usize> {
        self.iter()
            .enumerate()
            .filter(|&(i, _)| !(exclude_current && i == self.current))
            .find(|(_, b)| b.path() == Some(path))
            .map(|(i, _)| i)
    }

    /// Slot of the buffer owning worker `id`, visible or not.
    pub fn find_by_worker(&self, id: WorkerId) -> Option<usize> {
        self.buffers.iter().position(|b| b.worker_id() == Some(id))
    }

    pub fn find_by_id(&self, id: BufferId) -> Option<usize> {
        self.iter().position(|b| b.id() == id)
    }

    /// Oldest visible buffer that can be closed without losing anything.
    pub fn oldest_evictable(&self) -> Option<usize> {
        self.iter()
            .enumerate()
            .filter(|&(i, b)| i != self.current && !b.is_dirty() && !b.is_busy())
            .min_by_key(|(_, b)| b.id())
            .map(|(i, _)| i)
    }

    /// Remove a visible buffer.
    ///
    /// A buffer with a load or save in flight is hidden instead and `None`
    /// is returned; it stays in the list until [`BufferList::purge`].
    pub fn remove(&mut self, index: usize) -> Option<Buffer> {
        if index >= self.visible {
            return None;
        }
        let buffer = self.buffers.remove(index);
        self.visible -= 1;
        if index < self.current || self.current >= self.visible {
            self.current = self.current.saturating_sub(1);
        }

        if buffer.is_busy() {
            tracing::debug!(buffer = %buffer.id(), job = ?buffer.job(), "hidden until its worker stops");
            self.buffers.push(buffer);
            None
        } else {
            Some(buffer)
        }
    }

    /// Drop a hidden buffer whose worker has finished.
    pub(crate) fn purge(&mut self, slot: usize) -> Option<Buffer> {
        if slot < self.visible || slot >= self.buffers.len() {
            return None;
        }
        Some(self.buffers.remove(slot))
    }

    /// Bring a hidden buffer back into the visible range; returns its index.
    pub(crate) fn restore(&mut self, slot: usize) -> Option<usize> {
        if slot < self.visible || slot >= self.buffers.len() {
            return None;
        }
        let buffer = self.buffers.remove(slot);
        let index = self.visible;
        self.buffers.insert(index, buffer);
        self.visible += 1;
        Some(index)
    }

    /// Summary of every running worker, hidden buffers included.
    pub fn in_flight(&self) -> InFlight {
        let mut summary = InFlight::default();
        for buffer in self.iter_all() {
            let Some(job) = buffer.job() else { continue };
            match job {
                JobKind::Load => summary.loads += 1,
                JobKind::Save => summary.saves += 1,
            }
            if let Some(progress) = buffer.progress() {
                summary.progress.done += progress.done;
                summary.progress.total += progress.total;
            }
            if summary.representative.is_none() {
                summary.representative = buffer.path().map(Path::to_path_buf);
            }
        }
        summary
    }

    pub fn saving_in_background(&self) -> bool {
        self.iter_all().any(|b| b.job() == Some(JobKind::Save))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::WorkerKind;
    use crossbeam_channel::unbounded;
    use niv_fs::{FileSaveConfig, FileSinkFactory, FileStorer};
    use std::sync::Arc;

    fn list_with(paths: &[&str]) -> BufferList {
        let mut list = BufferList::new(10);
        for path in paths {
            list.add(Some(PathBuf::from(path)), Encoding::Utf8).unwrap();
        }
        list
    }

    #[test]
    fn test_add_until_full() {
        let mut list = BufferList::new(2);
        assert_eq!(list.add(None, Encoding::Utf8).unwrap(), 0);
        assert_eq!(list.add(None, Encoding::Utf8).unwrap(), 1);
        assert!(matches!(list.add(None, Encoding::Utf8), Err(IoError::BufferLimit { max: 2 })));
    }

    #[test]
    fn test_find_by_path_excluding_current() {
        let mut list = list_with(&["/a", "/b"]);
        list.set_current(1).unwrap();
        assert_eq!(list.find_by_path(Path::new("/b"), false), Some(1));
        assert_eq!(list.find_by_path(Path::new("/b"), true), None);
        assert_eq!(list.find_by_path(Path::new("/a"), true), Some(0));
    }

    #[test]
    fn test_remove_compacts_and_fixes_current() {
        let mut list = list_with(&["/a", "/b", "/c"]);
        list.set_current(2).unwrap();
        let removed = list.remove(0).unwrap();
        assert_eq!(removed.path(), Some(Path::new("/a")));
        assert_eq!(list.len(), 2);
        assert_eq!(list.current().and_then(Buffer::path), Some(Path::new("/c")));

        list.remove(1);
        assert_eq!(list.current_index(), 0);
        assert!(matches!(list.set_current(1), Err(IoError::NoSuchBuffer(1))));
    }

    #[test]
    fn test_oldest_evictable_skips_dirty_and_current() {
        let mut list = list_with(&["/a", "/b", "/c"]);
        list.get_mut(0).unwrap().dirty = true;
        list.set_current(1).unwrap();
        assert_eq!(list.oldest_evictable(), Some(2));
    }

    #[test]
    fn test_saving_buffer_hidden_then_purged() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("s.txt");
        let mut list = list_with(&["/a"]);
        let index = list.add(Some(target.clone()), Encoding::Utf8).unwrap();

        let (tx, rx) = unbounded();
        let worker = FileStorer::spawn(
            WorkerId(1),
            target.clone(),
            "data".to_string(),
            FileSaveConfig::default(),
            Arc::new(FileSinkFactory),
            tx,
        )
        .unwrap();
        let kind = WorkerKind::Save {
            worker,
            path: target,
            revision: 0,
            read_only: false,
            close_after: true,
        };
        list.get_mut(index).unwrap().attach_worker(kind).unwrap();

        assert!(list.remove(index).is_none());
        assert_eq!(list.len(), 1);
        assert_eq!(list.total(), 2);
        assert!(list.saving_in_background());

        let done = rx.recv().unwrap();
        let slot = list.find_by_worker(done.id).unwrap();
        assert!(!list.is_visible(slot));
        list.slot_mut(slot).unwrap().worker = None;
        assert!(list.purge(slot).is_some());
        assert_eq!(list.total(), 1);
        assert!(list.in_flight().is_idle());
    }
}
