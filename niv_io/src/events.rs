//! Notifications for status-bar and menu refresh.

use std::path::PathBuf;

use niv_fs::Encoding;

use crate::buffer::BufferId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    Opened { buffer: BufferId, path: PathBuf, encoding: Encoding, background: bool },
    LoadFailed { buffer: BufferId, path: PathBuf, message: String },
    LoadCancelled { buffer: BufferId, path: PathBuf },
    Saved { buffer: BufferId, path: PathBuf, encoding: Encoding, bytes: u64 },
    SaveFailed { buffer: BufferId, path: PathBuf, message: String },
    /// Save finished but the buffer had been renamed meanwhile; it stays dirty.
    SavedElsewhere { buffer: BufferId, saved: PathBuf, current: Option<PathBuf> },
    Reverted { buffer: BufferId, minimal: bool },
    ExternalDeleted { buffer: BufferId, path: PathBuf },
    Closed { buffer: BufferId, path: Option<PathBuf> },
    /// The last background save finished.
    AllSavesFinished,
}
