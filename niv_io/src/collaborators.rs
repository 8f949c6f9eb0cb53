//! Interfaces to the parts of the editor outside file I/O.

use std::path::Path;

/// Answer to a yes/no/cancel question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
    Cancel,
}

/// Windowing and dialog layer.
pub trait Dialogs {
    fn confirm(&mut self, message: &str) -> Choice;

    fn notify(&mut self, message: &str);

    /// Advisory progress display; never required for correctness.
    fn show_progress(&mut self, label: &str, total: u64, current: u64);
}

/// Scripting extension hooks. Every hook defaults to doing nothing.
pub trait Extension {
    fn on_open(&mut self, _path: &Path) {}

    /// Return `true` if the extension wrote the file itself; the buffer is
    /// then marked saved and nothing else is written.
    fn on_before_save(&mut self, _path: &Path) -> bool {
        false
    }

    fn on_save(&mut self, _path: &Path) {}

    fn on_close(&mut self, _path: &Path) {}
}

/// No extension loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtension;

impl Extension for NoExtension {}
