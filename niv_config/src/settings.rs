use std::time::Duration;

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// File load/save behaviour.
///
/// Every field has a default, so a config file only needs to name the
/// settings it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSettings {
    /// Files larger than this load on a background thread. `None` never does.
    pub background_open_size: Option<u64>,
    /// Documents larger than this save on a background thread. `None` never does.
    pub background_save_size: Option<u64>,
    /// Bytes per worker chunk
    pub chunk_size: usize,
    /// Sleep between worker chunks, in milliseconds
    pub async_sleep_ms: u64,
    /// Opening a larger file needs confirmation. `None` disables the check.
    pub max_file_size: Option<u64>,
    /// Documents above this size are created in large-file mode
    pub large_file_size: Option<u64>,
    /// Documents above this size are created without styling
    pub no_style_size: Option<u64>,
    /// Ask before reloading a clean buffer changed on disk
    pub ask_before_reload: bool,
    /// Check for external changes when a buffer is activated
    pub load_on_activate: bool,
    /// Reloads keep undo history (forces synchronous reloads)
    pub reload_preserves_undo: bool,
    /// Newly opened buffers are read-only
    pub read_only_on_open: bool,
    /// Switch to an existing buffer instead of opening a file twice
    pub check_if_already_open: bool,
    /// Largest file reverted by patching only the changed middle
    pub revert_minimal_size: u64,
    /// Encoding label for new, empty and pure-ASCII files
    pub default_encoding: String,
    /// Write through a temp file and rename
    pub atomic_save: bool,
    /// Keep the permissions of the file being replaced
    pub preserve_permissions: bool,
    /// Ask before saving over a file that changed on disk since it was read
    pub save_check_modified_time: bool,
    /// Maximum number of visible buffers
    pub max_buffers: usize,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            background_open_size: Some(MIB),
            background_save_size: Some(MIB),
            chunk_size: 128 * 1024,
            async_sleep_ms: 0,
            max_file_size: Some(2_000_000_000),
            large_file_size: None,
            no_style_size: None,
            ask_before_reload: false,
            load_on_activate: true,
            reload_preserves_undo: false,
            read_only_on_open: false,
            check_if_already_open: true,
            revert_minimal_size: 1_000_000,
            default_encoding: "utf-8".to_string(),
            atomic_save: true,
            preserve_permissions: true,
            save_check_modified_time: false,
            max_buffers: 20,
        }
    }
}

impl IoSettings {
    pub fn async_sleep(&self) -> Duration {
        Duration::from_millis(self.async_sleep_ms)
    }

    /// Whether a file of `size` bytes should load in the background.
    pub fn opens_in_background(&self, size: u64) -> bool {
        self.background_open_size.is_some_and(|limit| size > limit)
    }

    /// Whether a document of `size` bytes should save in the background.
    pub fn saves_in_background(&self, size: u64) -> bool {
        self.background_save_size.is_some_and(|limit| size > limit)
    }

    pub fn exceeds_max_size(&self, size: u64) -> bool {
        self.max_file_size.is_some_and(|limit| limit > 0 && size > limit)
    }

    pub fn is_large(&self, size: u64) -> bool {
        self.large_file_size.is_some_and(|limit| size > limit)
    }

    pub fn skips_styling(&self, size: u64) -> bool {
        self.no_style_size.is_some_and(|limit| size > limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = IoSettings::default();
        assert!(settings.opens_in_background(5 * MIB));
        assert!(!settings.opens_in_background(10));
        assert!(!settings.is_large(u64::MAX));
        assert_eq!(settings.async_sleep(), Duration::ZERO);
    }

    #[test]
    fn test_disabled_thresholds() {
        let settings = IoSettings {
            background_open_size: None,
            background_save_size: None,
            max_file_size: Some(0),
            ..Default::default()
        };
        assert!(!settings.opens_in_background(u64::MAX));
        assert!(!settings.saves_in_background(u64::MAX));
        assert!(!settings.exceeds_max_size(u64::MAX));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings: IoSettings =
            serde_yaml::from_str("chunk_size: 4096\nbackground_open_size: null\n").unwrap();
        assert_eq!(settings.chunk_size, 4096);
        assert_eq!(settings.background_open_size, None);
        assert_eq!(settings.max_buffers, IoSettings::default().max_buffers);
        assert!(!settings.save_check_modified_time);

        let settings: IoSettings = serde_yaml::from_str("save_check_modified_time: true\n").unwrap();
        assert!(settings.save_check_modified_time);
    }
}
