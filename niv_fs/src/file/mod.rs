//! File operations for loading and saving with encoding handling.
//!
//! This module provides:
//! - Streaming file loading with encoding detection
//! - Streaming, atomic saving with transcoding
//! - EOL detection
//! - File identity as a modification stamp

pub mod eol;
pub mod identity;
pub mod load;
pub mod save;

pub use eol::{EolType, detect_eol};
pub use identity::FileIdentity;
pub use load::{FileLoadConfig, FileLoader, LoadedFile};
pub use save::{FileSaveConfig, FileSinkFactory, FileStorer, SaveSink, SavedFile, SinkFactory};
