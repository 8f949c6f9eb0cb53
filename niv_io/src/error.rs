use std::path::PathBuf;

use niv_fs::{FsError, UnknownEncoding};

/// Errors returned by coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("{} is {size} bytes, larger than the {limit} byte limit", path.display())]
    SizeRejected { path: PathBuf, size: u64, limit: u64 },

    #[error("{} is still being loaded or saved", path.display())]
    AlreadyInFlight { path: PathBuf },

    #[error("buffer has no file name")]
    NoPath,

    #[error("{} was not fully loaded; reopen it before saving", path.display())]
    SaveBlocked { path: PathBuf },

    #[error("{} is already open in another buffer", path.display())]
    AlreadyOpen { path: PathBuf },

    #[error("all {max} buffers are in use")]
    BufferLimit { max: usize },

    #[error("no buffer at index {0}")]
    NoSuchBuffer(usize),

    #[error("buffer cannot be edited")]
    NotEditable,

    #[error(transparent)]
    Encoding(#[from] UnknownEncoding),
}

pub type IoResult<T> = Result<T, IoError>;
