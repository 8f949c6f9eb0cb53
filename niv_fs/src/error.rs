use std::io;
use std::path::{Path, PathBuf};

/// Errors produced by load and save workers.
///
/// These are carried as worker outcomes and never raised across threads.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("cannot open {}: {source}", path.display())]
    OpenFailure { path: PathBuf, source: io::Error },

    #[error("read failed on {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("write failed on {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("short write on {}: {written} of {requested} bytes", path.display())]
    ShortWrite { path: PathBuf, written: usize, requested: usize },

    #[error("disk full while writing {}", path.display())]
    DiskFull { path: PathBuf },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{substitutions} bytes could not be decoded and were replaced")]
    EncodingAmbiguous { substitutions: usize },

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("cannot start worker thread: {0}")]
    Spawn(#[source] io::Error),
}

impl FsError {
    pub fn open(path: &Path, source: io::Error) -> Self {
        FsError::OpenFailure { path: path.to_path_buf(), source }
    }

    pub fn read(path: &Path, source: io::Error) -> Self {
        FsError::Read { path: path.to_path_buf(), source }
    }

    /// Classify a write error, singling out a full device.
    pub fn write(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::StorageFull {
            FsError::DiskFull { path: path.to_path_buf() }
        } else {
            FsError::Write { path: path.to_path_buf(), source }
        }
    }

    /// True for short writes and full devices.
    pub fn is_disk_full(&self) -> bool {
        matches!(self, FsError::DiskFull { .. } | FsError::ShortWrite { .. })
    }
}

pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_classification() {
        let full = FsError::write(Path::new("a"), io::Error::from(io::ErrorKind::StorageFull));
        assert!(matches!(full, FsError::DiskFull { .. }));
        assert!(full.is_disk_full());

        let denied =
            FsError::write(Path::new("a"), io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, FsError::Write { .. }));
        assert!(!denied.is_disk_full());
    }

    #[test]
    fn test_messages_name_path() {
        let err = FsError::ShortWrite { path: PathBuf::from("/tmp/x.txt"), written: 3, requested: 9 };
        assert_eq!(err.to_string(), "short write on /tmp/x.txt: 3 of 9 bytes");
    }
}
