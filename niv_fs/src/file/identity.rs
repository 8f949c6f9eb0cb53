//! File identity used as a modification stamp.
//!
//! Uses file system metadata to create identities that survive renames
//! within the same volume and change whenever the content is rewritten.

use std::path::Path;
use std::time::SystemTime;

/// Stable file identity plus its last modification stamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    /// Device ID (Unix), zero elsewhere
    pub device_id: u64,
    /// Inode number (Unix), zero elsewhere
    pub inode: u64,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub mtime: SystemTime,
}

impl FileIdentity {
    /// Read the identity of the file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(&path)?;
        Self::from_metadata(&metadata)
    }

    pub fn from_metadata(metadata: &std::fs::Metadata) -> std::io::Result<Self> {
        let mtime = metadata.modified()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Ok(FileIdentity {
                device_id: metadata.dev(),
                inode: metadata.ino(),
                size: metadata.size(),
                mtime,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(FileIdentity { device_id: 0, inode: 0, size: metadata.len(), mtime })
        }
    }

    /// Check if two identities represent the same file (allowing for content changes).
    pub fn is_same_file(&self, other: &FileIdentity) -> bool {
        self.device_id == other.device_id && self.inode == other.inode
    }

    /// Check if the file has been modified since this identity was taken.
    pub fn is_modified(&self, current: &FileIdentity) -> bool {
        !self.is_same_file(current) || self.mtime != current.mtime || self.size != current.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_identity_creation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Hello, world!").unwrap();

        let identity = FileIdentity::from_path(temp_file.path()).unwrap();
        assert_eq!(identity.size, 14);
        #[cfg(unix)]
        assert!(identity.inode > 0);
    }

    #[test]
    fn test_same_file_detection() {
        let temp_file = NamedTempFile::new().unwrap();
        let a = FileIdentity::from_path(temp_file.path()).unwrap();
        let b = FileIdentity::from_path(temp_file.path()).unwrap();
        assert!(a.is_same_file(&b));
        assert!(!a.is_modified(&b));
    }

    #[test]
    fn test_modification_detection() {
        let temp_file = NamedTempFile::new().unwrap();
        let before = FileIdentity::from_path(temp_file.path()).unwrap();

        let mut later = before.clone();
        later.mtime = before.mtime + Duration::from_secs(2);
        assert!(before.is_modified(&later));

        let mut grown = before.clone();
        grown.size += 1;
        assert!(before.is_modified(&grown));
    }
}
