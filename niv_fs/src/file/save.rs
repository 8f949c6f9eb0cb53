//! Streaming file saving with transcoding, atomic replace and permission
//! preservation.
//!
//! A save works from an owned snapshot of the text taken when the save was
//! requested, so edits made while it runs never reach the file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use super::identity::FileIdentity;
use crate::encoding::{Encoder, Encoding};
use crate::encoding::codec::text_chunks;
use crate::error::{FsError, FsResult};
use crate::worker::{Completion, JobKind, Worker, WorkerControl, WorkerId};

/// Configuration for file saving operations
#[derive(Debug, Clone)]
pub struct FileSaveConfig {
    /// Target encoding; a BOM is written iff it has one
    pub encoding: Encoding,
    /// Text bytes encoded per chunk
    pub chunk_size: usize,
    /// Sleep between chunks
    pub sleep: Duration,
    /// Whether to preserve file permissions (Unix only)
    pub preserve_permissions: bool,
    /// Whether to use atomic writes with temp files
    pub atomic_writes: bool,
    /// Custom temp file suffix
    pub temp_suffix: String,
}

impl Default for FileSaveConfig {
    fn default() -> Self {
        FileSaveConfig {
            encoding: Encoding::Utf8,
            chunk_size: 128 * 1024,
            sleep: Duration::ZERO,
            preserve_permissions: true,
            atomic_writes: true,
            temp_suffix: ".tmp".to_string(),
        }
    }
}

/// Result of a completed save.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub path: PathBuf,
    /// Encoded bytes written, BOM included.
    pub bytes_written: u64,
    pub encoding: Encoding,
    /// Characters written as `?` because the encoding cannot hold them.
    pub unrepresentable: usize,
    /// Identity after the write, used as the new modification stamp.
    pub identity: Option<FileIdentity>,
}

/// Destination for the encoded bytes of one save.
pub trait SaveSink: Send {
    /// Write `bytes`, returning how many were accepted. Fewer than
    /// `bytes.len()` is treated as a fatal short write.
    fn write_chunk(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Make the written bytes the content of the target file.
    fn commit(self: Box<Self>) -> io::Result<()>;

    /// Discard whatever can be discarded after a failure or cancellation.
    fn abort(self: Box<Self>);
}

/// Opens a [`SaveSink`] for a target path.
pub trait SinkFactory: Send + Sync {
    fn create(&self, path: &Path, config: &FileSaveConfig) -> io::Result<Box<dyn SaveSink>>;
}

/// Sinks backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSinkFactory;

impl SinkFactory for FileSinkFactory {
    fn create(&self, path: &Path, config: &FileSaveConfig) -> io::Result<Box<dyn SaveSink>> {
        let (write_path, temp) = if config.atomic_writes {
            let temp = get_temp_path(path, &config.temp_suffix);
            (temp.clone(), Some(temp))
        } else {
            (path.to_path_buf(), None)
        };
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&write_path)?;
        Ok(Box::new(FileSink {
            file,
            target: path.to_path_buf(),
            temp,
            preserve_permissions: config.preserve_permissions,
        }))
    }
}

struct FileSink {
    file: File,
    target: PathBuf,
    temp: Option<PathBuf>,
    preserve_permissions: bool,
}

impl SaveSink for FileSink {
    fn write_chunk(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < bytes.len() {
            match self.file.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    fn commit(self: Box<Self>) -> io::Result<()> {
        let FileSink { file, target, temp, preserve_permissions: preserve } = *self;
        let Some(temp) = temp else {
            return sync_and_close(file);
        };

        let result = sync_and_close(file).and_then(|()| {
            if preserve && target.exists() {
                preserve_permissions(&target, &temp)?;
            }
            // Atomically move temp file to final location
            fs::rename(&temp, &target)
        });
        if result.is_err() {
            remove_temp(&temp);
        }
        result
    }

    fn abort(self: Box<Self>) {
        if let Some(temp) = &self.temp {
            remove_temp(temp);
        }
    }
}

/// Entry points for writing a snapshot to disk.
pub struct FileStorer;

impl FileStorer {
    /// Save on a background thread. `completions` receives one message when done.
    pub fn spawn(
        id: WorkerId,
        path: PathBuf,
        snapshot: String,
        config: FileSaveConfig,
        sinks: Arc<dyn SinkFactory>,
        completions: Sender<Completion>,
    ) -> FsResult<Worker<SavedFile>> {
        let sleep = config.sleep;
        let target = path.clone();
        Worker::spawn(id, JobKind::Save, path, sleep, completions, move |ctl| {
            store_with_control(&target, &snapshot, &config, sinks.as_ref(), ctl)
        })
    }

    /// Save on the calling thread.
    pub fn store_blocking(
        path: &Path,
        snapshot: &str,
        config: &FileSaveConfig,
        sinks: &dyn SinkFactory,
    ) -> FsResult<SavedFile> {
        store_with_control(path, snapshot, config, sinks, &WorkerControl::detached())
    }
}

fn store_with_control(
    path: &Path,
    snapshot: &str,
    config: &FileSaveConfig,
    sinks: &dyn SinkFactory,
    ctl: &WorkerControl,
) -> FsResult<SavedFile> {
    ctl.set_total(snapshot.len() as u64);
    let mut sink = sinks.create(path, config).map_err(|e| FsError::open(path, e))?;

    let (bytes_written, unrepresentable) = match stream_chunks(sink.as_mut(), path, snapshot, config, ctl) {
        Ok(counts) => counts,
        Err(err) => {
            sink.abort();
            return Err(err);
        }
    };
    sink.commit().map_err(|e| FsError::write(path, e))?;

    debug!(path = %path.display(), bytes_written, encoding = %config.encoding, "saved");
    Ok(SavedFile {
        path: path.to_path_buf(),
        bytes_written,
        encoding: config.encoding,
        unrepresentable,
        identity: FileIdentity::from_path(path).ok(),
    })
}

fn stream_chunks(
    sink: &mut dyn SaveSink,
    path: &Path,
    snapshot: &str,
    config: &FileSaveConfig,
    ctl: &WorkerControl,
) -> FsResult<(u64, usize)> {
    let chunk_size = config.chunk_size.max(1);
    let mut encoder = Encoder::new(config.encoding);
    let mut out = Vec::with_capacity(chunk_size * 2 + 4);
    let mut bytes_written = 0u64;
    let mut done = 0u64;

    encoder.start(&mut out);
    if !out.is_empty() {
        bytes_written += write_chunk(sink, path, &out)?;
    }

    for piece in text_chunks(snapshot, chunk_size) {
        ctl.checkpoint()?;
        out.clear();
        encoder.encode(piece, &mut out);
        bytes_written += write_chunk(sink, path, &out)?;
        done += piece.len() as u64;
        ctl.report(done);
        ctl.pause();
    }
    ctl.checkpoint()?;

    Ok((bytes_written, encoder.unrepresentable()))
}

fn write_chunk(sink: &mut dyn SaveSink, path: &Path, bytes: &[u8]) -> FsResult<u64> {
    let written = sink.write_chunk(bytes).map_err(|e| FsError::write(path, e))?;
    if written < bytes.len() {
        return Err(FsError::ShortWrite {
            path: path.to_path_buf(),
            written,
            requested: bytes.len(),
        });
    }
    Ok(written as u64)
}

fn sync_and_close(mut file: File) -> io::Result<()> {
    file.flush()?;
    file.sync_all()
}

fn remove_temp(temp: &Path) {
    if let Err(err) = fs::remove_file(temp) {
        warn!(path = %temp.display(), error = %err, "cannot remove temp file");
    }
}

/// Generate temp file path.
fn get_temp_path(original_path: &Path, suffix: &str) -> PathBuf {
    let mut temp_path = original_path.to_path_buf();
    let original_name = temp_path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");

    let temp_name = format!("{}{}", original_name, suffix);
    temp_path.set_file_name(temp_name);
    temp_path
}

/// Preserve file permissions from source to target.
#[cfg(unix)]
fn preserve_permissions(source: &Path, target: &Path) -> io::Result<()> {
    let permissions = fs::metadata(source)?.permissions();
    fs::set_permissions(target, permissions)
}

#[cfg(not(unix))]
fn preserve_permissions(_source: &Path, _target: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{Outcome, WorkerState};
    use crossbeam_channel::unbounded;

    /// Accepts `capacity` bytes, then fails the way a full device does.
    struct FullDisk {
        capacity: usize,
        short: bool,
    }

    struct FullDiskSink {
        left: usize,
        short: bool,
    }

    impl SinkFactory for FullDisk {
        fn create(&self, _path: &Path, _config: &FileSaveConfig) -> io::Result<Box<dyn SaveSink>> {
            Ok(Box::new(FullDiskSink { left: self.capacity, short: self.short }))
        }
    }

    impl SaveSink for FullDiskSink {
        fn write_chunk(&mut self, bytes: &[u8]) -> io::Result<usize> {
            if bytes.len() <= self.left {
                self.left -= bytes.len();
                return Ok(bytes.len());
            }
            if self.short {
                let n = self.left;
                self.left = 0;
                Ok(n)
            } else {
                Err(io::Error::from(io::ErrorKind::StorageFull))
            }
        }

        fn commit(self: Box<Self>) -> io::Result<()> {
            Ok(())
        }

        fn abort(self: Box<Self>) {}
    }

    fn save(path: &Path, text: &str, config: &FileSaveConfig) -> SavedFile {
        FileStorer::store_blocking(path, text, config, &FileSinkFactory).unwrap()
    }

    #[test]
    fn test_save_utf8_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let content = "Hello, UTF-8!\nSecond line";

        let result = save(&path, content, &FileSaveConfig::default());
        assert_eq!(result.bytes_written, content.len() as u64);
        assert!(result.identity.is_some());
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
        assert!(!get_temp_path(&path, ".tmp").exists());
    }

    #[test]
    fn test_save_with_bom_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.txt");
        let config = FileSaveConfig { encoding: Encoding::Utf8Bom, chunk_size: 2, ..Default::default() };

        save(&path, "Hello with BOM!", &config);
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[0..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(&bytes[3..], b"Hello with BOM!");
    }

    #[test]
    fn test_save_utf16be_and_eight_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.txt");
        let config = FileSaveConfig { encoding: Encoding::Utf16Be, ..Default::default() };
        save(&path, "Hi", &config);
        assert_eq!(fs::read(&path).unwrap(), vec![0xFE, 0xFF, 0, b'H', 0, b'i']);

        let config = FileSaveConfig { encoding: Encoding::EightBit, ..Default::default() };
        let result = save(&path, "\u{e9}\u{20ac}", &config);
        assert_eq!(result.unrepresentable, 1);
        assert_eq!(fs::read(&path).unwrap(), vec![0xE9, b'?']);
    }

    #[test]
    fn test_direct_write_without_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("direct.txt");
        let config = FileSaveConfig { atomic_writes: false, ..Default::default() };
        save(&path, "direct", &config);
        assert_eq!(fs::read_to_string(&path).unwrap(), "direct");
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_save_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

        save(&path, "new", &FileSaveConfig::default());
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_disk_full_and_short_write_are_fatal() {
        let path = Path::new("/nonexistent/full.txt");
        let config = FileSaveConfig { chunk_size: 4, ..Default::default() };

        let err = FileStorer::store_blocking(path, "0123456789", &config, &FullDisk { capacity: 6, short: false })
            .unwrap_err();
        assert!(matches!(err, FsError::DiskFull { .. }));

        let err = FileStorer::store_blocking(path, "0123456789", &config, &FullDisk { capacity: 6, short: true })
            .unwrap_err();
        assert!(matches!(err, FsError::ShortWrite { written: 2, requested: 4, .. }));
    }

    #[test]
    fn test_failed_atomic_save_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        fs::write(&path, "original").unwrap();

        struct Failing;
        impl SinkFactory for Failing {
            fn create(&self, path: &Path, config: &FileSaveConfig) -> io::Result<Box<dyn SaveSink>> {
                let real = FileSinkFactory.create(path, config)?;
                real.abort();
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
        }

        let err = FileStorer::store_blocking(&path, "replacement", &FileSaveConfig::default(), &Failing)
            .unwrap_err();
        assert!(matches!(err, FsError::OpenFailure { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert!(!get_temp_path(&path, ".tmp").exists());
    }

    #[test]
    fn test_failed_commit_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail after the
        // temp file was written and its permissions copied.
        let path = dir.path().join("blocked");
        fs::create_dir(&path).unwrap();

        let err = FileStorer::store_blocking(&path, "data", &FileSaveConfig::default(), &FileSinkFactory)
            .unwrap_err();
        assert!(matches!(err, FsError::Write { .. }));
        assert!(!get_temp_path(&path, ".tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn test_background_save_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.txt");
        let (tx, rx) = unbounded();
        let config = FileSaveConfig { chunk_size: 3, ..Default::default() };
        let worker = FileStorer::spawn(
            WorkerId(9),
            path.clone(),
            "snapshot text".to_string(),
            config,
            Arc::new(FileSinkFactory),
            tx,
        )
        .unwrap();

        assert_eq!(rx.recv().unwrap().state, WorkerState::Completed);
        assert_eq!(worker.progress().done, 13);
        assert!(matches!(worker.wait(), Outcome::Completed(SavedFile { bytes_written: 13, .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "snapshot text");
    }

    #[test]
    fn test_get_temp_path() {
        let original = Path::new("/path/to/file.txt");
        let temp = get_temp_path(original, ".tmp");

        assert_eq!(temp, Path::new("/path/to/file.txt.tmp"));
    }
}
