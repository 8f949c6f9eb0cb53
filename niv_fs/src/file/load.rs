//! Streaming file loading with encoding detection.
//!
//! The same body runs inline for synchronous opens and on a worker thread
//! for background opens, so both paths decode identically.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use super::eol::{EolType, detect_eol};
use super::identity::FileIdentity;
use crate::document::{Document, DocumentOptions};
use crate::encoding::{Decoder, DetectionConfig, Encoding, detect_encoding};
use crate::error::{FsError, FsResult};
use crate::worker::{Completion, JobKind, Worker, WorkerControl, WorkerId};

/// Configuration for file loading operations
#[derive(Debug, Clone)]
pub struct FileLoadConfig {
    /// Bytes read per chunk (default: 128KB)
    pub chunk_size: usize,
    /// Sleep between chunks
    pub sleep: Duration,
    /// Creation options for the new document
    pub options: DocumentOptions,
    /// Encoding forced by the caller, skipping detection
    pub declared: Option<Encoding>,
    /// Encoding assumed for empty and pure-ASCII files
    pub default_encoding: Encoding,
    /// Encoding detection configuration
    pub detection: DetectionConfig,
}

impl Default for FileLoadConfig {
    fn default() -> Self {
        FileLoadConfig {
            chunk_size: 128 * 1024,
            sleep: Duration::ZERO,
            options: DocumentOptions::default(),
            declared: None,
            default_encoding: Encoding::Utf8,
            detection: DetectionConfig::default(),
        }
    }
}

/// Result of a completed load.
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    /// Decoded text; undo collection is on and the undo log empty.
    pub document: Document,
    /// Final encoding, after any BOM override.
    pub encoding: Encoding,
    pub eol: EolType,
    pub bytes_read: u64,
    /// Content looked like binary data.
    pub binary: bool,
    /// Malformed sequences replaced with U+FFFD.
    pub substitutions: usize,
    /// Identity at open time, used as the modification stamp.
    pub identity: Option<FileIdentity>,
}

impl LoadedFile {
    /// Non-fatal decoding problem worth telling the user about.
    pub fn warning(&self) -> Option<FsError> {
        (self.substitutions > 0)
            .then_some(FsError::EncodingAmbiguous { substitutions: self.substitutions })
    }
}

/// Entry points for loading a file into a new document.
pub struct FileLoader;

impl FileLoader {
    /// Load on a background thread. `completions` receives one message when done.
    pub fn spawn(
        id: WorkerId,
        path: PathBuf,
        config: FileLoadConfig,
        completions: Sender<Completion>,
    ) -> FsResult<Worker<LoadedFile>> {
        let sleep = config.sleep;
        let target = path.clone();
        Worker::spawn(id, JobKind::Load, path, sleep, completions, move |ctl| {
            load_with_control(&target, &config, ctl)
        })
    }

    /// Load on the calling thread.
    pub fn load_blocking(path: &Path, config: &FileLoadConfig) -> FsResult<LoadedFile> {
        load_with_control(path, config, &WorkerControl::detached())
    }
}

fn load_with_control(
    path: &Path,
    config: &FileLoadConfig,
    ctl: &WorkerControl,
) -> FsResult<LoadedFile> {
    let mut file = File::open(path).map_err(|e| FsError::open(path, e))?;
    let metadata = file.metadata().map_err(|e| FsError::read(path, e))?;
    let identity = FileIdentity::from_metadata(&metadata).ok();
    let size = metadata.len();
    ctl.set_total(size);

    let mut head = vec![0u8; config.detection.sample_size.max(1)];
    let head_len = read_full(&mut file, &mut head).map_err(|e| FsError::read(path, e))?;
    head.truncate(head_len);

    if head.is_empty() {
        debug!(path = %path.display(), "empty file");
        let encoding = config.declared.unwrap_or(config.default_encoding);
        return Ok(LoadedFile {
            path: path.to_path_buf(),
            document: Document::new(config.options),
            encoding,
            eol: EolType::default(),
            bytes_read: 0,
            binary: false,
            substitutions: 0,
            identity,
        });
    }

    let detected = detect_encoding(&head, config.default_encoding, &config.detection);
    let declared = config.declared.unwrap_or(detected.encoding);
    debug!(
        path = %path.display(),
        ?declared,
        confidence = ?detected.confidence,
        binary = detected.binary,
        "decoding"
    );

    let capacity = usize::try_from(size).unwrap_or(usize::MAX);
    let mut document = Document::with_capacity(config.options, capacity);
    document.set_undo_collection(false);

    let mut stream = Stream {
        decoder: Decoder::new(declared),
        document,
        text: String::new(),
        bytes_read: 0,
    };

    // The head sample is decoded in chunk-sized pieces like the rest.
    let chunk_size = config.chunk_size.max(1);
    for chunk in head.chunks(chunk_size) {
        stream.push(chunk, ctl)?;
    }
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = read_some(&mut file, &mut buf).map_err(|e| FsError::read(path, e))?;
        if n == 0 {
            break;
        }
        stream.push(&buf[..n], ctl)?;
    }

    let Stream { mut decoder, mut document, mut text, bytes_read } = stream;
    decoder.finish(&mut text);
    document.append(&text);
    document.set_undo_collection(true);

    let eol = detect_eol(document.text());
    let loaded = LoadedFile {
        path: path.to_path_buf(),
        document,
        encoding: decoder.encoding(),
        eol,
        bytes_read,
        binary: detected.binary,
        substitutions: decoder.substitutions(),
        identity,
    };
    if let Some(warning) = loaded.warning() {
        warn!(path = %path.display(), %warning, "lossy decode");
    }
    Ok(loaded)
}

struct Stream {
    decoder: Decoder,
    document: Document,
    text: String,
    bytes_read: u64,
}

impl Stream {
    fn push(&mut self, chunk: &[u8], ctl: &WorkerControl) -> FsResult<()> {
        ctl.checkpoint()?;
        self.decoder.decode_to(chunk, &mut self.text);
        self.document.append(&self.text);
        self.text.clear();
        self.bytes_read += chunk.len() as u64;
        ctl.report(self.bytes_read);
        ctl.pause();
        Ok(())
    }
}

fn read_some(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Fill `buf` as far as the file allows.
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = read_some(file, &mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{Outcome, WorkerState};
    use crossbeam_channel::unbounded;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn load(bytes: &[u8], config: &FileLoadConfig) -> LoadedFile {
        let file = temp_with(bytes);
        FileLoader::load_blocking(file.path(), config).unwrap()
    }

    #[test]
    fn test_load_utf8_file() {
        let result = load("Hello, UTF-8!\nSecond l\u{ee}ne".as_bytes(), &FileLoadConfig::default());
        assert_eq!(result.document.text(), "Hello, UTF-8!\nSecond l\u{ee}ne");
        assert_eq!(result.encoding, Encoding::Utf8);
        assert_eq!(result.eol, EolType::Lf);
        assert!(!result.binary);
        assert!(result.document.is_collecting_undo());
        assert!(!result.document.can_undo());
    }

    #[test]
    fn test_load_utf8_with_bom() {
        let mut content = vec![0xEF, 0xBB, 0xBF];
        content.extend_from_slice(b"Hello with BOM!");
        let result = load(&content, &FileLoadConfig::default());
        assert_eq!(result.document.text(), "Hello with BOM!");
        assert_eq!(result.encoding, Encoding::Utf8Bom);
        assert_eq!(result.bytes_read, content.len() as u64);
    }

    #[test]
    fn test_load_utf16le_small_chunks() {
        let mut content = vec![0xFF, 0xFE];
        for unit in "h\u{e9}llo \u{1f600}".encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }
        let config = FileLoadConfig { chunk_size: 3, ..Default::default() };
        let result = load(&content, &config);
        assert_eq!(result.document.text(), "h\u{e9}llo \u{1f600}");
        assert_eq!(result.encoding, Encoding::Utf16Le);
    }

    #[test]
    fn test_chunk_size_does_not_change_text() {
        let text = "caf\u{e9}\r\n\u{4e16}\u{754c}\r\n".repeat(50);
        let whole = load(text.as_bytes(), &FileLoadConfig::default());
        let tiny = load(text.as_bytes(), &FileLoadConfig { chunk_size: 1, ..Default::default() });
        assert_eq!(whole.document.text(), tiny.document.text());
        assert_eq!(tiny.eol, EolType::Crlf);
    }

    #[test]
    fn test_empty_file_uses_default_encoding() {
        let config = FileLoadConfig { default_encoding: Encoding::EightBit, ..Default::default() };
        let result = load(b"", &config);
        assert!(result.document.is_empty());
        assert_eq!(result.encoding, Encoding::EightBit);
        assert_eq!(result.bytes_read, 0);
    }

    #[test]
    fn test_eight_bit_and_declared() {
        let result = load(&[b'c', b'a', b'f', 0xE9], &FileLoadConfig::default());
        assert_eq!(result.encoding, Encoding::EightBit);
        assert_eq!(result.document.text(), "caf\u{e9}");

        let forced = FileLoadConfig { declared: Some(Encoding::Utf8), ..Default::default() };
        let result = load(&[b'c', b'a', b'f', 0xE9], &forced);
        assert_eq!(result.document.text(), "caf\u{fffd}");
        assert!(matches!(result.warning(), Some(FsError::EncodingAmbiguous { substitutions: 1 })));
    }

    #[test]
    fn test_binary_content_flagged() {
        let result = load(&[0u8; 1024], &FileLoadConfig::default());
        assert!(result.binary);
    }

    #[test]
    fn test_missing_file_is_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileLoader::load_blocking(&dir.path().join("nope.txt"), &FileLoadConfig::default())
            .unwrap_err();
        assert!(matches!(err, FsError::OpenFailure { .. }));
    }

    #[test]
    fn test_background_load_reports_progress() {
        let file = temp_with(&vec![b'x'; 10_000]);
        let (tx, rx) = unbounded();
        let config = FileLoadConfig { chunk_size: 1000, ..Default::default() };
        let worker = FileLoader::spawn(WorkerId(7), file.path().to_path_buf(), config, tx).unwrap();

        let done = rx.recv().unwrap();
        assert_eq!(done.id, WorkerId(7));
        assert_eq!(done.state, WorkerState::Completed);
        assert_eq!(worker.progress().done, 10_000);
        match worker.wait() {
            Outcome::Completed(loaded) => assert_eq!(loaded.document.len(), 10_000),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_background_load_cancelled() {
        let file = temp_with(&vec![b'y'; 64 * 1024]);
        let (tx, rx) = unbounded();
        let config = FileLoadConfig {
            chunk_size: 16,
            sleep: Duration::from_millis(5),
            ..Default::default()
        };
        let worker = FileLoader::spawn(WorkerId(8), file.path().to_path_buf(), config, tx).unwrap();
        worker.cancel();

        assert_eq!(rx.recv().unwrap().state, WorkerState::Cancelled);
        assert!(matches!(worker.wait(), Outcome::Cancelled));
    }
}
