//! # niv_fs - Filesystem layer for niv editor
//!
//! Streaming encoding codec, cancellable background workers and the file
//! loader/storer built on them.
//!
//! Modules:
//! - `bom` for BOM detection (UTF-8/16)
//! - `encoding` for detection and the streaming [`Decoder`]/[`Encoder`]
//! - `worker` for thread-per-operation background work
//! - `file` for file loading/saving operations

pub mod bom;
pub mod document;
pub mod encoding;
pub mod error;
pub mod file;
pub mod worker;

pub use bom::{BomDetectionResult, detect_bom};
pub use document::{Document, DocumentOptions};
pub use encoding::codec::{decode_all, encode_all};
pub use encoding::{
    Decoder, DetectionConfidence, DetectionConfig, Encoder, Encoding, EncodingDetectionResult,
    UnknownEncoding, detect_encoding,
};
pub use error::{FsError, FsResult};
pub use file::{
    EolType, FileIdentity, FileLoadConfig, FileLoader, FileSaveConfig, FileSinkFactory,
    FileStorer, LoadedFile, SaveSink, SavedFile, SinkFactory,
};
pub use worker::{Completion, JobKind, Outcome, Progress, Worker, WorkerControl, WorkerId, WorkerState};
