//! Error types for detection, conversion, file mutation, and streaming.
//!
//! Every failure surfaces as one [`Error`] value carrying the context that
//! produced it (operation, encoding labels, byte offset, path). Callers that
//! only care about the category match on [`Error::kind`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The public operation an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Encoding detection
    Detect,
    /// Byte-buffer conversion
    Convert,
    /// Safe file processing
    ProcessFile,
    /// Encoding validation
    Validate,
    /// Streaming transcoding
    Stream,
}

impl Operation {
    /// Stable lowercase name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Detect => "detect",
            Operation::Convert => "convert",
            Operation::ProcessFile => "process_file",
            Operation::Validate => "validate",
            Operation::Stream => "stream",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem step carried by [`Error::FileIo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum FileOp {
    Stat,
    SizeCheck,
    OverwriteCheck,
    Read,
    CreateDir,
    CreateBackup,
    CreateTemp,
    WriteTemp,
    Sync,
    Chmod,
    Rename,
    Lock,
}

impl FileOp {
    /// Stable lowercase name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            FileOp::Stat => "stat",
            FileOp::SizeCheck => "size_check",
            FileOp::OverwriteCheck => "overwrite_check",
            FileOp::Read => "read",
            FileOp::CreateDir => "create_dir",
            FileOp::CreateBackup => "create_backup",
            FileOp::CreateTemp => "create_temp",
            FileOp::WriteTemp => "write_temp",
            FileOp::Sync => "sync",
            FileOp::Chmod => "chmod",
            FileOp::Rename => "rename",
            FileOp::Lock => "lock",
        }
    }
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error category, for exhaustive matching without destructuring context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty or malformed call arguments
    InvalidInput,
    /// No candidate cleared the confidence threshold, or the oracle failed
    DetectionFailed,
    /// Label outside the catalog or outside the configured allow-list
    UnsupportedEncoding,
    /// Strict-mode transform failure
    ConversionFailed,
    /// Filesystem operation failure
    FileIo,
    /// Payload exceeds the configured memory ceiling
    InsufficientMemory,
    /// Another call is already mutating the same destination path
    Locked,
    /// Stream processing was cancelled between chunks
    Cancelled,
    /// Reader or writer failure during streaming
    StreamIo,
    /// Configuration values out of range
    InvalidConfiguration,
}

/// Errors returned by every public operation in this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Empty or malformed input.
    #[error("{op}: invalid input: {reason}")]
    InvalidInput {
        /// Operation that rejected the input
        op: Operation,
        /// What was wrong
        reason: String,
    },

    /// Detection could not produce an acceptable answer.
    #[error("encoding detection failed{}: {reason}", .path.as_ref().map(|p| format!(" for {}", p.display())).unwrap_or_default())]
    DetectionFailed {
        /// Why detection gave up
        reason: String,
        /// File being detected, when detection came from a path
        path: Option<PathBuf>,
    },

    /// The label is not part of the catalog, or not in the allow-list.
    #[error("{op}: unsupported encoding '{label}'")]
    UnsupportedEncoding {
        /// Label as received
        label: String,
        /// Operation that rejected it
        op: Operation,
    },

    /// A transform failed in strict mode.
    #[error("conversion {from} -> {to} failed at byte {offset}: {reason}")]
    ConversionFailed {
        /// Source encoding name
        from: &'static str,
        /// Target encoding name
        to: &'static str,
        /// Absolute byte offset of the offending input sequence
        offset: u64,
        /// What went wrong
        reason: String,
    },

    /// A filesystem step failed.
    #[error("file {op} failed for {}: {reason}", .path.display())]
    FileIo {
        /// Step that failed
        op: FileOp,
        /// Path the step operated on
        path: PathBuf,
        /// Human-readable description, including any recovery outcome
        reason: String,
        /// Underlying I/O error
        #[source]
        source: Option<io::Error>,
    },

    /// The payload is larger than the configured memory ceiling.
    #[error("payload of {requested} bytes exceeds memory limit of {limit} bytes")]
    InsufficientMemory {
        /// Bytes the operation would need
        requested: u64,
        /// Configured ceiling
        limit: u64,
    },

    /// The destination is already being processed by another call.
    #[error("{} is locked by another in-flight operation", .path.display())]
    Locked {
        /// Contended destination path
        path: PathBuf,
    },

    /// Streaming stopped because the cancellation token fired.
    #[error("stream cancelled after reading {bytes_read} bytes and writing {bytes_written} bytes")]
    Cancelled {
        /// Bytes consumed from the source so far
        bytes_read: u64,
        /// Bytes flushed to the sink so far
        bytes_written: u64,
    },

    /// The reader or writer failed mid-stream.
    #[error("stream {op} failed: {source}")]
    StreamIo {
        /// `read`, `write`, or `flush`
        op: &'static str,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration rejected by `validate()`.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput { .. } => ErrorKind::InvalidInput,
            Error::DetectionFailed { .. } => ErrorKind::DetectionFailed,
            Error::UnsupportedEncoding { .. } => ErrorKind::UnsupportedEncoding,
            Error::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Error::FileIo { .. } => ErrorKind::FileIo,
            Error::InsufficientMemory { .. } => ErrorKind::InsufficientMemory,
            Error::Locked { .. } => ErrorKind::Locked,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::StreamIo { .. } => ErrorKind::StreamIo,
            Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
        }
    }

    pub(crate) fn invalid_input(op: Operation, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn detection_failed(reason: impl Into<String>) -> Self {
        Error::DetectionFailed {
            reason: reason.into(),
            path: None,
        }
    }

    pub(crate) fn io(op: FileOp, path: &Path, source: io::Error) -> Self {
        Error::FileIo {
            op,
            path: path.to_path_buf(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn file(op: FileOp, path: &Path, reason: impl Into<String>) -> Self {
        Error::FileIo {
            op,
            path: path.to_path_buf(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Attach a path to a detection failure; other errors pass through.
    pub(crate) fn with_path(self, path: &Path) -> Self {
        match self {
            Error::DetectionFailed { reason, path: None } => Error::DetectionFailed {
                reason,
                path: Some(path.to_path_buf()),
            },
            other => other,
        }
    }
}
