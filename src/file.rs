//! Crash-safe file conversion.
//!
//! Converted bytes go to a temporary sibling of the destination, are synced,
//! then renamed over it, so readers see either the old content or the new,
//! never a mix. In-place rewrites snapshot the original first.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::FileProcessOptions;
use crate::convert::{ConversionOutcome, Converter};
use crate::detection::{DetectionResult, Detector};
use crate::{Encoding, Error, FileOp, Result};

/// Report from [`FileProcessor::process_file`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileProcessResult {
    /// File that was read
    pub input_path: PathBuf,
    /// File that was (or in a dry run, would be) written
    pub output_path: PathBuf,
    /// Snapshot of the original, for in-place rewrites with backups enabled
    pub backup_path: Option<PathBuf>,
    /// Detected encoding of the input
    pub source_encoding: Encoding,
    /// Encoding of the output
    pub target_encoding: Encoding,
    /// Detection confidence; 1.0 for an empty input or a given source
    pub confidence: f64,
    /// Input bytes read; zero in a dry run
    pub bytes_read: u64,
    /// Bytes written to the destination; zero in a dry run
    pub bytes_written: u64,
    /// Wall time for the whole call
    pub processing_time: Duration,
    /// Whether nothing was written
    pub dry_run: bool,
    /// Substitutions made during conversion
    pub error_count: usize,
    /// Whether the bytes were transformed rather than copied verbatim
    pub converted: bool,
}

/// Converts files on disk.
///
/// Clones share the registry of in-flight destinations, so two calls
/// targeting the same path never race: the second fails with
/// [`Error::Locked`].
#[derive(Debug, Clone)]
pub struct FileProcessor {
    detector: Arc<Detector>,
    converter: Converter,
    max_file_size: u64,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FileProcessor {
    /// Create a file processor. A `max_file_size` of zero disables the limit.
    pub fn new(detector: Arc<Detector>, converter: Converter, max_file_size: u64) -> Self {
        Self {
            detector,
            converter,
            max_file_size,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Detect the encoding of `input` and write it to `output` in
    /// `options.target_encoding`.
    ///
    /// When `output` is `input`, the original is backed up first (if enabled)
    /// and overwriting is implied.
    pub fn process_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        options: &FileProcessOptions,
    ) -> Result<FileProcessResult> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let start = Instant::now();
        let _guard = PathGuard::acquire(&self.in_flight, output)?;

        let metadata = self.stat(input)?;
        let in_place = same_path(input, output);
        if !in_place && !options.overwrite_existing {
            let exists = output
                .try_exists()
                .map_err(|err| Error::io(FileOp::OverwriteCheck, output, err))?;
            if exists {
                return Err(Error::file(
                    FileOp::OverwriteCheck,
                    output,
                    "destination exists and overwriting is disabled",
                ));
            }
        }

        if options.dry_run {
            return self.dry_run(input, output, &metadata, options, start);
        }

        let data = fs::read(input).map_err(|err| Error::io(FileOp::Read, input, err))?;
        let (source, confidence) = match options.source_encoding {
            Some(source) => (source, 1.0),
            None if data.is_empty() => (options.target_encoding, 1.0),
            None => {
                let detected = self.detector.detect(&data).map_err(|err| err.with_path(input))?;
                check_confidence(&detected, options.min_confidence, input)?;
                (detected.encoding, detected.confidence)
            }
        };

        let outcome = self
            .converter
            .convert_detailed(&data, source, options.target_encoding)?;

        let backup_path = if in_place && options.create_backup {
            Some(backup(input, &options.backup_suffix)?)
        } else {
            None
        };

        write_atomic(output, &outcome.output, &metadata, options, backup_path.as_deref())?;

        let result = FileProcessResult {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            backup_path,
            source_encoding: source,
            target_encoding: options.target_encoding,
            confidence,
            bytes_read: data.len() as u64,
            bytes_written: outcome.output.len() as u64,
            processing_time: start.elapsed(),
            dry_run: false,
            error_count: outcome.error_count,
            converted: source != options.target_encoding,
        };
        info!(
            input = %input.display(),
            output = %output.display(),
            source = %source,
            target = %options.target_encoding,
            confidence,
            bytes_read = result.bytes_read,
            bytes_written = result.bytes_written,
            elapsed_micros = result.processing_time.as_micros() as u64,
            "file_processed"
        );
        Ok(result)
    }

    /// Rewrite `path` in place.
    pub fn process_file_in_place(
        &self,
        path: impl AsRef<Path>,
        options: &FileProcessOptions,
    ) -> Result<FileProcessResult> {
        let path = path.as_ref();
        self.process_file(path, path, options)
    }

    /// Read, detect, and convert `input` to `target` without writing anything.
    pub fn process_file_to_bytes(
        &self,
        input: impl AsRef<Path>,
        target: Encoding,
    ) -> Result<ConversionOutcome> {
        let input = input.as_ref();
        let (source, data) = self.read_detected(input, target)?;
        self.converter.convert_detailed(&data, source, target)
    }

    /// Read and decode `input` to a `String`.
    pub fn process_file_to_string(&self, input: impl AsRef<Path>) -> Result<String> {
        let input = input.as_ref();
        let (source, data) = self.read_detected(input, Encoding::UTF8)?;
        self.converter.decode_to_string(&data, source)
    }

    fn stat(&self, input: &Path) -> Result<Metadata> {
        let metadata = fs::metadata(input).map_err(|err| Error::io(FileOp::Stat, input, err))?;
        if !metadata.is_file() {
            return Err(Error::file(FileOp::Stat, input, "not a regular file"));
        }
        if self.max_file_size > 0 && metadata.len() > self.max_file_size {
            return Err(Error::file(
                FileOp::SizeCheck,
                input,
                format!(
                    "file is {} bytes, limit is {} bytes",
                    metadata.len(),
                    self.max_file_size
                ),
            ));
        }
        Ok(metadata)
    }

    /// Stat, read, and detect. An empty file is taken to be in `fallback`.
    fn read_detected(&self, input: &Path, fallback: Encoding) -> Result<(Encoding, Vec<u8>)> {
        self.stat(input)?;
        let data = fs::read(input).map_err(|err| Error::io(FileOp::Read, input, err))?;
        if data.is_empty() {
            return Ok((fallback, data));
        }
        let detected = self.detector.detect(&data).map_err(|err| err.with_path(input))?;
        Ok((detected.encoding, data))
    }

    fn dry_run(
        &self,
        input: &Path,
        output: &Path,
        metadata: &Metadata,
        options: &FileProcessOptions,
        start: Instant,
    ) -> Result<FileProcessResult> {
        let (source, confidence) = match options.source_encoding {
            Some(source) => (source, 1.0),
            None if metadata.len() == 0 => (options.target_encoding, 1.0),
            None => {
                let detected = self.detector.detect_file(input)?;
                check_confidence(&detected, options.min_confidence, input)?;
                (detected.encoding, detected.confidence)
            }
        };
        debug!(input = %input.display(), source = %source, confidence, "dry_run");

        Ok(FileProcessResult {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            backup_path: None,
            source_encoding: source,
            target_encoding: options.target_encoding,
            confidence,
            bytes_read: 0,
            bytes_written: 0,
            processing_time: start.elapsed(),
            dry_run: true,
            error_count: 0,
            converted: source != options.target_encoding,
        })
    }
}

/// Registration of a destination in the in-flight set, released on drop.
struct PathGuard {
    registry: Arc<Mutex<HashSet<PathBuf>>>,
    key: PathBuf,
}

impl PathGuard {
    fn acquire(registry: &Arc<Mutex<HashSet<PathBuf>>>, path: &Path) -> Result<Self> {
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        if !registry.lock().insert(key.clone()) {
            return Err(Error::Locked {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            registry: Arc::clone(registry),
            key,
        })
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

fn check_confidence(detected: &DetectionResult, min_confidence: f64, input: &Path) -> Result<()> {
    if detected.confidence < min_confidence {
        return Err(Error::DetectionFailed {
            reason: format!(
                "{} detected with confidence {:.2}, below the required {:.2}",
                detected.encoding, detected.confidence, min_confidence
            ),
            path: Some(input.to_path_buf()),
        });
    }
    Ok(())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Copy `input` to `<input><suffix>`, or to a timestamped name when that exists.
fn backup(input: &Path, suffix: &str) -> Result<PathBuf> {
    let mut path = with_suffix(input, suffix);
    if path.exists() {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        path = with_suffix(input, &format!(".{millis}{suffix}"));
        let mut n = 1;
        while path.exists() {
            path = with_suffix(input, &format!(".{millis}.{n}{suffix}"));
            n += 1;
        }
    }

    fs::copy(input, &path).map_err(|err| Error::io(FileOp::CreateBackup, &path, err))?;
    debug!(backup = %path.display(), "backup_created");
    Ok(path)
}

fn write_atomic(
    output: &Path,
    bytes: &[u8],
    source_meta: &Metadata,
    options: &FileProcessOptions,
    backup: Option<&Path>,
) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|err| Error::io(FileOp::CreateDir, dir, err))?;

    let name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| Error::io(FileOp::CreateTemp, dir, err))?;

    temp.write_all(bytes)
        .map_err(|err| Error::io(FileOp::WriteTemp, temp.path(), err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| Error::io(FileOp::Sync, temp.path(), err))?;
    let permissions = if options.preserve_mode {
        Some(source_meta.permissions())
    } else {
        default_permissions()
    };
    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|err| Error::io(FileOp::Chmod, temp.path(), err))?;
    }

    if let Err(err) = temp.persist(output) {
        // Dropping the handle deletes the temp file.
        drop(err.file);
        let restore = match backup {
            Some(backup) => match fs::copy(backup, output) {
                Ok(_) => format!("original restored from {}", backup.display()),
                Err(restore_err) => {
                    format!("restore from {} also failed: {restore_err}", backup.display())
                }
            },
            None => "no backup to restore".to_string(),
        };
        warn!(output = %output.display(), error = %err.error, restore = %restore, "rename_failure");
        return Err(Error::FileIo {
            op: FileOp::Rename,
            path: output.to_path_buf(),
            reason: format!("rename failed: {}; {restore}", err.error),
            source: Some(err.error),
        });
    }

    if options.preserve_time {
        // The owner may set times through a read-only handle, which keeps
        // this working when the preserved mode has no write bit.
        let applied = source_meta
            .modified()
            .and_then(|modified| File::open(output).and_then(|file| file.set_modified(modified)));
        if let Err(err) = applied {
            warn!(output = %output.display(), error = %err, "preserve_time_failure");
        }
    }
    Ok(())
}

/// Mode for a fresh output when the source mode is not carried over.
/// Temp files start owner-only.
#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
