//! Configuration values for detection, conversion, file processing, and streaming.
//!
//! Every struct is plain data: construct it (or start from a preset), adjust
//! fields, and hand it to [`Processor::new`](crate::Processor::new). All of
//! them deserialize with `#[serde(default)]`, so a partial JSON/TOML document
//! only needs the fields it overrides.
//!
//! ```rust
//! use encoding_processor::ProcessorConfig;
//!
//! let config = ProcessorConfig::for_cli();
//! assert!(!config.detector.enable_cache);
//! config.validate().unwrap();
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Encoding, Error, Result};

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Detection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Bytes of input examined for detection.
    pub sample_size: usize,
    /// Minimum confidence a result needs to be accepted.
    pub min_confidence: f64,
    /// Encodings the statistical tier may answer with. Empty means the
    /// whole catalog. BOM and UTF-8 validation results are not filtered.
    pub supported_encodings: Vec<Encoding>,
    /// Memoize detection results by content hash.
    pub enable_cache: bool,
    /// Maximum number of cached results.
    pub cache_size: usize,
    /// Age after which a cached result is ignored.
    #[serde(with = "crate::serde_millis")]
    pub cache_ttl: Duration,
    /// Tie-break override list; the first qualifying member wins.
    pub preferred_encodings: Vec<Encoding>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_size: 8 * KIB,
            min_confidence: 0.8,
            supported_encodings: vec![
                Encoding::UTF8,
                Encoding::UTF16LE,
                Encoding::UTF16BE,
                Encoding::UTF32LE,
                Encoding::UTF32BE,
                Encoding::GBK,
                Encoding::GB18030,
                Encoding::BIG5,
                Encoding::SHIFT_JIS,
                Encoding::EUC_JP,
                Encoding::EUC_KR,
                Encoding::ISO_8859_1,
                Encoding::WINDOWS_1252,
            ],
            enable_cache: true,
            cache_size: 1000,
            cache_ttl: Duration::from_secs(3600),
            preferred_encodings: vec![Encoding::UTF8, Encoding::GBK, Encoding::BIG5],
        }
    }
}

impl DetectorConfig {
    /// Set the detection sample size.
    pub fn with_sample_size(mut self, bytes: usize) -> Self {
        self.sample_size = bytes;
        self
    }

    /// Set the acceptance threshold.
    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Replace the preferred encodings list.
    pub fn with_preferred(mut self, preferred: Vec<Encoding>) -> Self {
        self.preferred_encodings = preferred;
        self
    }

    /// Disable memoization.
    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }

    /// Whether the statistical tier may return `encoding`.
    pub fn allows(&self, encoding: Encoding) -> bool {
        self.supported_encodings.is_empty() || self.supported_encodings.contains(&encoding)
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(Error::InvalidConfiguration(
                "sample_size must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfiguration(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.enable_cache {
            if self.cache_size == 0 {
                return Err(Error::InvalidConfiguration(
                    "cache_size must be greater than zero when the cache is enabled".into(),
                ));
            }
            if self.cache_ttl.is_zero() {
                return Err(Error::InvalidConfiguration(
                    "cache_ttl must be non-zero when the cache is enabled".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Conversion policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Fail on the first undecodable or unmappable sequence.
    pub strict_mode: bool,
    /// Marker substituted for each offending unit in lenient mode.
    pub invalid_char_replacement: String,
    /// I/O buffer size for streaming work.
    pub buffer_size: usize,
    /// Largest payload accepted for in-memory conversion. 0 = unlimited.
    pub max_memory_usage: usize,
    /// Inputs larger than this are converted chunk by chunk.
    pub chunk_size: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            invalid_char_replacement: "?".to_string(),
            buffer_size: 8 * KIB,
            max_memory_usage: 0,
            chunk_size: MIB,
        }
    }
}

impl ConverterConfig {
    /// Switch to fail-fast mode.
    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Set the chunk threshold.
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the lenient-mode replacement marker.
    pub fn with_replacement(mut self, marker: impl Into<String>) -> Self {
        self.invalid_char_replacement = marker.into();
        self
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfiguration(
                "buffer_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for a [`Processor`](crate::Processor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Detection policy
    pub detector: DetectorConfig,
    /// Conversion policy
    pub converter: ConverterConfig,
    /// Attach a [`MetricsCollector`](crate::MetricsCollector) observer.
    pub enable_metrics: bool,
    /// Largest file accepted by file operations. 0 = unlimited.
    pub max_file_size: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            converter: ConverterConfig::default(),
            enable_metrics: false,
            max_file_size: 100 * MIB as u64,
        }
    }
}

impl ProcessorConfig {
    /// Interactive command-line use: larger samples, a lower threshold, no cache.
    pub fn for_cli() -> Self {
        let mut config = Self::default();
        config.detector.sample_size = 16 * KIB;
        config.detector.min_confidence = 0.7;
        config.detector.enable_cache = false;
        config.converter.buffer_size = 32 * KIB;
        config
    }

    /// Many small request bodies: small samples, a large cache.
    pub fn for_web_service() -> Self {
        let mut config = Self::default();
        config.detector.sample_size = 4 * KIB;
        config.detector.cache_size = 5000;
        config.enable_metrics = true;
        config
    }

    /// Large numbers of files: big buffers and chunks.
    pub fn for_batch_processing() -> Self {
        let mut config = Self::default();
        config.detector.sample_size = 32 * KIB;
        config.detector.cache_size = 10_000;
        config.converter.buffer_size = 64 * KIB;
        config.converter.chunk_size = 2 * MIB;
        config.enable_metrics = true;
        config
    }

    /// Throughput over memory.
    pub fn high_performance() -> Self {
        let mut config = Self::default();
        config.detector.sample_size = 64 * KIB;
        config.detector.cache_size = 20_000;
        config.converter.buffer_size = 128 * KIB;
        config.converter.chunk_size = 4 * MIB;
        config.converter.max_memory_usage = 100 * MIB;
        config.max_file_size = 1024 * MIB as u64;
        config
    }

    /// Memory over throughput.
    pub fn memory_efficient() -> Self {
        let mut config = Self::default();
        config.detector.sample_size = 2 * KIB;
        config.detector.enable_cache = false;
        config.converter.buffer_size = 4 * KIB;
        config.converter.chunk_size = 256 * KIB;
        config.converter.max_memory_usage = 10 * MIB;
        config.max_file_size = 50 * MIB as u64;
        config
    }

    /// High threshold and fail-fast conversion.
    pub fn strict() -> Self {
        let mut config = Self::default();
        config.detector.min_confidence = 0.9;
        config.converter.strict_mode = true;
        config
    }

    /// Low threshold and substitute-and-continue conversion.
    pub fn tolerant() -> Self {
        let mut config = Self::default();
        config.detector.min_confidence = 0.5;
        config.converter.strict_mode = false;
        config.converter.invalid_char_replacement = "?".to_string();
        config
    }

    /// Check every nested section.
    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.converter.validate()
    }
}

/// Options for one [`FileProcessor::process_file`](crate::FileProcessor::process_file) call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProcessOptions {
    /// Read the input as this encoding instead of detecting it.
    pub source_encoding: Option<Encoding>,
    /// Encoding the output is written in.
    pub target_encoding: Encoding,
    /// Detected confidence below this aborts the call.
    pub min_confidence: f64,
    /// Snapshot the original before an in-place rewrite.
    pub create_backup: bool,
    /// Appended to the input path to form the backup path.
    pub backup_suffix: String,
    /// Allow replacing an existing output file.
    pub overwrite_existing: bool,
    /// Copy the input's permission bits onto the output.
    pub preserve_mode: bool,
    /// Reapply the input's modification time after the rename.
    pub preserve_time: bool,
    /// Detect and report without writing anything.
    pub dry_run: bool,
}

impl Default for FileProcessOptions {
    fn default() -> Self {
        Self {
            source_encoding: None,
            target_encoding: Encoding::UTF8,
            min_confidence: 0.8,
            create_backup: true,
            backup_suffix: ".bak".to_string(),
            overwrite_existing: false,
            preserve_mode: true,
            preserve_time: true,
            dry_run: false,
        }
    }
}

impl FileProcessOptions {
    /// Options targeting `encoding` with every other field at its default.
    pub fn to_encoding(encoding: Encoding) -> Self {
        Self {
            target_encoding: encoding,
            ..Self::default()
        }
    }
}

/// Options for [`StreamProcessor::process_reader_writer`](crate::StreamProcessor::process_reader_writer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// `None` detects from a lookahead sample.
    pub source_encoding: Option<Encoding>,
    /// Encoding written to the sink.
    pub target_encoding: Encoding,
    /// Bytes read from the source per iteration.
    pub buffer_size: usize,
    /// Bytes buffered for detection when the source encoding is unknown.
    /// Detection examines all of them, even beyond the detector's own
    /// `sample_size`.
    pub detection_sample_size: usize,
    /// Drop a leading BOM of the resolved source encoding.
    pub skip_bom: bool,
    /// Fail on the first undecodable or unmappable sequence.
    pub strict_mode: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            source_encoding: None,
            target_encoding: Encoding::UTF8,
            buffer_size: 8 * KIB,
            detection_sample_size: 8 * KIB,
            skip_bom: false,
            strict_mode: false,
        }
    }
}
