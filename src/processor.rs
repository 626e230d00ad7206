//! Top-level facade tying detection, conversion, files, and streams together.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{Level, info, warn};

use crate::config::{FileProcessOptions, ProcessorConfig, StreamOptions};
use crate::convert::{ConversionOutcome, Converter};
use crate::detection::{CacheStats, CharsetOracle, ChardetngOracle, DetectionResult, Detector};
use crate::file::{FileProcessResult, FileProcessor};
use crate::observe::{MetricsCollector, Observer, TracingObserver};
use crate::stream::{
    CancellationToken, StreamProcessor, StreamResult, TranscodingReader, TranscodingWriter,
};
use crate::{Encoding, Operation, Result};

/// Detects, converts, and rewrites encoded data under one configuration.
///
/// Every public operation runs inside an `encoding.*` tracing span and
/// notifies the attached [`Observer`]s. The processor is `Send + Sync` and
/// can be shared behind an `Arc`.
///
/// ```rust
/// use encoding_processor::{Encoding, Processor, ProcessorConfig};
///
/// let processor = Processor::new(ProcessorConfig::default()).unwrap();
/// let outcome = processor.smart_convert("naïve".as_bytes(), Encoding::ISO_8859_1).unwrap();
/// assert_eq!(outcome.source_encoding, Encoding::UTF8);
/// assert_eq!(outcome.output, b"na\xEFve");
/// ```
pub struct Processor {
    config: ProcessorConfig,
    detector: Arc<Detector>,
    converter: Converter,
    files: FileProcessor,
    streams: StreamProcessor,
    observers: Vec<Arc<dyn Observer>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("config", &self.config)
            .field("detector", &self.detector)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Processor {
    /// Create a processor using [`ChardetngOracle`] for statistical detection.
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        Self::with_oracle(config, Arc::new(ChardetngOracle::new()))
    }

    /// Create a processor with a custom statistical oracle.
    pub fn with_oracle(config: ProcessorConfig, oracle: Arc<dyn CharsetOracle>) -> Result<Self> {
        config.validate()?;
        let detector = Arc::new(Detector::with_oracle(config.detector.clone(), oracle)?);
        let converter = Converter::new(config.converter.clone());
        let files = FileProcessor::new(
            Arc::clone(&detector),
            converter.clone(),
            config.max_file_size,
        );
        let streams = StreamProcessor::new(Arc::clone(&detector), &config.converter);

        let mut observers: Vec<Arc<dyn Observer>> = vec![Arc::new(TracingObserver)];
        let metrics = config.enable_metrics.then(|| Arc::new(MetricsCollector::new()));
        if let Some(metrics) = &metrics {
            observers.push(metrics.clone());
        }

        info!(
            sample_size = config.detector.sample_size,
            min_confidence = config.detector.min_confidence,
            strict = config.converter.strict_mode,
            metrics = config.enable_metrics,
            "processor_ready"
        );
        Ok(Self {
            config,
            detector,
            converter,
            files,
            streams,
            observers,
            metrics,
        })
    }

    /// Attach another observer.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The collector attached by `enable_metrics`.
    pub fn metrics(&self) -> Option<&MetricsCollector> {
        self.metrics.as_deref()
    }

    /// The active configuration.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Every encoding in the catalog.
    pub fn supported_encodings(&self) -> &'static [Encoding] {
        &Encoding::ALL
    }

    /// The detector shared by every component.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// The file processor, for callers that only rewrite files.
    pub fn file_processor(&self) -> &FileProcessor {
        &self.files
    }

    /// The stream processor, for callers that only stream.
    pub fn stream_processor(&self) -> &StreamProcessor {
        &self.streams
    }

    /// Detection cache counters; `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.detector.cache_stats()
    }

    /// Detect the encoding of `data`.
    pub fn detect(&self, data: &[u8]) -> Result<DetectionResult> {
        let span = tracing::span!(Level::INFO, "encoding.detect", bytes = data.len());
        let _guard = span.enter();

        self.run(Operation::Detect, || {
            let result = self.detector.detect(data)?;
            self.notify_detected(&result);
            Ok((result, data.len() as u64))
        })
    }

    /// Detect and return only the encoding.
    pub fn detect_best_encoding(&self, data: &[u8]) -> Result<Encoding> {
        self.detect(data).map(|result| result.encoding)
    }

    /// Detect the encoding of a file from its leading sample.
    pub fn detect_file(&self, path: impl AsRef<Path>) -> Result<DetectionResult> {
        let path = path.as_ref();
        let span = tracing::span!(Level::INFO, "encoding.detect", path = %path.display());
        let _guard = span.enter();

        self.run(Operation::Detect, || {
            let result = self.detector.detect_file(path)?;
            self.notify_detected(&result);
            Ok((result, 0))
        })
    }

    /// Convert `data` from `from` to `to`.
    pub fn convert(&self, data: &[u8], from: Encoding, to: Encoding) -> Result<Vec<u8>> {
        self.convert_detailed(data, from, to).map(|outcome| outcome.output)
    }

    /// Convert and report byte counts, timing, and substitutions.
    pub fn convert_detailed(
        &self,
        data: &[u8],
        from: Encoding,
        to: Encoding,
    ) -> Result<ConversionOutcome> {
        let span = tracing::span!(
            Level::INFO,
            "encoding.convert",
            from = %from,
            to = %to,
            bytes = data.len()
        );
        let _guard = span.enter();

        self.run(Operation::Convert, || {
            let outcome = self.converter.convert_detailed(data, from, to)?;
            if outcome.error_count > 0 {
                warn!(errors = outcome.error_count, "conversion_substituted");
            }
            Ok((outcome, data.len() as u64))
        })
    }

    /// Convert any supported encoding to UTF-8.
    pub fn convert_to_utf8(&self, data: &[u8], from: Encoding) -> Result<Vec<u8>> {
        self.convert(data, from, Encoding::UTF8)
    }

    /// Encode UTF-8 text into `to`.
    pub fn convert_string(&self, text: &str, to: Encoding) -> Result<Vec<u8>> {
        self.convert(text.as_bytes(), Encoding::UTF8, to)
    }

    /// Detect the source encoding, then convert to `to`.
    ///
    /// Equivalent to `convert(data, detect(data)?.encoding, to)`.
    pub fn smart_convert(&self, data: &[u8], to: Encoding) -> Result<ConversionOutcome> {
        let source = self.detect_best_encoding(data)?;
        self.convert_detailed(data, source, to)
    }

    /// Detect the source encoding and decode `data` to a `String`.
    pub fn smart_convert_string(&self, data: &[u8]) -> Result<String> {
        let source = self.detect_best_encoding(data)?;
        let span = tracing::span!(Level::INFO, "encoding.convert", from = %source, to = "UTF-8");
        let _guard = span.enter();

        self.run(Operation::Convert, || {
            let text = self.converter.decode_to_string(data, source)?;
            Ok((text, data.len() as u64))
        })
    }

    /// Whether `data` decodes under `encoding` without a malformed sequence.
    pub fn validate(&self, data: &[u8], encoding: Encoding) -> bool {
        let start = Instant::now();
        self.started(Operation::Validate);
        let valid = self.converter.validate(data, encoding);
        self.finished(Operation::Validate, data.len() as u64, start);
        valid
    }

    /// Convert `input` into `output`; see [`FileProcessor::process_file`].
    pub fn process_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        options: &FileProcessOptions,
    ) -> Result<FileProcessResult> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let span = tracing::span!(
            Level::INFO,
            "encoding.process_file",
            input = %input.display(),
            output = %output.display(),
            target = %options.target_encoding,
            dry_run = options.dry_run
        );
        let _guard = span.enter();

        self.run(Operation::ProcessFile, || {
            let result = self.files.process_file(input, output, options)?;
            let bytes = result.bytes_read;
            Ok((result, bytes))
        })
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

    /// Stream `reader` into `writer`; see
    /// [`StreamProcessor::process_reader_writer`].
    pub fn process_reader_writer<R: Read, W: Write>(
        &self,
        reader: R,
        writer: W,
        options: &StreamOptions,
        cancel: &CancellationToken,
    ) -> Result<StreamResult> {
        let span = tracing::span!(
            Level::INFO,
            "encoding.stream",
            source = ?options.source_encoding,
            target = %options.target_encoding
        );
        let _guard = span.enter();

        self.run(Operation::Stream, || {
            let result = self
                .streams
                .process_reader_writer(reader, writer, options, cancel)?;
            let bytes = result.bytes_read;
            Ok((result, bytes))
        })
    }

    /// Wrap `reader` so it yields `target`-encoded bytes.
    pub fn process_reader<R: Read>(
        &self,
        reader: R,
        source: Option<Encoding>,
        target: Encoding,
    ) -> Result<TranscodingReader<R>> {
        self.streams
            .process_reader(reader, source, target, self.config.converter.strict_mode)
    }

    /// Wrap `writer` so bytes written to it arrive as `target`.
    pub fn process_writer<W: Write>(
        &self,
        writer: W,
        source: Option<Encoding>,
        target: Encoding,
    ) -> TranscodingWriter<W> {
        self.streams
            .process_writer(writer, source, target, self.config.converter.strict_mode)
    }

    /// Drop every cached detection result.
    pub fn clear_cache(&self) {
        self.detector.clear_cache();
    }

    fn run<T>(&self, op: Operation, body: impl FnOnce() -> Result<(T, u64)>) -> Result<T> {
        let start = Instant::now();
        self.started(op);
        match body() {
            Ok((value, bytes)) => {
                self.finished(op, bytes, start);
                Ok(value)
            }
            Err(err) => {
                let elapsed = start.elapsed();
                for observer in &self.observers {
                    observer.operation_failed(op, &err, elapsed);
                }
                Err(err)
            }
        }
    }

    fn started(&self, op: Operation) {
        for observer in &self.observers {
            observer.operation_started(op);
        }
    }

    fn finished(&self, op: Operation, bytes: u64, start: Instant) {
        let elapsed = start.elapsed();
        for observer in &self.observers {
            observer.operation_finished(op, bytes, elapsed);
        }
    }

    fn notify_detected(&self, result: &DetectionResult) {
        for observer in &self.observers {
            observer.encoding_detected(result);
        }
    }
}
