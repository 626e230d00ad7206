//! Streaming transcoding over `Read`/`Write`.
//!
//! When the source encoding is unknown, a bounded lookahead sample is read
//! and detected, then replayed ahead of the live reader through
//! `Cursor::chain`, so no byte is lost or duplicated. Cancellation is polled
//! once per chunk.

use std::io::{self, Chain, Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::codec::Transcoder;
use crate::config::{ConverterConfig, StreamOptions};
use crate::detection::{Detector, bom_len};
use crate::{Encoding, Error, Result};

/// Longest BOM in the catalog.
const MAX_BOM_LEN: usize = 4;

/// Cooperative cancellation flag shared between a stream loop and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the loop stops before its next chunk.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Totals from [`StreamProcessor::process_reader_writer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamResult {
    /// Bytes consumed from the reader, including a skipped BOM
    pub bytes_read: u64,
    /// Bytes handed to the writer
    pub bytes_written: u64,
    /// Encoding the input was read as
    pub source_encoding: Encoding,
    /// Encoding written
    pub target_encoding: Encoding,
    /// Confidence of the detected source; 1.0 when the source was given
    pub confidence: f64,
    /// Wall time for the whole loop
    pub processing_time: Duration,
    /// Substitutions made; always zero in strict mode
    pub error_count: usize,
}

/// Drives transcoding between readers and writers.
#[derive(Debug, Clone)]
pub struct StreamProcessor {
    detector: Arc<Detector>,
    replacement: String,
    buffer_size: usize,
}

impl StreamProcessor {
    /// Create a stream processor sharing `detector`.
    pub fn new(detector: Arc<Detector>, converter: &ConverterConfig) -> Self {
        Self {
            detector,
            replacement: converter.invalid_char_replacement.clone(),
            buffer_size: converter.buffer_size,
        }
    }

    /// Copy `reader` to `writer`, converting to `options.target_encoding`.
    pub fn process_reader_writer<R: Read, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
        options: &StreamOptions,
        cancel: &CancellationToken,
    ) -> Result<StreamResult> {
        let start = Instant::now();
        let (lookahead, source, confidence) = self.resolve_source(
            &mut reader,
            options.source_encoding,
            options.detection_sample_size,
            options.skip_bom,
        )?;
        let skipped = lookahead.position();
        let mut input = lookahead.chain(reader);

        let mut transcoder = Transcoder::new(
            source,
            options.target_encoding,
            options.strict_mode,
            &self.replacement,
        );
        let mut buf = vec![0u8; options.buffer_size.max(1)];
        let mut out = Vec::with_capacity(buf.len() * 2);
        let mut bytes_read = skipped;
        let mut bytes_written = 0u64;

        loop {
            if cancel.is_cancelled() {
                // Partial output stays with the sink.
                let _ = writer.flush();
                debug!(bytes_read, bytes_written, "stream_cancelled");
                return Err(Error::Cancelled {
                    bytes_read,
                    bytes_written,
                });
            }

            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(Error::StreamIo { op: "read", source }),
            };
            bytes_read += n as u64;

            out.clear();
            transcoder.feed(&buf[..n], false, &mut out)?;
            write_out(&mut writer, &out)?;
            bytes_written += out.len() as u64;
        }

        out.clear();
        transcoder.feed(&[], true, &mut out)?;
        write_out(&mut writer, &out)?;
        bytes_written += out.len() as u64;
        writer
            .flush()
            .map_err(|source| Error::StreamIo { op: "flush", source })?;

        let result = StreamResult {
            bytes_read,
            bytes_written,
            source_encoding: source,
            target_encoding: options.target_encoding,
            confidence,
            processing_time: start.elapsed(),
            error_count: transcoder.errors(),
        };
        info!(
            source = %result.source_encoding,
            target = %result.target_encoding,
            bytes_read,
            bytes_written,
            errors = result.error_count,
            elapsed_micros = result.processing_time.as_micros() as u64,
            "stream_complete"
        );
        Ok(result)
    }

    /// Wrap `reader` so that reading from it yields `target`-encoded bytes.
    pub fn process_reader<R: Read>(
        &self,
        mut reader: R,
        source: Option<Encoding>,
        target: Encoding,
        strict: bool,
    ) -> Result<TranscodingReader<R>> {
        let sample_size = self.detector.config().sample_size;
        let (lookahead, source, _) = self.resolve_source(&mut reader, source, sample_size, false)?;
        Ok(TranscodingReader {
            inner: lookahead.chain(reader),
            transcoder: Transcoder::new(source, target, strict, &self.replacement),
            source,
            input: vec![0u8; self.buffer_size.max(1)],
            output: Vec::new(),
            pos: 0,
            done: false,
        })
    }

    /// Wrap `writer` so that bytes written to it in `source` (or a detected
    /// encoding) reach it as `target`.
    pub fn process_writer<W: Write>(
        &self,
        writer: W,
        source: Option<Encoding>,
        target: Encoding,
        strict: bool,
    ) -> TranscodingWriter<W> {
        let state = match source {
            Some(source) => WriterState::Active {
                source,
                transcoder: Transcoder::new(source, target, strict, &self.replacement),
            },
            None => WriterState::Detecting(Vec::new()),
        };
        TranscodingWriter {
            inner: writer,
            state,
            target,
            strict,
            replacement: self.replacement.clone(),
            detector: Arc::clone(&self.detector),
            sample_size: self.detector.config().sample_size,
            out: Vec::new(),
        }
    }

    /// Read the lookahead sample and settle on a source encoding.
    ///
    /// The returned cursor holds every byte consumed from `reader` and is
    /// positioned past a BOM when `skip_bom` is set.
    fn resolve_source<R: Read>(
        &self,
        reader: &mut R,
        source: Option<Encoding>,
        sample_size: usize,
        skip_bom: bool,
    ) -> Result<(Cursor<Vec<u8>>, Encoding, f64)> {
        let wanted = match source {
            None => sample_size.max(MAX_BOM_LEN),
            Some(_) if skip_bom => MAX_BOM_LEN,
            Some(_) => 0,
        };

        let mut sample = Vec::with_capacity(wanted);
        reader
            .by_ref()
            .take(wanted as u64)
            .read_to_end(&mut sample)
            .map_err(|source| Error::StreamIo { op: "read", source })?;

        let (encoding, confidence) = match source {
            Some(encoding) => (encoding, 1.0),
            // Nothing to detect; any encoding reads an empty stream the same.
            None if sample.is_empty() => (Encoding::UTF8, 1.0),
            None => {
                let more_follows = sample.len() == wanted;
                let detected = self.detector.detect_head(&sample, wanted, more_follows)?;
                debug!(
                    encoding = %detected.encoding,
                    confidence = detected.confidence,
                    sample = sample.len(),
                    "stream_source_detected"
                );
                (detected.encoding, detected.confidence)
            }
        };

        let skip = if skip_bom { bom_len(&sample, encoding) } else { 0 };
        let mut cursor = Cursor::new(sample);
        cursor.set_position(skip as u64);
        Ok((cursor, encoding, confidence))
    }
}

fn write_out<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    writer
        .write_all(bytes)
        .map_err(|source| Error::StreamIo { op: "write", source })
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::StreamIo { source, .. } => source,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// `Read` adapter yielding transcoded bytes.
pub struct TranscodingReader<R> {
    inner: Chain<Cursor<Vec<u8>>, R>,
    transcoder: Transcoder,
    source: Encoding,
    input: Vec<u8>,
    output: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<R> TranscodingReader<R> {
    /// Encoding the underlying reader is decoded as.
    pub fn source_encoding(&self) -> Encoding {
        self.source
    }

    /// Substitutions made so far.
    pub fn error_count(&self) -> usize {
        self.transcoder.errors()
    }
}

impl<R: Read> Read for TranscodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.output.len() {
            if self.done {
                return Ok(0);
            }
            self.output.clear();
            self.pos = 0;

            let n = self.inner.read(&mut self.input)?;
            let last = n == 0;
            self.transcoder
                .feed(&self.input[..n], last, &mut self.output)
                .map_err(into_io)?;
            self.done = last;
        }

        let n = buf.len().min(self.output.len() - self.pos);
        buf[..n].copy_from_slice(&self.output[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

enum WriterState {
    Detecting(Vec<u8>),
    Active {
        source: Encoding,
        transcoder: Transcoder,
    },
}

/// `Write` adapter that transcodes everything written to it.
///
/// Call [`finish`](TranscodingWriter::finish) when done: it flushes any
/// partial sequence the decoder is holding and, when detecting, settles the
/// source encoding of input shorter than one sample.
pub struct TranscodingWriter<W: Write> {
    inner: W,
    state: WriterState,
    target: Encoding,
    strict: bool,
    replacement: String,
    detector: Arc<Detector>,
    sample_size: usize,
    out: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    /// Source encoding, once known.
    pub fn source_encoding(&self) -> Option<Encoding> {
        match &self.state {
            WriterState::Detecting(_) => None,
            WriterState::Active { source, .. } => Some(*source),
        }
    }

    /// Flush pending state and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.activate(true)?;
        if let WriterState::Active { transcoder, .. } = &mut self.state {
            self.out.clear();
            transcoder.feed(&[], true, &mut self.out)?;
        }
        write_out(&mut self.inner, &self.out)?;
        self.out.clear();
        self.inner
            .flush()
            .map_err(|source| Error::StreamIo { op: "flush", source })?;
        Ok(self.inner)
    }

    /// Detect from the buffered sample and push it through the chain.
    fn activate(&mut self, finishing: bool) -> Result<()> {
        let WriterState::Detecting(pending) = &mut self.state else {
            return Ok(());
        };
        let pending = std::mem::take(pending);
        let source = if pending.is_empty() {
            Encoding::UTF8
        } else {
            let more_follows = !finishing;
            match self.detector.detect_head(&pending, self.sample_size, more_follows) {
                Ok(detected) => detected.encoding,
                Err(err) => {
                    // Keep the sample so nothing written so far is lost.
                    self.state = WriterState::Detecting(pending);
                    return Err(err);
                }
            }
        };

        let mut transcoder = Transcoder::new(source, self.target, self.strict, &self.replacement);
        self.out.clear();
        transcoder.feed(&pending, false, &mut self.out)?;
        write_out(&mut self.inner, &self.out)?;
        self.state = WriterState::Active { source, transcoder };
        Ok(())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.state {
            WriterState::Detecting(pending) => {
                let kept = pending.len();
                pending.extend_from_slice(buf);
                if pending.len() >= self.sample_size {
                    if let Err(err) = self.activate(false) {
                        // A failed write consumes nothing.
                        if let WriterState::Detecting(pending) = &mut self.state {
                            pending.truncate(kept);
                        }
                        return Err(into_io(err));
                    }
                }
            }
            WriterState::Active { transcoder, .. } => {
                self.out.clear();
                transcoder.feed(buf, false, &mut self.out).map_err(into_io)?;
                self.inner.write_all(&self.out)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::config::DetectorConfig;
    use crate::detection::{CharsetOracle, OracleError, OracleGuess};
    use std::sync::atomic::AtomicUsize;

    fn processor() -> StreamProcessor {
        let detector = Arc::new(Detector::new(DetectorConfig::default()).unwrap());
        StreamProcessor::new(detector, &ConverterConfig::default())
    }

    fn options(source: Option<Encoding>, target: Encoding) -> StreamOptions {
        StreamOptions {
            source_encoding: source,
            target_encoding: target,
            buffer_size: 7,
            ..StreamOptions::default()
        }
    }

    /// Cancels its token after the first successful read.
    struct CancelAfterFirstRead<R> {
        inner: R,
        token: CancellationToken,
    }

    impl<R: Read> Read for CancelAfterFirstRead<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.token.cancel();
            Ok(n)
        }
    }

    #[test]
    fn test_explicit_source_small_buffer() {
        let (gbk, _, _) = encoding_rs::GBK.encode("这是中文，分块读取。");
        let mut sink = Vec::new();
        let result = processor()
            .process_reader_writer(
                gbk.as_ref(),
                &mut sink,
                &options(Some(Encoding::GBK), Encoding::UTF8),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(String::from_utf8(sink).unwrap(), "这是中文，分块读取。");
        assert_eq!(result.bytes_read, gbk.len() as u64);
        assert_eq!(result.source_encoding, Encoding::GBK);
        assert_eq!(result.error_count, 0);
    }

    #[test]
    fn test_detected_sample_is_replayed() {
        let text = "Grüße aus Köln! ".repeat(50);
        let mut sink = Vec::new();
        let mut opts = options(None, Encoding::UTF16LE);
        opts.detection_sample_size = 64;
        let result = processor()
            .process_reader_writer(text.as_bytes(), &mut sink, &opts, &CancellationToken::new())
            .unwrap();

        assert_eq!(result.source_encoding, Encoding::UTF8);
        assert_eq!(result.bytes_read, text.len() as u64);
        let (decoded, _, had_errors) = encoding_rs::UTF_16LE.decode(&sink);
        assert!(!had_errors);
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_empty_stream() {
        let mut sink = Vec::new();
        let result = processor()
            .process_reader_writer(
                io::empty(),
                &mut sink,
                &options(None, Encoding::GBK),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(sink.is_empty());
        assert_eq!(result.bytes_read, 0);
        assert_eq!(result.source_encoding, Encoding::UTF8);
    }

    #[test]
    fn test_skip_bom() {
        let mut sink = Vec::new();
        let mut opts = options(None, Encoding::UTF8);
        opts.skip_bom = true;
        let result = processor()
            .process_reader_writer(
                b"\xEF\xBB\xBFhello".as_ref(),
                &mut sink,
                &opts,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(sink, b"hello");
        assert_eq!(result.bytes_read, 8);

        let mut sink = Vec::new();
        let mut opts = options(Some(Encoding::UTF16LE), Encoding::UTF8);
        opts.skip_bom = true;
        processor()
            .process_reader_writer(
                b"\xFF\xFEh\x00i\x00".as_ref(),
                &mut sink,
                &opts,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(sink, b"hi");
    }

    #[test]
    fn test_cancellation_between_chunks() {
        let token = CancellationToken::new();
        let reader = CancelAfterFirstRead {
            inner: b"abcdefghijklmnopqrstuvwxyz".as_ref(),
            token: token.clone(),
        };
        let mut sink = Vec::new();
        let err = processor()
            .process_reader_writer(
                reader,
                &mut sink,
                &options(Some(Encoding::UTF8), Encoding::UTF16BE),
                &token,
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        match err {
            Error::Cancelled {
                bytes_read,
                bytes_written,
            } => {
                assert_eq!(bytes_read, 7);
                assert_eq!(bytes_written, 14);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.len(), 14);
    }

    #[test]
    fn test_strict_stream_failure() {
        let mut sink = Vec::new();
        let mut opts = options(Some(Encoding::UTF8), Encoding::GBK);
        opts.strict_mode = true;
        let err = processor()
            .process_reader_writer(
                b"fine\xFFbroken".as_ref(),
                &mut sink,
                &opts,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    }

    #[test]
    fn test_transcoding_reader() {
        let (sjis, _, _) = encoding_rs::SHIFT_JIS.encode("日本語のテキストです");
        let mut reader = processor()
            .process_reader(sjis.as_ref(), Some(Encoding::SHIFT_JIS), Encoding::UTF8, true)
            .unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "日本語のテキストです");
        assert_eq!(reader.source_encoding(), Encoding::SHIFT_JIS);
    }

    #[test]
    fn test_transcoding_writer_with_detection() {
        let mut writer = processor().process_writer(Vec::new(), None, Encoding::UTF16BE, false);
        writer.write_all("héllo ".as_bytes()).unwrap();
        writer.write_all("wörld".as_bytes()).unwrap();
        assert_eq!(writer.source_encoding(), None);
        let out = writer.finish().unwrap();

        let (decoded, _, had_errors) = encoding_rs::UTF_16BE.decode(&out);
        assert!(!had_errors);
        assert_eq!(decoded, "héllo wörld");
    }

    struct FailingOracle;

    impl CharsetOracle for FailingOracle {
        fn rank(&self, _sample: &[u8]) -> std::result::Result<Vec<OracleGuess>, OracleError> {
            Err(OracleError("no model".to_string()))
        }
    }

    /// Answers windows-1252 and remembers how much it was shown.
    struct MeasuringOracle {
        seen: AtomicUsize,
    }

    impl CharsetOracle for MeasuringOracle {
        fn rank(&self, sample: &[u8]) -> std::result::Result<Vec<OracleGuess>, OracleError> {
            self.seen.store(sample.len(), Ordering::SeqCst);
            Ok(vec![OracleGuess::new("windows-1252", 95)])
        }
    }

    #[test]
    fn test_writer_keeps_sample_when_detection_fails() {
        let config = DetectorConfig::default().with_sample_size(4);
        let detector = Arc::new(Detector::with_oracle(config, Arc::new(FailingOracle)).unwrap());
        let streams = StreamProcessor::new(detector, &ConverterConfig::default());

        let mut writer = streams.process_writer(Vec::new(), None, Encoding::UTF8, false);
        writer.write_all(b"\x81\x82").unwrap();
        assert!(writer.write_all(b"\x83\x84\x85").is_err());
        assert_eq!(writer.source_encoding(), None);

        // The two accepted bytes are still pending, so finishing cannot
        // quietly succeed without them.
        assert!(writer.finish().is_err());
    }

    #[test]
    fn test_stream_sample_size_overrides_detector() {
        let oracle = Arc::new(MeasuringOracle {
            seen: AtomicUsize::new(0),
        });
        let config = DetectorConfig::default().with_sample_size(4);
        let detector = Arc::new(Detector::with_oracle(config, oracle.clone()).unwrap());
        let streams = StreamProcessor::new(detector, &ConverterConfig::default());

        // The first four bytes end in a cut-off UTF-8 lead byte and alone
        // would pass as UTF-8.
        let latin1 = b"caf\xE9 cr\xE8me br\xFBl\xE9e et encore du texte";
        let options = StreamOptions {
            detection_sample_size: 32,
            ..StreamOptions::default()
        };
        let mut sink = Vec::new();
        let result = streams
            .process_reader_writer(&latin1[..], &mut sink, &options, &CancellationToken::new())
            .unwrap();

        assert_eq!(result.source_encoding, Encoding::WINDOWS_1252);
        assert_eq!(oracle.seen.load(Ordering::SeqCst), 32);
        assert_eq!(String::from_utf8(sink).unwrap(), "café crème brûlée et encore du texte");
    }

    #[test]
    fn test_transcoding_writer_split_sequence() {
        let (big5, _, _) = encoding_rs::BIG5.encode("繁體中文");
        let mut writer =
            processor().process_writer(Vec::new(), Some(Encoding::BIG5), Encoding::UTF8, true);
        for byte in big5.iter() {
            writer.write_all(std::slice::from_ref(byte)).unwrap();
        }
        let out = writer.finish().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "繁體中文");
    }
}
