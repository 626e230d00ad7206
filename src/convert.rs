//! Byte-buffer conversion between two catalog encodings.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::codec::{self, Transcoder};
use crate::config::ConverterConfig;
use crate::{Encoding, Error, Result};

/// Output of [`Converter::convert_detailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    /// Converted bytes
    #[serde(skip)]
    pub output: Vec<u8>,
    /// Encoding the input was read as
    pub source_encoding: Encoding,
    /// Encoding the output is written in
    pub target_encoding: Encoding,
    /// Input bytes consumed
    pub bytes_processed: usize,
    /// Wall time spent converting
    pub duration: Duration,
    /// Substitutions made; always zero in strict mode
    pub error_count: usize,
}

/// Converts byte buffers between encodings.
///
/// Inputs larger than [`ConverterConfig::chunk_size`] are processed chunk by
/// chunk through one stateful transform chain, so the result is identical to
/// a single pass regardless of where chunk boundaries fall.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: ConverterConfig,
}

impl Converter {
    /// Create a converter with the given policy.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// The active policy.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert `input` from `from` to `to`.
    ///
    /// ```rust
    /// use encoding_processor::{Converter, Encoding};
    ///
    /// let converter = Converter::default();
    /// let latin1 = converter.convert("café".as_bytes(), Encoding::UTF8, Encoding::ISO_8859_1).unwrap();
    /// assert_eq!(latin1, b"caf\xE9");
    /// ```
    pub fn convert(&self, input: &[u8], from: Encoding, to: Encoding) -> Result<Vec<u8>> {
        self.convert_detailed(input, from, to).map(|outcome| outcome.output)
    }

    /// Convert and report byte counts, timing, and substitutions.
    pub fn convert_detailed(
        &self,
        input: &[u8],
        from: Encoding,
        to: Encoding,
    ) -> Result<ConversionOutcome> {
        let start = Instant::now();
        self.check_memory(input.len())?;

        if from == to {
            return Ok(ConversionOutcome {
                output: input.to_vec(),
                source_encoding: from,
                target_encoding: to,
                bytes_processed: input.len(),
                duration: start.elapsed(),
                error_count: 0,
            });
        }

        let mut transcoder = self.transcoder(from, to);
        let mut output = Vec::with_capacity(estimate_output(input.len(), from, to));

        if input.len() > self.config.chunk_size {
            let mut chunks = 0usize;
            for chunk in input.chunks(self.config.chunk_size) {
                transcoder.feed(chunk, false, &mut output)?;
                chunks += 1;
            }
            transcoder.feed(&[], true, &mut output)?;
            debug!(%from, %to, chunks, chunk_size = self.config.chunk_size, "chunked_conversion");
        } else {
            transcoder.feed(input, true, &mut output)?;
        }

        Ok(ConversionOutcome {
            output,
            source_encoding: from,
            target_encoding: to,
            bytes_processed: input.len(),
            duration: start.elapsed(),
            error_count: transcoder.errors(),
        })
    }

    /// Convert any supported encoding to UTF-8 bytes.
    pub fn convert_to_utf8(&self, input: &[u8], from: Encoding) -> Result<Vec<u8>> {
        self.convert(input, from, Encoding::UTF8)
    }

    /// Decode `input` into a `String`.
    pub fn decode_to_string(&self, input: &[u8], from: Encoding) -> Result<String> {
        let bytes = self.convert_to_utf8(input, from)?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            // Only reachable for identity UTF-8 input that was never validated.
            Err(err) => {
                let offset = err.utf8_error().valid_up_to() as u64;
                if self.config.strict_mode {
                    Err(Error::ConversionFailed {
                        from: from.name(),
                        to: Encoding::UTF8.name(),
                        offset,
                        reason: "invalid UTF-8 sequence".to_string(),
                    })
                } else {
                    Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
                }
            }
        }
    }

    /// Encode UTF-8 text into `to`.
    pub fn convert_string(&self, text: &str, to: Encoding) -> Result<Vec<u8>> {
        self.convert(text.as_bytes(), Encoding::UTF8, to)
    }

    /// Whether `input` decodes under `encoding` without a single malformed sequence.
    pub fn validate(&self, input: &[u8], encoding: Encoding) -> bool {
        codec::decode_strict(input, encoding).is_some()
    }

    pub(crate) fn transcoder(&self, from: Encoding, to: Encoding) -> Transcoder {
        Transcoder::new(
            from,
            to,
            self.config.strict_mode,
            &self.config.invalid_char_replacement,
        )
    }

    pub(crate) fn check_memory(&self, len: usize) -> Result<()> {
        let limit = self.config.max_memory_usage;
        if limit > 0 && len > limit {
            return Err(Error::InsufficientMemory {
                requested: len as u64,
                limit: limit as u64,
            });
        }
        Ok(())
    }
}

fn estimate_output(len: usize, from: Encoding, to: Encoding) -> usize {
    match (from.is_ascii_compatible(), to) {
        (true, Encoding::UTF16LE | Encoding::UTF16BE) => len.saturating_mul(2),
        (true, Encoding::UTF32LE | Encoding::UTF32BE) => len.saturating_mul(4),
        (false, _) => len,
        _ => len + len / 2,
    }
}
