//! Per-encoding decode/encode primitives and the stateful transform chain.
//!
//! Every [`Encoding`] is bound here, at compile time, to a decoder and an
//! encoder. Most come from `encoding_rs`; ISO-8859-1 (which `encoding_rs`
//! aliases to windows-1252), UTF-32, and the UTF-16 encoders are native.
//! Decoders are streaming: a multi-byte sequence split across two `feed`
//! calls is reassembled, never reported as malformed.

use encoding_rs::{DecoderResult, EncoderResult};

use crate::{Encoding, Error, Result};

/// The `encoding_rs` codec backing `encoding`, if any.
pub(crate) fn rs_encoding(encoding: Encoding) -> Option<&'static encoding_rs::Encoding> {
    let rs = match encoding {
        Encoding::UTF8 => encoding_rs::UTF_8,
        Encoding::UTF16LE => encoding_rs::UTF_16LE,
        Encoding::UTF16BE => encoding_rs::UTF_16BE,
        Encoding::GBK => encoding_rs::GBK,
        Encoding::GB18030 => encoding_rs::GB18030,
        Encoding::BIG5 => encoding_rs::BIG5,
        Encoding::SHIFT_JIS => encoding_rs::SHIFT_JIS,
        Encoding::EUC_JP => encoding_rs::EUC_JP,
        Encoding::EUC_KR => encoding_rs::EUC_KR,
        Encoding::ISO_8859_2 => encoding_rs::ISO_8859_2,
        Encoding::ISO_8859_5 => encoding_rs::ISO_8859_5,
        Encoding::ISO_8859_15 => encoding_rs::ISO_8859_15,
        Encoding::WINDOWS_1250 => encoding_rs::WINDOWS_1250,
        Encoding::WINDOWS_1251 => encoding_rs::WINDOWS_1251,
        Encoding::WINDOWS_1252 => encoding_rs::WINDOWS_1252,
        Encoding::WINDOWS_1254 => encoding_rs::WINDOWS_1254,
        Encoding::KOI8_R => encoding_rs::KOI8_R,
        Encoding::CP_866 => encoding_rs::IBM866,
        Encoding::MAC_ROMAN => encoding_rs::MACINTOSH,
        Encoding::UTF32LE | Encoding::UTF32BE | Encoding::ISO_8859_1 => return None,
    };
    Some(rs)
}

fn too_large(len: usize) -> Error {
    Error::InsufficientMemory {
        requested: len as u64,
        limit: usize::MAX as u64,
    }
}

/// Streaming bytes-to-text decoder.
pub(crate) enum Decoder {
    Rs(encoding_rs::Decoder),
    Latin1,
    Utf32 { big_endian: bool, pending: Vec<u8> },
}

impl Decoder {
    pub(crate) fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::UTF32LE => Decoder::Utf32 {
                big_endian: false,
                pending: Vec::with_capacity(4),
            },
            Encoding::UTF32BE => Decoder::Utf32 {
                big_endian: true,
                pending: Vec::with_capacity(4),
            },
            Encoding::ISO_8859_1 => Decoder::Latin1,
            other => match rs_encoding(other) {
                // A BOM is content here; stripping it is the caller's decision.
                Some(rs) => Decoder::Rs(rs.new_decoder_without_bom_handling()),
                None => Decoder::Latin1,
            },
        }
    }

    /// Decode `src` onto `text`.
    ///
    /// `base` is the absolute offset of `src[0]`. `on_malformed` receives the
    /// absolute offset and length of each malformed sequence and may push a
    /// replacement onto the text or abort.
    pub(crate) fn decode(
        &mut self,
        src: &[u8],
        last: bool,
        base: u64,
        text: &mut String,
        on_malformed: &mut dyn FnMut(u64, usize, &mut String) -> Result<()>,
    ) -> Result<()> {
        match self {
            Decoder::Rs(decoder) => {
                let mut read_total = 0usize;
                loop {
                    let rest = &src[read_total..];
                    let needed = decoder
                        .max_utf8_buffer_length_without_replacement(rest.len())
                        .ok_or_else(|| too_large(rest.len()))?;
                    text.reserve(needed);
                    let (result, read) =
                        decoder.decode_to_string_without_replacement(rest, text, last);
                    read_total += read;
                    match result {
                        DecoderResult::InputEmpty => return Ok(()),
                        DecoderResult::OutputFull => continue,
                        DecoderResult::Malformed(bad, extra) => {
                            // The bad bytes may have started in an earlier call.
                            let at = (base + read_total as u64)
                                .saturating_sub(u64::from(extra) + u64::from(bad));
                            on_malformed(at, usize::from(bad), text)?;
                        }
                    }
                }
            }
            Decoder::Latin1 => {
                text.reserve(src.len() * 2);
                text.extend(src.iter().map(|&b| char::from(b)));
                Ok(())
            }
            Decoder::Utf32 {
                big_endian,
                pending,
            } => {
                let start = base.saturating_sub(pending.len() as u64);
                let mut units = std::mem::take(pending);
                units.extend_from_slice(src);

                let mut chunks = units.chunks_exact(4);
                for (index, unit) in chunks.by_ref().enumerate() {
                    let raw = [unit[0], unit[1], unit[2], unit[3]];
                    let value = if *big_endian {
                        u32::from_be_bytes(raw)
                    } else {
                        u32::from_le_bytes(raw)
                    };
                    match char::from_u32(value) {
                        Some(ch) => text.push(ch),
                        None => on_malformed(start + (index as u64) * 4, 4, text)?,
                    }
                }

                let tail = chunks.remainder();
                if last {
                    if !tail.is_empty() {
                        let at = start + (units.len() - tail.len()) as u64;
                        on_malformed(at, tail.len(), text)?;
                    }
                } else {
                    pending.extend_from_slice(tail);
                }
                Ok(())
            }
        }
    }
}

/// Streaming text-to-bytes encoder.
pub(crate) enum Encoder {
    Utf8,
    Rs(encoding_rs::Encoder),
    Utf16 { big_endian: bool },
    Utf32 { big_endian: bool },
    Latin1,
}

impl Encoder {
    pub(crate) fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::UTF8 => Encoder::Utf8,
            // encoding_rs only encodes UTF-16 as UTF-8.
            Encoding::UTF16LE => Encoder::Utf16 { big_endian: false },
            Encoding::UTF16BE => Encoder::Utf16 { big_endian: true },
            Encoding::UTF32LE => Encoder::Utf32 { big_endian: false },
            Encoding::UTF32BE => Encoder::Utf32 { big_endian: true },
            Encoding::ISO_8859_1 => Encoder::Latin1,
            other => match rs_encoding(other) {
                Some(rs) => Encoder::Rs(rs.new_encoder()),
                None => Encoder::Latin1,
            },
        }
    }

    /// Encode `text` onto `out`, calling `on_unmappable` for every character
    /// the target cannot represent.
    pub(crate) fn encode(
        &mut self,
        text: &str,
        last: bool,
        out: &mut Vec<u8>,
        on_unmappable: &mut dyn FnMut(char, &mut Vec<u8>) -> Result<()>,
    ) -> Result<()> {
        match self {
            Encoder::Utf8 => {
                out.extend_from_slice(text.as_bytes());
                Ok(())
            }
            Encoder::Utf16 { big_endian } => {
                out.reserve(text.len() * 2);
                for unit in text.encode_utf16() {
                    if *big_endian {
                        out.extend_from_slice(&unit.to_be_bytes());
                    } else {
                        out.extend_from_slice(&unit.to_le_bytes());
                    }
                }
                Ok(())
            }
            Encoder::Utf32 { big_endian } => {
                out.reserve(text.len() * 4);
                for ch in text.chars() {
                    let value = u32::from(ch);
                    if *big_endian {
                        out.extend_from_slice(&value.to_be_bytes());
                    } else {
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                }
                Ok(())
            }
            Encoder::Latin1 => {
                out.reserve(text.len());
                for ch in text.chars() {
                    match u8::try_from(u32::from(ch)) {
                        Ok(byte) => out.push(byte),
                        Err(_) => on_unmappable(ch, out)?,
                    }
                }
                Ok(())
            }
            Encoder::Rs(encoder) => {
                let mut pos = 0usize;
                loop {
                    let rest = &text[pos..];
                    let needed = encoder
                        .max_buffer_length_from_utf8_without_replacement(rest.len())
                        .ok_or_else(|| too_large(rest.len()))?;
                    out.reserve(needed);
                    let (result, read) =
                        encoder.encode_from_utf8_to_vec_without_replacement(rest, out, last);
                    pos += read;
                    match result {
                        EncoderResult::InputEmpty => return Ok(()),
                        EncoderResult::OutputFull => continue,
                        EncoderResult::Unmappable(ch) => on_unmappable(ch, out)?,
                    }
                }
            }
        }
    }
}

/// Decode/encode chain for one encoding pair, carrying codec state across
/// successive chunks.
pub(crate) struct Transcoder {
    from: Encoding,
    to: Encoding,
    decoder: Decoder,
    encoder: Encoder,
    strict: bool,
    replacement: String,
    replacement_bytes: Vec<u8>,
    consumed: u64,
    errors: usize,
    text: String,
}

impl Transcoder {
    pub(crate) fn new(from: Encoding, to: Encoding, strict: bool, replacement: &str) -> Self {
        Self {
            from,
            to,
            decoder: Decoder::new(from),
            encoder: Encoder::new(to),
            strict,
            replacement: replacement.to_string(),
            replacement_bytes: encode_replacement(to, replacement),
            consumed: 0,
            errors: 0,
            text: String::new(),
        }
    }

    /// Transform `src` and append the result to `out`.
    ///
    /// Pass `last = true` exactly once, with the final chunk (which may be
    /// empty), so buffered partial sequences are flushed or reported.
    pub(crate) fn feed(&mut self, src: &[u8], last: bool, out: &mut Vec<u8>) -> Result<()> {
        let base = self.consumed;
        self.consumed += src.len() as u64;

        if self.from == self.to {
            out.extend_from_slice(src);
            return Ok(());
        }

        let (from, to, strict) = (self.from, self.to, self.strict);
        let replacement = self.replacement.as_str();
        let replacement_bytes = self.replacement_bytes.as_slice();
        let errors = &mut self.errors;

        self.text.clear();
        self.decoder.decode(src, last, base, &mut self.text, &mut |at, len, text| {
            if strict {
                return Err(Error::ConversionFailed {
                    from: from.name(),
                    to: to.name(),
                    offset: at,
                    reason: format!("invalid {from} sequence of {len} byte(s)"),
                });
            }
            *errors += 1;
            text.push_str(replacement);
            Ok(())
        })?;

        self.encoder
            .encode(&self.text, last, out, &mut |ch, out| {
                if strict {
                    return Err(Error::ConversionFailed {
                        from: from.name(),
                        to: to.name(),
                        offset: base,
                        reason: format!(
                            "character U+{:04X} in the chunk starting here has no {to} representation",
                            u32::from(ch)
                        ),
                    });
                }
                *errors += 1;
                out.extend_from_slice(replacement_bytes);
                Ok(())
            })
    }

    /// Substitutions made so far (lenient mode only).
    pub(crate) fn errors(&self) -> usize {
        self.errors
    }
}

/// The replacement marker in the target encoding, dropping any of its own
/// characters the target cannot represent.
fn encode_replacement(to: Encoding, replacement: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(replacement.len());
    let mut encoder = Encoder::new(to);
    let encoded = encoder.encode(replacement, true, &mut out, &mut |_, _| Ok(()));
    match encoded {
        Ok(()) => out,
        Err(_) => b"?".to_vec(),
    }
}

/// Decode all of `bytes`, returning `None` at the first malformed sequence.
pub(crate) fn decode_strict(bytes: &[u8], encoding: Encoding) -> Option<String> {
    decode_checked(bytes, encoding, true)
}

/// Like [`decode_strict`], but an incomplete sequence at the very end is
/// dropped rather than rejected.
pub(crate) fn decode_prefix(bytes: &[u8], encoding: Encoding) -> Option<String> {
    decode_checked(bytes, encoding, false)
}

fn decode_checked(bytes: &[u8], encoding: Encoding, last: bool) -> Option<String> {
    let mut text = String::with_capacity(bytes.len());
    let mut decoder = Decoder::new(encoding);
    decoder
        .decode(bytes, last, 0, &mut text, &mut |at, _, _| {
            Err(Error::ConversionFailed {
                from: encoding.name(),
                to: Encoding::UTF8.name(),
                offset: at,
                reason: String::new(),
            })
        })
        .ok()?;
    Some(text)
}

/// Decode all of `bytes`, substituting U+FFFD and counting malformed sequences.
pub(crate) fn decode_lossy(bytes: &[u8], encoding: Encoding) -> (String, usize) {
    let mut text = String::with_capacity(bytes.len());
    let mut malformed = 0usize;
    let mut decoder = Decoder::new(encoding);
    let result = decoder.decode(bytes, true, 0, &mut text, &mut |_, _, text| {
        malformed += 1;
        text.push(char::REPLACEMENT_CHARACTER);
        Ok(())
    });
    if result.is_err() {
        // Only reachable on capacity overflow; report everything as bad.
        return (String::new(), bytes.len().max(1));
    }
    (text, malformed)
}
