//! # EncodingProcessor - Character Encoding Detection and Conversion
//!
//! Detects the character encoding of untyped byte buffers and converts bytes
//! between encodings, including safe in-place file rewriting and streaming
//! transcoding of unbounded input.
//!
//! ## Features
//!
//! - **Cascading detection**: BOM sniffing, strict UTF-8 validation, a
//!   statistical oracle, and heuristic rescoring for ambiguous CJK input
//! - **Detection cache** keyed by a SHA-256 of the sampled prefix
//! - **Chunked conversion** that threads decoder state across chunk seams
//! - **Strict or lenient** failure policy with error counting
//! - **Streaming** `Read`/`Write` adapters with lookahead detection
//! - **Safe file mutation**: temp-write, backup, atomic rename, rollback
//!
//! ## Quick Start
//!
//! ```rust
//! use encoding_processor::{Encoding, Processor, ProcessorConfig};
//!
//! let processor = Processor::new(ProcessorConfig::default()).unwrap();
//!
//! // "这是中文" in GBK
//! let gbk = [0xD5, 0xE2, 0xCA, 0xC7, 0xD6, 0xD0, 0xCE, 0xC4];
//! let utf8 = processor.convert(&gbk, Encoding::GBK, Encoding::UTF8).unwrap();
//! assert_eq!(std::str::from_utf8(&utf8).unwrap(), "这是中文");
//! ```

#![deny(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod codec;
pub mod config;
pub mod convert;
pub mod detection;
mod error;
pub mod file;
pub mod observe;
mod processor;
mod serde_millis;
pub mod stream;

pub use crate::config::{
    ConverterConfig, DetectorConfig, FileProcessOptions, ProcessorConfig, StreamOptions,
};
pub use crate::convert::{ConversionOutcome, Converter};
pub use crate::detection::{
    CharsetOracle, ChardetngOracle, DetectionMethod, DetectionResult, Detector, OracleError,
    OracleGuess,
};
pub use crate::error::{Error, ErrorKind, FileOp, Operation};
pub use crate::file::{FileProcessResult, FileProcessor};
pub use crate::observe::{MetricsCollector, Observer, ProcessingStats, TracingObserver};
pub use crate::processor::Processor;
pub use crate::stream::{
    CancellationToken, StreamProcessor, StreamResult, TranscodingReader, TranscodingWriter,
};

/// Result type for encoding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Supported character encodings
///
/// The catalog is closed: every variant is bound to its decode and encode
/// primitives at compile time, so a label that parses into an `Encoding` can
/// always be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Encoding {
    // Unicode encodings
    /// UTF-8 Unicode encoding (variable length, 1-4 bytes)
    #[serde(rename = "UTF-8")]
    UTF8,
    /// UTF-16LE Unicode encoding (little endian)
    #[serde(rename = "UTF-16LE")]
    UTF16LE,
    /// UTF-16BE Unicode encoding (big endian)
    #[serde(rename = "UTF-16BE")]
    UTF16BE,
    /// UTF-32LE Unicode encoding (little endian)
    #[serde(rename = "UTF-32LE")]
    UTF32LE,
    /// UTF-32BE Unicode encoding (big endian)
    #[serde(rename = "UTF-32BE")]
    UTF32BE,

    // Chinese encodings
    /// GBK (Simplified Chinese, superset of GB2312)
    #[serde(rename = "GBK")]
    GBK,
    /// GB18030 (Simplified Chinese, full Unicode coverage)
    #[serde(rename = "GB18030")]
    GB18030,
    /// Big5 (Traditional Chinese)
    #[serde(rename = "BIG5")]
    BIG5,

    // Japanese and Korean encodings
    /// Shift-JIS (Japanese)
    #[serde(rename = "SHIFT_JIS")]
    SHIFT_JIS,
    /// EUC-JP (Japanese)
    #[serde(rename = "EUC-JP")]
    EUC_JP,
    /// EUC-KR (Korean)
    #[serde(rename = "EUC-KR")]
    EUC_KR,

    // ISO-8859 series
    /// ISO-8859-1 (Latin-1) - Western European
    #[serde(rename = "ISO-8859-1")]
    ISO_8859_1,
    /// ISO-8859-2 (Latin-2) - Central/Eastern European
    #[serde(rename = "ISO-8859-2")]
    ISO_8859_2,
    /// ISO-8859-5 (Cyrillic)
    #[serde(rename = "ISO-8859-5")]
    ISO_8859_5,
    /// ISO-8859-15 (Latin-9) - Western European with Euro
    #[serde(rename = "ISO-8859-15")]
    ISO_8859_15,

    // Windows code pages
    /// Windows-1250 (Central/Eastern European)
    #[serde(rename = "WINDOWS-1250")]
    WINDOWS_1250,
    /// Windows-1251 (Cyrillic)
    #[serde(rename = "WINDOWS-1251")]
    WINDOWS_1251,
    /// Windows-1252 (Western European)
    #[serde(rename = "WINDOWS-1252")]
    WINDOWS_1252,
    /// Windows-1254 (Turkish)
    #[serde(rename = "WINDOWS-1254")]
    WINDOWS_1254,

    // Other legacy encodings
    /// KOI8-R (Russian)
    #[serde(rename = "KOI8-R")]
    KOI8_R,
    /// DOS Code Page 866 (Russian OEM)
    #[serde(rename = "CP866")]
    CP_866,
    /// Macintosh Roman
    #[serde(rename = "MACINTOSH")]
    MAC_ROMAN,
}

impl Encoding {
    /// Every encoding in the catalog, Unicode first.
    pub const ALL: [Encoding; 22] = [
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
        Encoding::ISO_8859_2,
        Encoding::ISO_8859_5,
        Encoding::ISO_8859_15,
        Encoding::WINDOWS_1250,
        Encoding::WINDOWS_1251,
        Encoding::WINDOWS_1252,
        Encoding::WINDOWS_1254,
        Encoding::KOI8_R,
        Encoding::CP_866,
        Encoding::MAC_ROMAN,
    ];

    /// Get the canonical name of this encoding
    pub fn name(self) -> &'static str {
        match self {
            // Unicode
            Encoding::UTF8 => "UTF-8",
            Encoding::UTF16LE => "UTF-16LE",
            Encoding::UTF16BE => "UTF-16BE",
            Encoding::UTF32LE => "UTF-32LE",
            Encoding::UTF32BE => "UTF-32BE",

            // Chinese
            Encoding::GBK => "GBK",
            Encoding::GB18030 => "GB18030",
            Encoding::BIG5 => "BIG5",

            // Japanese / Korean
            Encoding::SHIFT_JIS => "SHIFT_JIS",
            Encoding::EUC_JP => "EUC-JP",
            Encoding::EUC_KR => "EUC-KR",

            // ISO-8859
            Encoding::ISO_8859_1 => "ISO-8859-1",
            Encoding::ISO_8859_2 => "ISO-8859-2",
            Encoding::ISO_8859_5 => "ISO-8859-5",
            Encoding::ISO_8859_15 => "ISO-8859-15",

            // Windows
            Encoding::WINDOWS_1250 => "WINDOWS-1250",
            Encoding::WINDOWS_1251 => "WINDOWS-1251",
            Encoding::WINDOWS_1252 => "WINDOWS-1252",
            Encoding::WINDOWS_1254 => "WINDOWS-1254",

            // Other
            Encoding::KOI8_R => "KOI8-R",
            Encoding::CP_866 => "CP866",
            Encoding::MAC_ROMAN => "MACINTOSH",
        }
    }

    /// Resolve a label as produced by detectors, HTTP headers, or users.
    ///
    /// Matching ignores case and the separators `-`, `_`, and space, and
    /// accepts the common aliases (`GB2312`, `cp1252`, `latin1`, `sjis`, ...).
    pub fn from_label(label: &str) -> Option<Encoding> {
        let compact: String = label
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let encoding = match compact.as_str() {
            "UTF8" | "UNICODE11UTF8" => Encoding::UTF8,
            "UTF16LE" | "UTF16" => Encoding::UTF16LE,
            "UTF16BE" => Encoding::UTF16BE,
            "UTF32LE" | "UTF32" => Encoding::UTF32LE,
            "UTF32BE" => Encoding::UTF32BE,

            "GBK" | "GB2312" | "CP936" | "XGBK" | "WINDOWS936" | "EUCCN" => Encoding::GBK,
            "GB18030" => Encoding::GB18030,
            "BIG5" | "BIG5HKSCS" | "CP950" | "XXBIG5" => Encoding::BIG5,

            "SHIFTJIS" | "SJIS" | "MSKANJI" | "CP932" | "WINDOWS31J" | "XSJIS" => {
                Encoding::SHIFT_JIS
            }
            "EUCJP" | "XEUCJP" => Encoding::EUC_JP,
            "EUCKR" | "CP949" | "WINDOWS949" | "KSC56011987" => Encoding::EUC_KR,

            "ISO88591" | "LATIN1" | "L1" | "ISOIR100" => Encoding::ISO_8859_1,
            "ISO88592" | "LATIN2" | "L2" => Encoding::ISO_8859_2,
            "ISO88595" | "CYRILLIC" => Encoding::ISO_8859_5,
            "ISO885915" | "LATIN9" | "L9" => Encoding::ISO_8859_15,

            "WINDOWS1250" | "WIN1250" | "CP1250" => Encoding::WINDOWS_1250,
            "WINDOWS1251" | "WIN1251" | "CP1251" => Encoding::WINDOWS_1251,
            "WINDOWS1252" | "WIN1252" | "CP1252" => Encoding::WINDOWS_1252,
            "WINDOWS1254" | "WIN1254" | "CP1254" => Encoding::WINDOWS_1254,

            "KOI8R" | "KOI8" => Encoding::KOI8_R,
            "CP866" | "IBM866" | "DOS866" => Encoding::CP_866,
            "MACINTOSH" | "MACROMAN" | "XMACROMAN" | "MAC" => Encoding::MAC_ROMAN,

            _ => return None,
        };

        Some(encoding)
    }

    /// Check if this encoding is ASCII-compatible (ASCII bytes 0-127 have same meaning)
    pub fn is_ascii_compatible(self) -> bool {
        !matches!(
            self,
            Encoding::UTF16LE | Encoding::UTF16BE | Encoding::UTF32LE | Encoding::UTF32BE
        )
    }

    /// Check if this encoding uses variable-length or wide character representation
    pub fn is_multibyte(self) -> bool {
        matches!(
            self,
            Encoding::UTF8
                | Encoding::UTF16LE
                | Encoding::UTF16BE
                | Encoding::UTF32LE
                | Encoding::UTF32BE
                | Encoding::GBK
                | Encoding::GB18030
                | Encoding::BIG5
                | Encoding::SHIFT_JIS
                | Encoding::EUC_JP
                | Encoding::EUC_KR
        )
    }

    /// Check if this is one of the Unicode transformation formats
    pub fn is_unicode(self) -> bool {
        matches!(
            self,
            Encoding::UTF8
                | Encoding::UTF16LE
                | Encoding::UTF16BE
                | Encoding::UTF32LE
                | Encoding::UTF32BE
        )
    }

    /// Check if this is a legacy double-byte CJK encoding
    pub fn is_legacy_cjk(self) -> bool {
        matches!(
            self,
            Encoding::GBK
                | Encoding::GB18030
                | Encoding::BIG5
                | Encoding::SHIFT_JIS
                | Encoding::EUC_JP
                | Encoding::EUC_KR
        )
    }

    /// Get the byte order mark (BOM) for this encoding if it has one
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            Encoding::UTF8 => Some(&[0xEF, 0xBB, 0xBF]),
            Encoding::UTF16LE => Some(&[0xFF, 0xFE]),
            Encoding::UTF16BE => Some(&[0xFE, 0xFF]),
            Encoding::UTF32LE => Some(&[0xFF, 0xFE, 0x00, 0x00]),
            Encoding::UTF32BE => Some(&[0x00, 0x00, 0xFE, 0xFF]),
            _ => None,
        }
    }

    /// Language most commonly written in this encoding, if it is specific to one
    pub fn language_hint(self) -> Option<&'static str> {
        match self {
            Encoding::GBK | Encoding::GB18030 | Encoding::BIG5 => Some("zh"),
            Encoding::SHIFT_JIS | Encoding::EUC_JP => Some("ja"),
            Encoding::EUC_KR => Some("ko"),
            Encoding::WINDOWS_1251 | Encoding::KOI8_R | Encoding::CP_866 | Encoding::ISO_8859_5 => {
                Some("ru")
            }
            Encoding::WINDOWS_1254 => Some("tr"),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Encoding::from_label(s).ok_or_else(|| Error::UnsupportedEncoding {
            label: s.to_string(),
            op: Operation::Convert,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_properties() {
        assert_eq!(Encoding::UTF8.name(), "UTF-8");
        assert_eq!(Encoding::SHIFT_JIS.name(), "SHIFT_JIS");
        assert!(Encoding::UTF8.is_ascii_compatible());
        assert!(!Encoding::UTF16LE.is_ascii_compatible());
        assert!(Encoding::GBK.is_multibyte());
        assert!(!Encoding::WINDOWS_1252.is_multibyte());
        assert!(Encoding::BIG5.is_legacy_cjk());
        assert!(!Encoding::UTF8.is_legacy_cjk());
    }

    #[test]
    fn test_bom_signatures() {
        assert_eq!(Encoding::UTF8.bom(), Some([0xEF, 0xBB, 0xBF].as_slice()));
        assert_eq!(Encoding::UTF16LE.bom(), Some([0xFF, 0xFE].as_slice()));
        assert_eq!(
            Encoding::UTF32BE.bom(),
            Some([0x00, 0x00, 0xFE, 0xFF].as_slice())
        );
        assert_eq!(Encoding::WINDOWS_1252.bom(), None);
    }

    #[test]
    fn test_label_aliases() {
        assert_eq!(Encoding::from_label("gb2312"), Some(Encoding::GBK));
        assert_eq!(Encoding::from_label("windows-1252"), Some(Encoding::WINDOWS_1252));
        assert_eq!(Encoding::from_label("Shift_JIS"), Some(Encoding::SHIFT_JIS));
        assert_eq!(Encoding::from_label("IBM866"), Some(Encoding::CP_866));
        assert_eq!(Encoding::from_label("Big5"), Some(Encoding::BIG5));
        assert_eq!(Encoding::from_label(" utf_8 "), Some(Encoding::UTF8));
        assert_eq!(Encoding::from_label("KOI8-U"), None);
        assert_eq!(Encoding::from_label("INVALID_ENCODING"), None);
    }

    #[test]
    fn test_canonical_names_round_trip_through_labels() {
        for encoding in Encoding::ALL {
            assert_eq!(Encoding::from_label(encoding.name()), Some(encoding));
        }
    }

    #[test]
    fn test_from_str_unknown_label_is_unsupported() {
        let err = "EBCDIC-037".parse::<Encoding>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedEncoding);
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&Encoding::EUC_KR).unwrap();
        assert_eq!(json, "\"EUC-KR\"");
        let back: Encoding = serde_json::from_str("\"GB18030\"").unwrap();
        assert_eq!(back, Encoding::GB18030);
    }
}
