//! Heuristic rescoring of ambiguous candidates.
//!
//! Legacy double-byte encodings overlap heavily: GBK bytes often decode
//! cleanly as Big5 and vice versa, into text that is valid but meaningless.
//! Each candidate is decoded in full and judged by what the text looks like.

use crate::Encoding;
use crate::codec;

const WEIGHT_ORACLE: f64 = 0.4;
const WEIGHT_SCRIPT: f64 = 0.3;
const WEIGHT_VALIDITY: f64 = 0.2;
const WEIGHT_ARTIFACTS: f64 = 0.1;

/// Share of the script component given to the in-block ratio; the rest goes
/// to the high-frequency character ratio.
const BLOCK_SHARE: f64 = 0.7;

/// A candidate that fails to decode keeps this fraction of its oracle weight.
const UNDECODABLE_FACTOR: f64 = 0.1;

/// Above this share of 0xA1..=0xFE bytes, the sample is treated as legacy CJK.
const CJK_BYTE_RATIO: f64 = 0.3;

const PREVIEW_CHARS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    SimplifiedHan,
    TraditionalHan,
    Japanese,
    Hangul,
    Cyrillic,
    Latin,
    Any,
}

impl Script {
    fn of(encoding: Encoding) -> Self {
        match encoding {
            Encoding::GBK | Encoding::GB18030 => Script::SimplifiedHan,
            Encoding::BIG5 => Script::TraditionalHan,
            Encoding::SHIFT_JIS | Encoding::EUC_JP => Script::Japanese,
            Encoding::EUC_KR => Script::Hangul,
            Encoding::WINDOWS_1251 | Encoding::KOI8_R | Encoding::CP_866 | Encoding::ISO_8859_5 => {
                Script::Cyrillic
            }
            Encoding::ISO_8859_1
            | Encoding::ISO_8859_2
            | Encoding::ISO_8859_15
            | Encoding::WINDOWS_1250
            | Encoding::WINDOWS_1252
            | Encoding::WINDOWS_1254
            | Encoding::MAC_ROMAN => Script::Latin,
            Encoding::UTF8
            | Encoding::UTF16LE
            | Encoding::UTF16BE
            | Encoding::UTF32LE
            | Encoding::UTF32BE => Script::Any,
        }
    }

    fn contains(self, ch: char) -> bool {
        let cp = u32::from(ch);
        let han = matches!(cp, 0x4E00..=0x9FFF | 0x3400..=0x4DBF);
        let cjk_punct = matches!(cp, 0x3000..=0x303F | 0xFF00..=0xFFEF);
        match self {
            Script::SimplifiedHan | Script::TraditionalHan => han || cjk_punct,
            Script::Japanese => han || cjk_punct || matches!(cp, 0x3040..=0x30FF),
            Script::Hangul => {
                cjk_punct || han || matches!(cp, 0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F)
            }
            Script::Cyrillic => {
                matches!(cp, 0x0400..=0x04FF | 0x00A0..=0x00BB | 0x2013..=0x2026 | 0x2116)
            }
            Script::Latin => matches!(cp, 0x00A0..=0x024F | 0x2010..=0x20AC),
            Script::Any => ch.is_alphabetic(),
        }
    }

    fn common(self) -> &'static str {
        match self {
            Script::SimplifiedHan => "的一是在不了有和人这中大为上个文件作者时们来说国到",
            Script::TraditionalHan => "的一是在不了有和人這中大為上個們來說國到時會",
            Script::Japanese => "のにはをたがでてとしれさいあるこです。、",
            Script::Hangul => "이다는의에가을를고하한지서기로요",
            Script::Cyrillic => "оеаинтсрвлкмдпуяы",
            Script::Latin => "éèàáíóúñçüöäßâêô",
            Script::Any => "",
        }
    }
}

/// Outcome of rescoring one candidate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Scored {
    pub(crate) score: f64,
    pub(crate) decodable: bool,
    pub(crate) preview: String,
}

/// Share of bytes in the 0xA1..=0xFE range shared by the GB, Big5, and EUC lead tables.
pub(crate) fn high_byte_ratio(sample: &[u8]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let high = sample.iter().filter(|&&b| (0xA1..=0xFE).contains(&b)).count();
    high as f64 / sample.len() as f64
}

/// Whether the sample looks like legacy double-byte CJK text.
pub(crate) fn looks_like_cjk(sample: &[u8]) -> bool {
    high_byte_ratio(sample) > CJK_BYTE_RATIO
}

/// Decode `sample` as `encoding`. A cut-off trailing sequence is tolerated
/// when the sample was truncated from a longer input.
pub(crate) fn decode_sample(sample: &[u8], encoding: Encoding, truncated: bool) -> Option<String> {
    if truncated {
        codec::decode_prefix(sample, encoding)
    } else {
        codec::decode_strict(sample, encoding)
    }
}

/// Score `encoding` as an interpretation of `sample`.
pub(crate) fn score(sample: &[u8], encoding: Encoding, oracle_confidence: f64, truncated: bool) -> Scored {
    let Some(text) = decode_sample(sample, encoding, truncated) else {
        let (lossy, _) = codec::decode_lossy(sample, encoding);
        return Scored {
            score: WEIGHT_ORACLE * oracle_confidence * UNDECODABLE_FACTOR,
            decodable: false,
            preview: preview(&lossy),
        };
    };

    let script = Script::of(encoding);
    let common = script.common();

    let mut total = 0usize;
    let mut non_ascii = 0usize;
    let mut in_block = 0usize;
    let mut frequent = 0usize;
    let mut artifacts = 0usize;

    for ch in text.chars() {
        total += 1;
        if is_artifact(ch) {
            artifacts += 1;
        }
        if ch.is_ascii() {
            continue;
        }
        non_ascii += 1;
        if script.contains(ch) {
            in_block += 1;
        }
        if common.contains(ch) {
            frequent += 1;
        }
    }

    let ratio = |part: usize, whole: usize| if whole == 0 { 0.0 } else { part as f64 / whole as f64 };
    let script_score =
        BLOCK_SHARE * ratio(in_block, non_ascii) + (1.0 - BLOCK_SHARE) * ratio(frequent, non_ascii);
    let penalty = ratio(artifacts, total);

    Scored {
        score: WEIGHT_ORACLE * oracle_confidence
            + WEIGHT_SCRIPT * script_score
            + WEIGHT_VALIDITY
            + WEIGHT_ARTIFACTS * (1.0 - penalty),
        decodable: true,
        preview: preview(&text),
    }
}

fn is_artifact(ch: char) -> bool {
    ch == char::REPLACEMENT_CHARACTER
        || (ch.is_control() && !matches!(ch, '\t' | '\n' | '\r'))
        || matches!(u32::from(ch), 0xE000..=0xF8FF)
}

pub(crate) fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
