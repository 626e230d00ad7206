//! Statistical charset ranking.
//!
//! The detector treats the oracle as an opaque heuristic: it hands over a
//! sample and receives labels with 0-100 confidences. [`ChardetngOracle`] is
//! the default; tests and embedders can supply their own [`CharsetOracle`].

use encoding_rs::DecoderResult;
use thiserror::Error;

use crate::Encoding;

/// One ranked answer from a [`CharsetOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleGuess {
    /// Oracle-specific label, normalized through [`Encoding::from_label`]
    pub label: String,
    /// Confidence from 0 to 100
    pub confidence: u8,
    /// Language tag, when the oracle knows it
    pub language: Option<String>,
}

impl OracleGuess {
    /// Build a guess without a language tag.
    pub fn new(label: impl Into<String>, confidence: u8) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.min(100),
            language: None,
        }
    }
}

/// The oracle could not rank the sample.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("charset oracle failed: {0}")]
pub struct OracleError(pub String);

/// Frequency-based multi-candidate charset ranking.
pub trait CharsetOracle: Send + Sync {
    /// Rank candidate encodings for `sample`, best first.
    fn rank(&self, sample: &[u8]) -> Result<Vec<OracleGuess>, OracleError>;

    /// Short name for logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Regional hints tried after the unhinted guess, each of which biases
/// chardetng toward the legacy encodings of that region.
const TLD_HINTS: [&[u8]; 8] = [b"cn", b"tw", b"jp", b"kr", b"ru", b"pl", b"gr", b"tr"];

/// [`CharsetOracle`] backed by `chardetng`.
///
/// chardetng returns a single best guess per top-level-domain hint. The
/// unhinted guess ranks first; distinct hinted guesses follow. Each guess is
/// weighted by whether the sample actually decodes under it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChardetngOracle;

impl ChardetngOracle {
    /// Create the oracle.
    pub fn new() -> Self {
        Self
    }
}

impl CharsetOracle for ChardetngOracle {
    fn rank(&self, sample: &[u8]) -> Result<Vec<OracleGuess>, OracleError> {
        if sample.is_empty() {
            return Err(OracleError("empty sample".to_string()));
        }

        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(sample, true);

        let mut seen: Vec<&'static encoding_rs::Encoding> = Vec::with_capacity(TLD_HINTS.len() + 1);
        let mut guesses = Vec::with_capacity(TLD_HINTS.len() + 1);

        let primary = detector.guess(None, true);
        seen.push(primary);
        guesses.push(to_guess(primary, sample, true));

        for tld in TLD_HINTS {
            let hinted = detector.guess(Some(tld), true);
            if !seen.contains(&hinted) {
                seen.push(hinted);
                guesses.push(to_guess(hinted, sample, false));
            }
        }

        guesses.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        Ok(guesses)
    }

    fn name(&self) -> &'static str {
        "chardetng"
    }
}

fn to_guess(encoding: &'static encoding_rs::Encoding, sample: &[u8], primary: bool) -> OracleGuess {
    let confidence = match (primary, decodes_cleanly(encoding, sample)) {
        (true, true) => 90,
        (false, true) => 60,
        (true, false) => 40,
        (false, false) => 20,
    };
    let language = Encoding::from_label(encoding.name())
        .and_then(Encoding::language_hint)
        .map(str::to_string);
    OracleGuess {
        label: encoding.name().to_string(),
        confidence,
        language,
    }
}

/// A trailing incomplete sequence is not an error: the sample may have been
/// cut mid-character.
fn decodes_cleanly(encoding: &'static encoding_rs::Encoding, sample: &[u8]) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let Some(capacity) = decoder.max_utf8_buffer_length_without_replacement(sample.len()) else {
        return false;
    };
    let mut text = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(sample, &mut text, false);
    matches!(result, DecoderResult::InputEmpty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sample_is_an_error() {
        assert!(ChardetngOracle::new().rank(b"").is_err());
    }

    #[test]
    fn test_ranks_are_sorted_and_distinct() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Привет, как дела? Это тестовый текст на русском языке.");
        let guesses = ChardetngOracle::new().rank(&bytes).unwrap();
        assert!(!guesses.is_empty());
        assert!(guesses.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        let mut labels: Vec<_> = guesses.iter().map(|g| g.label.clone()).collect();
        labels.dedup();
        assert_eq!(labels.len(), guesses.len());
    }

    #[test]
    fn test_cyrillic_primary_guess() {
        let text = "Съешь же ещё этих мягких французских булок, да выпей чаю. ".repeat(4);
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(&text);
        let guesses = ChardetngOracle::new().rank(&bytes).unwrap();
        assert_eq!(guesses[0].label, "windows-1251");
        assert_eq!(guesses[0].confidence, 90);
        assert_eq!(guesses[0].language.as_deref(), Some("ru"));
    }

    #[test]
    fn test_truncated_sample_still_decodes_cleanly() {
        let (bytes, _, _) = encoding_rs::GBK.encode("中文");
        assert!(decodes_cleanly(encoding_rs::GBK, &bytes[..3]));
        assert!(!decodes_cleanly(encoding_rs::UTF_8, b"\xFFabc"));
    }
}
