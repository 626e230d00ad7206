//! Cascading encoding detection.
//!
//! Tiers run in a fixed order and the first one that answers wins:
//!
//! 1. **BOM**: an exact Unicode signature prefix, confidence 1.0.
//! 2. **UTF-8 validation**: the whole sample is valid UTF-8; 0.99 when it
//!    contains non-ASCII text, 0.85 for pure ASCII.
//! 3. **Statistical**: a [`CharsetOracle`] ranks candidates.
//! 4. **Heuristic**: when the sample looks like legacy double-byte CJK, every
//!    candidate is decoded and rescored on what the text looks like.
//!
//! Results are memoized by a SHA-256 of the sample when caching is enabled.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::DetectorConfig;
use crate::{Encoding, Error, FileOp, Operation, Result};

mod bom;
mod cache;
mod oracle;
mod scorer;

pub(crate) use self::bom::bom_len;
pub use self::cache::CacheStats;
use self::cache::DetectionCache;
pub use self::oracle::{CharsetOracle, ChardetngOracle, OracleError, OracleGuess};

/// Confidence of a valid UTF-8 sample containing non-ASCII text.
const UTF8_CONFIDENCE: f64 = 0.99;
/// Confidence of a pure-ASCII sample, which many encodings would accept.
const ASCII_CONFIDENCE: f64 = 0.85;
/// Confidence given to GB/Big5 candidates the oracle did not propose.
const INJECTED_CONFIDENCE: f64 = 0.05;
/// Added to the winning preferred encoding.
const PREFERENCE_BOOST: f64 = 0.2;

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Byte-order mark
    Bom,
    /// Strict UTF-8 validation
    Utf8Validation,
    /// Charset oracle ranking
    Statistical,
    /// Oracle ranking rescored by decoded-text heuristics
    Heuristic,
}

impl DetectionMethod {
    /// Stable name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::Bom => "bom",
            DetectionMethod::Utf8Validation => "utf8_validation",
            DetectionMethod::Statistical => "statistical",
            DetectionMethod::Heuristic => "heuristic",
        }
    }
}

/// Score of one candidate considered by the statistical or heuristic tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    /// Candidate encoding
    pub encoding: Encoding,
    /// Oracle confidence normalized to [0, 1]
    pub oracle_confidence: f64,
    /// Confidence after rescoring; equals `oracle_confidence` without rescoring
    pub score: f64,
    /// Whether the sample decodes under this encoding
    pub decodable: bool,
}

/// How a result was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Tier that answered
    pub method: DetectionMethod,
    /// Every candidate considered, in oracle order
    pub candidates: Vec<CandidateScore>,
    /// The oracle's top label, verbatim
    pub oracle_label: Option<String>,
    /// Start of the sample decoded with the winning encoding (heuristic tier only)
    pub preview: Option<String>,
}

impl Diagnostics {
    pub(crate) fn new(method: DetectionMethod) -> Self {
        Self {
            method,
            candidates: Vec::new(),
            oracle_label: None,
            preview: None,
        }
    }
}

/// A detection verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    /// Most likely encoding
    pub encoding: Encoding,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    /// Language tag, when the encoding or oracle implies one
    pub language: Option<String>,
    /// Whether a BOM was detected
    pub bom_detected: bool,
    /// Method and raw scores
    pub diagnostics: Diagnostics,
}

impl DetectionResult {
    fn certain(encoding: Encoding, method: DetectionMethod, confidence: f64) -> Self {
        Self {
            encoding,
            confidence,
            language: None,
            bom_detected: method == DetectionMethod::Bom,
            diagnostics: Diagnostics::new(method),
        }
    }
}

struct Candidate {
    encoding: Encoding,
    oracle_confidence: f64,
    confidence: f64,
    decodable: bool,
    language: Option<String>,
    preview: Option<String>,
}

/// Multi-tier encoding detector.
///
/// ```rust
/// use encoding_processor::{Detector, DetectorConfig, Encoding};
///
/// let detector = Detector::new(DetectorConfig::default()).unwrap();
/// let result = detector.detect("héllo wörld".as_bytes()).unwrap();
/// assert_eq!(result.encoding, Encoding::UTF8);
/// assert!(result.confidence >= 0.85);
/// ```
pub struct Detector {
    config: DetectorConfig,
    oracle: Arc<dyn CharsetOracle>,
    cache: Option<DetectionCache>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("config", &self.config)
            .field("oracle", &self.oracle.name())
            .field("cache", &self.cache.as_ref().map(DetectionCache::stats))
            .finish()
    }
}

impl Detector {
    /// Create a detector backed by [`ChardetngOracle`].
    pub fn new(config: DetectorConfig) -> Result<Self> {
        Self::with_oracle(config, Arc::new(ChardetngOracle::new()))
    }

    /// Create a detector with a custom statistical oracle.
    pub fn with_oracle(config: DetectorConfig, oracle: Arc<dyn CharsetOracle>) -> Result<Self> {
        config.validate()?;
        let cache = config
            .enable_cache
            .then(|| DetectionCache::new(config.cache_size, config.cache_ttl));
        Ok(Self {
            config,
            oracle,
            cache,
        })
    }

    /// The active policy.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect the encoding of `data`, examining at most `sample_size` bytes.
    pub fn detect(&self, data: &[u8]) -> Result<DetectionResult> {
        self.detect_head(data, self.config.sample_size, false)
    }

    /// Detect from the first `sample_size` bytes of `data`, which may itself
    /// be the head of a longer input. With `more_follows`, a character cut
    /// off at the end of `data` is not held against any candidate.
    pub(crate) fn detect_head(
        &self,
        data: &[u8],
        sample_size: usize,
        more_follows: bool,
    ) -> Result<DetectionResult> {
        if data.is_empty() {
            return Err(Error::invalid_input(
                Operation::Detect,
                "cannot detect the encoding of empty input",
            ));
        }

        let sample_size = sample_size.max(1);
        let truncated = more_follows || data.len() > sample_size;
        let sample = &data[..data.len().min(sample_size)];

        let Some(cache) = &self.cache else {
            return self.detect_sample(sample, truncated);
        };

        let key = DetectionCache::key(sample, truncated);
        if let Some(hit) = cache.get(&key) {
            debug!(encoding = %hit.encoding, confidence = hit.confidence, "detection_cache_hit");
            return Ok(hit);
        }

        let result = self.detect_sample(sample, truncated)?;
        cache.put(key, result.clone());
        Ok(result)
    }

    /// Detect and return only the encoding.
    pub fn detect_best_encoding(&self, data: &[u8]) -> Result<Encoding> {
        self.detect(data).map(|result| result.encoding)
    }

    /// Detect the encoding of a file from its first `sample_size` bytes.
    pub fn detect_file(&self, path: impl AsRef<Path>) -> Result<DetectionResult> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| Error::io(FileOp::Read, path, err))?;

        // One extra byte tells a truncated sample from a whole file.
        let limit = self.config.sample_size as u64 + 1;
        let mut head = Vec::with_capacity(self.config.sample_size + 1);
        file.take(limit)
            .read_to_end(&mut head)
            .map_err(|err| Error::io(FileOp::Read, path, err))?;

        let more_follows = head.len() > self.config.sample_size;
        head.truncate(self.config.sample_size);
        self.detect_head(&head, self.config.sample_size, more_follows)
            .map_err(|err| err.with_path(path))
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Cache counters, or `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(DetectionCache::stats)
    }

    fn detect_sample(&self, sample: &[u8], truncated: bool) -> Result<DetectionResult> {
        if let Some((encoding, _)) = bom::sniff(sample) {
            return Ok(DetectionResult::certain(encoding, DetectionMethod::Bom, 1.0));
        }

        if let Some(confidence) = utf8_confidence(sample, truncated) {
            return Ok(DetectionResult::certain(
                Encoding::UTF8,
                DetectionMethod::Utf8Validation,
                confidence,
            ));
        }

        self.detect_statistical(sample, truncated)
    }

    fn detect_statistical(&self, sample: &[u8], truncated: bool) -> Result<DetectionResult> {
        let guesses = self
            .oracle
            .rank(sample)
            .map_err(|err| Error::detection_failed(err.to_string()))?;

        let Some(top) = guesses.first() else {
            return Err(Error::detection_failed(format!(
                "{} returned no candidates",
                self.oracle.name()
            )));
        };
        let oracle_label = top.label.clone();
        if Encoding::from_label(&oracle_label).is_none() {
            return Err(Error::UnsupportedEncoding {
                label: oracle_label,
                op: Operation::Detect,
            });
        }

        let mut candidates: Vec<Candidate> = Vec::with_capacity(guesses.len() + 3);
        for guess in &guesses {
            // Lower-ranked labels outside the catalog are simply not candidates.
            let Some(encoding) = Encoding::from_label(&guess.label) else {
                continue;
            };
            if candidates.iter().any(|c| c.encoding == encoding) {
                continue;
            }
            let confidence = f64::from(guess.confidence.min(100)) / 100.0;
            candidates.push(Candidate {
                encoding,
                oracle_confidence: confidence,
                confidence,
                decodable: scorer::decode_sample(sample, encoding, truncated).is_some(),
                language: guess.language.clone(),
                preview: None,
            });
        }

        let cjk_candidates = candidates.iter().filter(|c| c.encoding.is_legacy_cjk()).count();
        let ambiguous = scorer::looks_like_cjk(sample) || cjk_candidates >= 2;
        let method = if ambiguous {
            for encoding in [Encoding::GBK, Encoding::GB18030, Encoding::BIG5] {
                if !candidates.iter().any(|c| c.encoding == encoding) {
                    candidates.push(Candidate {
                        encoding,
                        oracle_confidence: INJECTED_CONFIDENCE,
                        confidence: INJECTED_CONFIDENCE,
                        decodable: false,
                        language: None,
                        preview: None,
                    });
                }
            }
            for candidate in &mut candidates {
                let scored = scorer::score(
                    sample,
                    candidate.encoding,
                    candidate.oracle_confidence,
                    truncated,
                );
                candidate.confidence = scored.score.min(1.0);
                candidate.decodable = scored.decodable;
                candidate.preview = Some(scored.preview);
            }
            DetectionMethod::Heuristic
        } else {
            DetectionMethod::Statistical
        };

        let winner = self.select(&candidates)?;
        let chosen = &candidates[winner.index];

        if !self.config.allows(chosen.encoding) {
            return Err(Error::UnsupportedEncoding {
                label: chosen.encoding.name().to_string(),
                op: Operation::Detect,
            });
        }

        debug!(
            oracle = self.oracle.name(),
            %oracle_label,
            method = method.as_str(),
            encoding = %chosen.encoding,
            confidence = winner.confidence,
            candidates = candidates.len(),
            "statistical_detection"
        );

        Ok(DetectionResult {
            encoding: chosen.encoding,
            confidence: winner.confidence,
            language: chosen
                .encoding
                .language_hint()
                .map(str::to_string)
                .or_else(|| chosen.language.clone()),
            bom_detected: false,
            diagnostics: Diagnostics {
                method,
                candidates: candidates
                    .iter()
                    .map(|c| CandidateScore {
                        encoding: c.encoding,
                        oracle_confidence: c.oracle_confidence,
                        score: c.confidence,
                        decodable: c.decodable,
                    })
                    .collect(),
                oracle_label: Some(oracle_label),
                preview: chosen.preview.clone(),
            },
        })
    }

    /// Pick the winner among candidates that decode and clear the threshold.
    fn select(&self, candidates: &[Candidate]) -> Result<Selection> {
        let min = self.config.min_confidence;
        let qualifies = |c: &Candidate| c.decodable && c.confidence >= min;

        for preferred in &self.config.preferred_encodings {
            if let Some(index) = candidates
                .iter()
                .position(|c| c.encoding == *preferred && qualifies(c))
            {
                return Ok(Selection {
                    index,
                    confidence: (candidates[index].confidence + PREFERENCE_BOOST).min(1.0),
                });
            }
        }

        let mut best: Option<usize> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if !qualifies(candidate) {
                continue;
            }
            // Strictly greater keeps the oracle's order on ties.
            if best.is_none_or(|b| candidate.confidence > candidates[b].confidence) {
                best = Some(index);
            }
        }

        match best {
            Some(index) => Ok(Selection {
                index,
                confidence: candidates[index].confidence,
            }),
            None => {
                let top = candidates
                    .iter()
                    .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
                Err(Error::detection_failed(match top {
                    Some(c) => format!(
                        "best candidate {} scored {:.2}, below the minimum of {:.2}",
                        c.encoding, c.confidence, min
                    ),
                    None => "no candidate encoding in the catalog".to_string(),
                }))
            }
        }
    }
}

struct Selection {
    index: usize,
    confidence: f64,
}

/// Confidence of the UTF-8 tier, or `None` if the sample is not UTF-8.
///
/// A truncated sample may end mid-character; that is not a failure.
fn utf8_confidence(sample: &[u8], truncated: bool) -> Option<f64> {
    let valid = match std::str::from_utf8(sample) {
        Ok(_) => sample,
        Err(err) if truncated && err.error_len().is_none() => &sample[..err.valid_up_to()],
        Err(_) => return None,
    };
    if valid.is_ascii() {
        Some(ASCII_CONFIDENCE)
    } else {
        Some(UTF8_CONFIDENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOracle {
        guesses: Vec<OracleGuess>,
        calls: AtomicUsize,
    }

    impl FixedOracle {
        fn new(guesses: &[(&str, u8)]) -> Arc<Self> {
            Arc::new(Self {
                guesses: guesses
                    .iter()
                    .map(|&(label, confidence)| OracleGuess::new(label, confidence))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CharsetOracle for FixedOracle {
        fn rank(&self, _sample: &[u8]) -> std::result::Result<Vec<OracleGuess>, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.guesses.clone())
        }
    }

    struct FailingOracle;

    impl CharsetOracle for FailingOracle {
        fn rank(&self, _sample: &[u8]) -> std::result::Result<Vec<OracleGuess>, OracleError> {
            Err(OracleError("model unavailable".to_string()))
        }
    }

    const LATIN1_TEXT: &[u8] = b"caf\xE9 cr\xE8me br\xFBl\xE9e";

    #[test]
    fn test_empty_input_is_invalid() {
        let detector = Detector::new(DetectorConfig::default()).unwrap();
        let err = detector.detect(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_cut_sample_does_not_answer_for_whole_input() {
        fn outcome(
            result: Result<DetectionResult>,
        ) -> std::result::Result<(Encoding, f64), ErrorKind> {
            result
                .map(|r| (r.encoding, r.confidence))
                .map_err(|err| err.kind())
        }

        let config = DetectorConfig::default().with_sample_size(4);
        let oracle = FixedOracle::new(&[("Big5", 95)]);
        let cached = Detector::with_oracle(config.clone(), oracle.clone()).unwrap();
        let uncached = Detector::with_oracle(config.without_cache(), oracle).unwrap();

        let text = "中文".as_bytes();
        assert_eq!(cached.detect(text).unwrap().encoding, Encoding::UTF8);

        // Same four sampled bytes, but now they are the whole input.
        let head = &text[..4];
        let served = outcome(cached.detect(head));
        assert_eq!(cached.cache_stats().unwrap().hits, 0);
        assert_eq!(served, outcome(uncached.detect(head)));
        assert!(!matches!(served, Ok((Encoding::UTF8, _))));
    }

    #[test]
    fn test_bom_short_circuits() {
        let oracle = FixedOracle::new(&[("GBK", 99)]);
        let detector = Detector::with_oracle(DetectorConfig::default(), oracle.clone()).unwrap();

        let result = detector.detect(b"\xEF\xBB\xBFhello").unwrap();
        assert_eq!(result.encoding, Encoding::UTF8);
        assert_eq!(result.confidence, 1.0);
        assert!(result.bom_detected);
        assert_eq!(result.diagnostics.method, DetectionMethod::Bom);

        let result = detector.detect(&[0xFF, 0xFE, 0x00, 0x00, 0x41, 0, 0, 0]).unwrap();
        assert_eq!(result.encoding, Encoding::UTF32LE);
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_utf8_confidence_levels() {
        let detector = Detector::new(DetectorConfig::default()).unwrap();

        let result = detector.detect("Hello, 世界".as_bytes()).unwrap();
        assert_eq!(result.encoding, Encoding::UTF8);
        assert_eq!(result.confidence, 0.99);
        assert_eq!(result.diagnostics.method, DetectionMethod::Utf8Validation);

        let result = detector.detect(b"plain ascii").unwrap();
        assert_eq!(result.encoding, Encoding::UTF8);
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn test_sample_cut_mid_character_is_still_utf8() {
        let config = DetectorConfig::default().with_sample_size(4);
        let detector = Detector::new(config).unwrap();
        // 中文 is six bytes; the four-byte sample ends inside 文.
        let result = detector.detect("中文".as_bytes()).unwrap();
        assert_eq!(result.encoding, Encoding::UTF8);
        assert_eq!(result.confidence, 0.99);
    }

    #[test]
    fn test_cache_prevents_second_oracle_call() {
        let oracle = FixedOracle::new(&[("windows-1252", 95)]);
        let detector = Detector::with_oracle(DetectorConfig::default(), oracle.clone()).unwrap();

        let first = detector.detect(LATIN1_TEXT).unwrap();
        let second = detector.detect(LATIN1_TEXT).unwrap();
        assert_eq!(first, second);
        assert_eq!(oracle.calls(), 1);

        let stats = detector.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);

        detector.clear_cache();
        detector.detect(LATIN1_TEXT).unwrap();
        assert_eq!(oracle.calls(), 2);
    }

    #[test]
    fn test_disabled_cache_calls_oracle_each_time() {
        let oracle = FixedOracle::new(&[("windows-1252", 95)]);
        let config = DetectorConfig::default().without_cache();
        let detector = Detector::with_oracle(config, oracle.clone()).unwrap();
        detector.detect(LATIN1_TEXT).unwrap();
        detector.detect(LATIN1_TEXT).unwrap();
        assert_eq!(oracle.calls(), 2);
        assert!(detector.cache_stats().is_none());
    }

    #[test]
    fn test_preferred_encoding_overrides_ranking() {
        let oracle = FixedOracle::new(&[("windows-1252", 95), ("ISO-8859-1", 90)]);
        let config = DetectorConfig::default().with_preferred(vec![Encoding::ISO_8859_1]);
        let detector = Detector::with_oracle(config, oracle).unwrap();

        let result = detector.detect(LATIN1_TEXT).unwrap();
        assert_eq!(result.encoding, Encoding::ISO_8859_1);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.diagnostics.method, DetectionMethod::Statistical);
        assert_eq!(result.diagnostics.candidates.len(), 2);
    }

    #[test]
    fn test_highest_confidence_wins_without_preference() {
        let oracle = FixedOracle::new(&[("ISO-8859-1", 85), ("windows-1252", 95)]);
        let config = DetectorConfig::default().with_preferred(Vec::new());
        let detector = Detector::with_oracle(config, oracle).unwrap();

        let result = detector.detect(LATIN1_TEXT).unwrap();
        assert_eq!(result.encoding, Encoding::WINDOWS_1252);
        assert_eq!(result.confidence, 0.95);
        assert_eq!(
            result.diagnostics.oracle_label.as_deref(),
            Some("ISO-8859-1")
        );
    }

    #[test]
    fn test_below_threshold_fails() {
        let oracle = FixedOracle::new(&[("windows-1252", 50)]);
        let detector = Detector::with_oracle(DetectorConfig::default(), oracle).unwrap();
        let err = detector.detect(LATIN1_TEXT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DetectionFailed);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let oracle = FixedOracle::new(&[("windows-1252", 50)]);
        let detector = Detector::with_oracle(DetectorConfig::default(), oracle.clone()).unwrap();
        assert!(detector.detect(LATIN1_TEXT).is_err());
        assert!(detector.detect(LATIN1_TEXT).is_err());
        assert_eq!(oracle.calls(), 2);
    }

    #[test]
    fn test_oracle_error_becomes_detection_failed() {
        let detector =
            Detector::with_oracle(DetectorConfig::default(), Arc::new(FailingOracle)).unwrap();
        let err = detector.detect(LATIN1_TEXT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DetectionFailed);
        assert!(err.to_string().contains("model unavailable"));
    }

    #[test]
    fn test_unknown_label_is_unsupported() {
        let oracle = FixedOracle::new(&[("x-user-defined", 90)]);
        let detector = Detector::with_oracle(DetectorConfig::default(), oracle).unwrap();
        let err = detector.detect(LATIN1_TEXT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedEncoding);
    }

    #[test]
    fn test_allow_list_rejects_detected_encoding() {
        let oracle = FixedOracle::new(&[("KOI8-R", 95)]);
        let detector = Detector::with_oracle(DetectorConfig::default(), oracle.clone()).unwrap();
        let err = detector.detect(b"\xF0\xD2\xC9\xD7\xC5\xD4").unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncoding { ref label, .. } if label == "KOI8-R"));

        let mut config = DetectorConfig::default();
        config.supported_encodings.clear();
        let detector = Detector::with_oracle(config, oracle).unwrap();
        let result = detector.detect(b"\xF0\xD2\xC9\xD7\xC5\xD4").unwrap();
        assert_eq!(result.encoding, Encoding::KOI8_R);
        assert_eq!(result.language.as_deref(), Some("ru"));
    }

    #[test]
    fn test_ambiguous_cjk_is_rescored() {
        let text = "这是一个中文文件的测试内容，我们在这里写了很多字。";
        let (gbk, _, _) = encoding_rs::GBK.encode(text);
        let oracle = FixedOracle::new(&[("Big5", 70), ("GBK", 70)]);
        let config = DetectorConfig::default().with_preferred(Vec::new());
        let detector = Detector::with_oracle(config, oracle).unwrap();

        let result = detector.detect(&gbk).unwrap();
        assert_eq!(result.encoding, Encoding::GBK);
        assert_eq!(result.diagnostics.method, DetectionMethod::Heuristic);
        assert_eq!(result.diagnostics.preview.as_deref(), Some(text));
        assert_eq!(result.language.as_deref(), Some("zh"));
        // GB18030 was injected with a token oracle confidence.
        assert!(result
            .diagnostics
            .candidates
            .iter()
            .any(|c| c.encoding == Encoding::GB18030 && c.oracle_confidence == 0.05));
    }

    #[test]
    fn test_detect_file_reads_only_a_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        let mut content = "a".repeat(100);
        content.push_str("\u{00E9}");
        std::fs::write(&path, content).unwrap();

        let config = DetectorConfig::default().with_sample_size(16);
        let detector = Detector::new(config).unwrap();
        let result = detector.detect_file(&path).unwrap();
        assert_eq!(result.confidence, 0.85);

        let err = detector.detect_file(dir.path().join("missing.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileIo);
    }
}
