//! Operation observers.
//!
//! An [`Observer`] is told when public operations start, finish, or fail. It
//! never influences control flow. [`TracingObserver`] forwards to `tracing`;
//! [`MetricsCollector`] aggregates counters for later inspection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{DetectionResult, Encoding, Error, Operation};

/// Receives operation lifecycle notifications.
///
/// Every method has an empty default, so implementors override only what
/// they need.
pub trait Observer: Send + Sync {
    /// An operation began.
    fn operation_started(&self, _op: Operation) {}

    /// An operation completed after processing `bytes` input bytes.
    fn operation_finished(&self, _op: Operation, _bytes: u64, _elapsed: Duration) {}

    /// An operation failed.
    fn operation_failed(&self, _op: Operation, _error: &Error, _elapsed: Duration) {}

    /// A detection produced a verdict.
    fn encoding_detected(&self, _result: &DetectionResult) {}
}

/// Emits one `tracing` event per notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn operation_started(&self, op: Operation) {
        debug!(op = op.as_str(), "operation_start");
    }

    fn operation_finished(&self, op: Operation, bytes: u64, elapsed: Duration) {
        info!(
            op = op.as_str(),
            bytes,
            elapsed_micros = elapsed.as_micros() as u64,
            "operation_success"
        );
    }

    fn operation_failed(&self, op: Operation, error: &Error, elapsed: Duration) {
        warn!(
            op = op.as_str(),
            kind = ?error.kind(),
            error = %error,
            elapsed_micros = elapsed.as_micros() as u64,
            "operation_failure"
        );
    }

    fn encoding_detected(&self, result: &DetectionResult) {
        debug!(
            encoding = %result.encoding,
            confidence = result.confidence,
            method = result.diagnostics.method.as_str(),
            "encoding_detected"
        );
    }
}

/// Snapshot of [`MetricsCollector`] counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    /// Operations that finished or failed
    pub total_operations: u64,
    /// Operations that finished
    pub successful_operations: u64,
    /// Operations that failed
    pub failed_operations: u64,
    /// Input bytes processed by successful operations
    pub total_bytes: u64,
    /// Wall time across all operations
    pub total_time: Duration,
    /// `total_bytes` per second of `total_time`
    pub average_throughput: f64,
    /// How often each encoding was detected
    pub encoding_distribution: BTreeMap<Encoding, u64>,
    /// Failures by error category
    pub errors_by_kind: BTreeMap<String, u64>,
}

/// Aggregates operation counters.
///
/// ```rust
/// use std::sync::Arc;
/// use encoding_processor::{MetricsCollector, Processor, ProcessorConfig};
///
/// let metrics = Arc::new(MetricsCollector::new());
/// let processor = Processor::new(ProcessorConfig::default())
///     .unwrap()
///     .with_observer(metrics.clone());
/// processor.detect(b"hello").unwrap();
/// assert_eq!(metrics.stats().successful_operations, 1);
/// ```
#[derive(Debug, Default)]
pub struct MetricsCollector {
    successful: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
    micros: AtomicU64,
    encodings: Mutex<HashMap<Encoding, u64>>,
    errors: Mutex<HashMap<String, u64>>,
}

impl MetricsCollector {
    /// Create a collector with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values.
    pub fn stats(&self) -> ProcessingStats {
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let bytes = self.bytes.load(Ordering::Relaxed);
        let total_time = Duration::from_micros(self.micros.load(Ordering::Relaxed));

        let secs = total_time.as_secs_f64();
        let average_throughput = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };

        ProcessingStats {
            total_operations: successful + failed,
            successful_operations: successful,
            failed_operations: failed,
            total_bytes: bytes,
            total_time,
            average_throughput,
            encoding_distribution: self.encodings.lock().iter().map(|(k, v)| (*k, *v)).collect(),
            errors_by_kind: self.errors.lock().iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.successful.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
        self.micros.store(0, Ordering::Relaxed);
        self.encodings.lock().clear();
        self.errors.lock().clear();
    }

    fn add_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.micros.fetch_add(micros, Ordering::Relaxed);
    }
}

impl Observer for MetricsCollector {
    fn operation_finished(&self, _op: Operation, bytes: u64, elapsed: Duration) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.add_time(elapsed);
    }

    fn operation_failed(&self, _op: Operation, error: &Error, elapsed: Duration) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.add_time(elapsed);
        *self
            .errors
            .lock()
            .entry(format!("{:?}", error.kind()))
            .or_insert(0) += 1;
    }

    fn encoding_detected(&self, result: &DetectionResult) {
        *self.encodings.lock().entry(result.encoding).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detector;
    use crate::config::DetectorConfig;

    #[test]
    fn test_metrics_counts_operations() {
        let metrics = MetricsCollector::new();
        metrics.operation_started(Operation::Convert);
        metrics.operation_finished(Operation::Convert, 1000, Duration::from_millis(10));
        metrics.operation_failed(
            Operation::Detect,
            &Error::detection_failed("nothing"),
            Duration::from_millis(10),
        );

        let stats = metrics.stats();
        assert_eq!(stats.total_operations, 2);
        assert_eq!(stats.successful_operations, 1);
        assert_eq!(stats.failed_operations, 1);
        assert_eq!(stats.total_bytes, 1000);
        assert_eq!(stats.total_time, Duration::from_millis(20));
        assert_eq!(stats.average_throughput, 50_000.0);
        assert_eq!(stats.errors_by_kind.get("DetectionFailed"), Some(&1));
    }

    #[test]
    fn test_encoding_distribution_and_reset() {
        let detector = Detector::new(DetectorConfig::default()).unwrap();
        let result = detector.detect(b"ascii").unwrap();

        let metrics = MetricsCollector::new();
        metrics.encoding_detected(&result);
        metrics.encoding_detected(&result);
        assert_eq!(metrics.stats().encoding_distribution.get(&Encoding::UTF8), Some(&2));

        metrics.reset();
        assert_eq!(metrics.stats(), ProcessingStats::default());
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let metrics = MetricsCollector::new();
        metrics.operation_finished(Operation::Stream, 10, Duration::from_millis(1));
        let json = serde_json::to_value(metrics.stats()).unwrap();
        assert_eq!(json["total_bytes"], 10);
    }
}
