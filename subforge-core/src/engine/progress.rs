//! Progress aggregation and rate limiting.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::types::AssetPart;

/// Default minimum spacing between two progress notifications.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(300);

/// Highest percentage reported before every part has completed.
const MAX_INCOMPLETE_PERCENT: f32 = 99.9;

// ============================================================================
// Combined Progress
// ============================================================================

/// Byte progress across all sub-downloads of one asset acquisition.
///
/// The reported percentage never decreases, even when a late sub-download
/// announces its size and grows the denominator, and it only reaches 100
/// through [`CombinedProgress::complete`].
#[derive(Debug, Clone)]
pub struct CombinedProgress {
    parts: BTreeMap<AssetPart, (u64, Option<u64>)>,
    reported: f32,
}

impl CombinedProgress {
    pub fn new(parts: &[AssetPart]) -> Self {
        Self {
            parts: parts.iter().map(|p| (*p, (0, None))).collect(),
            reported: 0.0,
        }
    }

    /// Records a sample for `part` and returns the percentage to report.
    pub fn update(&mut self, part: AssetPart, received: u64, total: Option<u64>) -> f32 {
        if let Some(entry) = self.parts.get_mut(&part) {
            entry.0 = received;
            if total.is_some() {
                entry.1 = total;
            }
        }

        if let Some(fraction) = self.fraction() {
            let percent = (fraction * 100.0) as f32;
            self.reported = self.reported.max(percent.min(MAX_INCOMPLETE_PERCENT));
        }
        self.reported
    }

    /// Marks the acquisition finished.
    pub fn complete(&mut self) -> f32 {
        self.reported = 100.0;
        self.reported
    }

    /// Σreceived / Σtotal over parts with a known size.
    pub fn fraction(&self) -> Option<f64> {
        let (received, total) = self
            .parts
            .values()
            .filter_map(|(received, total)| total.map(|t| (*received, t)))
            .fold((0u64, 0u64), |(r, t), (pr, pt)| (r + pr, t + pt));

        if total == 0 {
            None
        } else {
            Some((received as f64 / total as f64).min(1.0))
        }
    }

    pub fn percent(&self) -> f32 {
        self.reported
    }
}

// ============================================================================
// Throttle
// ============================================================================

/// Coalesces a stream of samples to at most one per interval.
///
/// The first sample passes immediately; samples inside the interval replace
/// the pending one, so whatever is emitted is always the most recent value.
/// A held-back sample is released by [`Throttle::poll`] once the interval
/// has passed, even if no newer sample arrives. Callers flush the pending
/// sample before a terminal notification.
#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    /// Offers a sample; returns it when it may be emitted now.
    pub fn offer(&mut self, sample: T, now: Instant) -> Option<T> {
        match self.last_emit {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.pending = Some(sample);
                None
            }
            _ => {
                self.last_emit = Some(now);
                self.pending = None;
                Some(sample)
            }
        }
    }

    /// Releases the held-back sample once the interval since the last
    /// emission has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self
            .last_emit
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return None;
        }
        let sample = self.pending.take()?;
        self.last_emit = Some(now);
        Some(sample)
    }

    /// Takes the sample held back by the interval, if any.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take()
    }
}

impl<T> Default for Throttle<T> {
    fn default() -> Self {
        Self::new(PROGRESS_INTERVAL)
    }
}
