//! Sampling-rate statistics for a signal history.
//!
//! Used on replayed logs to check how regularly the boat reported each signal.

use crate::store::SignalHistory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStats {
    pub samples: usize,
    /// Mean time between consecutive samples, seconds
    pub mean_interval: Option<f64>,
    /// Reciprocal of the mean interval
    pub rate_hz: Option<f64>,
    /// Population standard deviation of the intervals, seconds
    pub jitter: Option<f64>,
}

impl SignalStats {
    /// Statistics over a sequence of timestamps (seconds)
    pub fn from_timestamps(timestamps: &[f64]) -> Self {
        let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();

        if intervals.is_empty() {
            return Self {
                samples: timestamps.len(),
                mean_interval: None,
                rate_hz: None,
                jitter: None,
            };
        }

        let n = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;

        Self {
            samples: timestamps.len(),
            mean_interval: Some(mean),
            rate_hz: (mean > 0.0).then(|| 1.0 / mean),
            jitter: Some(variance.sqrt()),
        }
    }

    /// Statistics over received samples; padding is ignored
    pub fn from_history(history: &SignalHistory) -> Self {
        let timestamps: Vec<f64> = history
            .iter()
            .filter(|s| !s.synthetic)
            .map(|s| s.timestamp)
            .collect();
        Self::from_timestamps(&timestamps)
    }
}
