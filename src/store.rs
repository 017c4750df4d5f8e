//! # Time-Series Store
//!
//! Bounded per-signal history shared between the link reader and every
//! consumer (plots, orientation view, CSV logger).
//!
//! [`TimeSeriesStore`] is a cheap cloneable handle. All mutation goes through
//! one `RwLock`, so readers always see a consistent point-in-time view.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Default history length per signal
pub const DEFAULT_MAX_POINTS: usize = 2000;

/// Default age after which a signal is padded with its last value
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(500);

/// One observation of a signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    /// Seconds since session start
    pub timestamp: f64,
    /// Generated by stale-signal padding rather than received
    pub synthetic: bool,
}

impl Sample {
    pub fn new(value: f64, timestamp: f64) -> Self {
        Self { value, timestamp, synthetic: false }
    }

    fn padding(value: f64, timestamp: f64) -> Self {
        Self { value, timestamp, synthetic: true }
    }
}

/// Ordered, bounded history for one signal
///
/// Timestamps are non-decreasing: a sample older than the current tail is
/// stored at the tail's timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHistory {
    samples: VecDeque<Sample>,
    max_points: usize,
    /// Newest non-synthetic sample, kept even after padding evicts it
    last_received: Option<Sample>,
}

impl SignalHistory {
    pub fn new(max_points: usize) -> Self {
        let max_points = max_points.max(1);
        Self {
            samples: VecDeque::with_capacity(max_points.min(DEFAULT_MAX_POINTS)),
            max_points,
            last_received: None,
        }
    }

    /// Append and evict from the front past `max_points`
    pub fn push(&mut self, mut sample: Sample) {
        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                sample.timestamp = last.timestamp;
            }
        }
        if !sample.synthetic {
            self.last_received = Some(sample);
        }
        self.samples.push_back(sample);
        while self.samples.len() > self.max_points {
            self.samples.pop_front();
        }
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Most recent sample that was actually received, even if padding has
    /// since pushed it out of the history
    pub fn latest_received(&self) -> Option<Sample> {
        self.last_received
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// `(timestamps, values)` ready for a plot widget
    pub fn to_series(&self) -> (Vec<f64>, Vec<f64>) {
        self.samples.iter().map(|s| (s.timestamp, s.value)).unzip()
    }

    /// Pad with the last value if it is at least `stale_after` old
    pub fn pad_if_stale(&mut self, now: f64, stale_after: Duration) -> bool {
        let Some(last) = self.samples.back().copied() else {
            return false;
        };
        if now - last.timestamp < stale_after.as_secs_f64() {
            return false;
        }
        self.push(Sample::padding(last.value, now));
        true
    }
}

/// Immutable copy of every history, taken under one lock
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    histories: HashMap<String, SignalHistory>,
}

impl StoreSnapshot {
    pub fn get(&self, key: &str) -> Option<&SignalHistory> {
        self.histories.get(key)
    }

    pub fn latest(&self, key: &str) -> Option<Sample> {
        self.histories.get(key).and_then(SignalHistory::latest)
    }

    /// Sorted signal keys
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.histories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

/// Shared store of signal histories keyed by signal key
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    histories: Arc<RwLock<HashMap<String, SignalHistory>>>,
    start_time: Instant,
    max_points: usize,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

impl TimeSeriesStore {
    /// Empty store; the session clock starts now
    pub fn new(max_points: usize) -> Self {
        Self {
            histories: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
            max_points: max_points.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SignalHistory>> {
        self.histories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SignalHistory>> {
        self.histories.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Seconds since session start
    pub fn elapsed(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Append one sample, creating the history on first use
    pub fn append(&self, key: &str, value: f64, timestamp: f64) {
        let mut histories = self.write();
        match histories.get_mut(key) {
            Some(history) => history.push(Sample::new(value, timestamp)),
            None => {
                let mut history = SignalHistory::new(self.max_points);
                history.push(Sample::new(value, timestamp));
                histories.insert(key.to_string(), history);
            }
        }
    }

    /// Append a sample stamped with the session clock
    pub fn append_now(&self, key: &str, value: f64) {
        self.append(key, value, self.elapsed());
    }

    pub fn latest(&self, key: &str) -> Option<Sample> {
        self.read().get(key).and_then(SignalHistory::latest)
    }

    /// Latest sample of each key, read under a single lock
    ///
    /// With `include_padding == false` synthetic padding samples are skipped.
    pub fn latest_many<S: AsRef<str>>(&self, keys: &[S], include_padding: bool) -> Vec<Option<Sample>> {
        let histories = self.read();
        keys.iter()
            .map(|key| {
                histories.get(key.as_ref()).and_then(|h| {
                    if include_padding {
                        h.latest()
                    } else {
                        h.latest_received()
                    }
                })
            })
            .collect()
    }

    pub fn history(&self, key: &str) -> Option<SignalHistory> {
        self.read().get(key).cloned()
    }

    pub fn len(&self, key: &str) -> usize {
        self.read().get(key).map_or(0, SignalHistory::len)
    }

    /// Sorted signal keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot { histories: self.read().clone() }
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Swap in a complete set of histories (log replay)
    pub fn replace_with(&self, histories: HashMap<String, SignalHistory>) {
        *self.write() = histories;
    }

    /// Repeat the last value at `now` if the signal has gone quiet
    ///
    /// Plot-continuity aid: the added sample is marked synthetic. Returns
    /// whether a sample was added.
    pub fn pad_if_stale(&self, key: &str, now: f64, stale_after: Duration) -> bool {
        self.write()
            .get_mut(key)
            .map_or(false, |h| h.pad_if_stale(now, stale_after))
    }

    /// [`pad_if_stale`](Self::pad_if_stale) for every signal; returns how many were padded
    pub fn pad_all_stale(&self, now: f64, stale_after: Duration) -> usize {
        self.write()
            .values_mut()
            .map(|h| h.pad_if_stale(now, stale_after))
            .filter(|&padded| padded)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_creates_history_lazily() {
        let store = TimeSeriesStore::new(10);
        assert!(store.is_empty());
        assert_eq!(store.latest("ROL"), None);

        store.append("ROL", 1.5, 0.1);
        assert_eq!(store.keys(), vec!["ROL".to_string()]);
        assert_eq!(store.latest("ROL"), Some(Sample::new(1.5, 0.1)));
    }

    #[test]
    fn test_history_evicts_from_front() {
        let store = TimeSeriesStore::new(3);
        for i in 0..5 {
            store.append("BAT", i as f64, i as f64);
        }
        let history = store.history("BAT").unwrap();
        let values: Vec<f64> = history.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let mut history = SignalHistory::new(10);
        history.push(Sample::new(1.0, 2.0));
        history.push(Sample::new(2.0, 1.0));
        history.push(Sample::new(3.0, 2.0));
        let ts: Vec<f64> = history.iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_zero_max_points_keeps_one() {
        let store = TimeSeriesStore::new(0);
        store.append("ROL", 1.0, 0.0);
        store.append("ROL", 2.0, 1.0);
        assert_eq!(store.len("ROL"), 1);
        assert_eq!(store.latest("ROL").unwrap().value, 2.0);
    }

    #[test]
    fn test_pad_if_stale() {
        let store = TimeSeriesStore::new(10);
        store.append("BAT", 12.6, 1.0);

        assert!(!store.pad_if_stale("BAT", 1.2, DEFAULT_STALE_AFTER));
        assert!(store.pad_if_stale("BAT", 1.5, DEFAULT_STALE_AFTER));

        let latest = store.latest("BAT").unwrap();
        assert_eq!(latest.value, 12.6);
        assert_eq!(latest.timestamp, 1.5);
        assert!(latest.synthetic);
        assert_eq!(store.len("BAT"), 2);
    }

    #[test]
    fn test_pad_unknown_key_is_noop() {
        let store = TimeSeriesStore::new(10);
        assert!(!store.pad_if_stale("BAT", 10.0, DEFAULT_STALE_AFTER));
        assert!(store.is_empty());
    }

    #[test]
    fn test_pad_all_stale() {
        let store = TimeSeriesStore::new(10);
        store.append("ROL", 1.0, 0.0);
        store.append("PIT", 2.0, 0.9);
        assert_eq!(store.pad_all_stale(1.0, DEFAULT_STALE_AFTER), 1);
        assert!(store.latest("ROL").unwrap().synthetic);
        assert!(!store.latest("PIT").unwrap().synthetic);
    }

    #[test]
    fn test_latest_many_skips_padding_when_asked() {
        let store = TimeSeriesStore::new(10);
        store.append("ROL", 4.0, 0.0);
        store.pad_if_stale("ROL", 2.0, DEFAULT_STALE_AFTER);

        let with = store.latest_many(&["ROL", "YAW"], true);
        assert_eq!(with[0].unwrap().timestamp, 2.0);
        assert_eq!(with[1], None);

        let without = store.latest_many(&["ROL"], false);
        assert_eq!(without[0], Some(Sample::new(4.0, 0.0)));
    }

    #[test]
    fn test_latest_received_survives_padding_eviction() {
        let store = TimeSeriesStore::new(3);
        store.append("RUD", 15.0, 0.0);
        for t in 1..=3 {
            assert!(store.pad_if_stale("RUD", t as f64, DEFAULT_STALE_AFTER));
        }

        let history = store.history("RUD").unwrap();
        assert!(history.iter().all(|s| s.synthetic));
        assert_eq!(history.latest_received(), Some(Sample::new(15.0, 0.0)));
        assert_eq!(store.latest_many(&["RUD"], false)[0], Some(Sample::new(15.0, 0.0)));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let store = TimeSeriesStore::new(10);
        store.append("ROL", 1.0, 0.0);
        let snapshot = store.snapshot();
        store.append("ROL", 2.0, 1.0);
        store.append("PIT", 3.0, 1.0);

        assert_eq!(snapshot.latest("ROL").unwrap().value, 1.0);
        assert_eq!(snapshot.keys(), vec!["ROL"]);
        assert_eq!(store.len("ROL"), 2);
    }

    #[test]
    fn test_clear_and_replace() {
        let store = TimeSeriesStore::new(10);
        store.append("ROL", 1.0, 0.0);
        store.clear();
        assert!(store.is_empty());

        let mut history = SignalHistory::new(10);
        history.push(Sample::new(7.0, 3.0));
        store.replace_with(HashMap::from([("EX1".to_string(), history)]));
        assert_eq!(store.keys(), vec!["EX1".to_string()]);
    }

    #[test]
    fn test_clones_share_data() {
        let store = TimeSeriesStore::new(10);
        let reader = store.clone();
        store.append("ROL", 1.0, 0.0);
        assert_eq!(reader.latest("ROL").unwrap().value, 1.0);
    }

    #[test]
    fn test_to_series() {
        let mut history = SignalHistory::new(10);
        history.push(Sample::new(1.0, 0.5));
        history.push(Sample::new(2.0, 1.0));
        assert_eq!(history.to_series(), (vec![0.5, 1.0], vec![1.0, 2.0]));
    }

    #[test]
    fn test_concurrent_append_and_snapshot() {
        let store = TimeSeriesStore::new(100);
        let writer = store.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                writer.append("ROL", i as f64, i as f64);
            }
        });
        for _ in 0..100 {
            let snapshot = store.snapshot();
            if let Some(history) = snapshot.get("ROL") {
                assert!(history.len() <= 100);
            }
        }
        handle.join().unwrap();
        assert_eq!(store.len("ROL"), 100);
        assert_eq!(store.latest("ROL").unwrap().value, 999.0);
    }

    proptest! {
        #[test]
        fn test_history_keeps_most_recent_points(
            max_points in 1usize..50,
            values in prop::collection::vec(-1000.0f64..1000.0, 0..200)
        ) {
            let store = TimeSeriesStore::new(max_points);
            for (i, &value) in values.iter().enumerate() {
                store.append("SIG", value, i as f64);
                prop_assert!(store.len("SIG") <= max_points);
            }

            let kept: Vec<f64> = store
                .history("SIG")
                .map(|h| h.iter().map(|s| s.value).collect())
                .unwrap_or_default();
            let start = values.len().saturating_sub(max_points);
            prop_assert_eq!(kept, values[start..].to_vec());
        }
    }
}
