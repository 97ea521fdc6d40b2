//! Per-room rolling-window sample history.
//!
//! Each room's series is a `VecDeque` of samples assumed (but not required)
//! to arrive in chronological order. Eviction happens on every append by
//! popping aged-out samples from the front, which is O(evicted) in the
//! chronological case; snapshots additionally filter by age so the window
//! bound holds even when timestamps arrived out of order or no append has
//! happened for a while.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use time::OffsetDateTime;

use powerwatch_types::Sample;

/// Bounded time-windowed history of power samples, keyed by room id.
#[derive(Debug)]
pub struct TimeWindowBuffer {
    window: Duration,
    series: HashMap<String, VecDeque<Sample>>,
}

impl TimeWindowBuffer {
    /// Create a buffer retaining samples for the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            series: HashMap::new(),
        }
    }

    /// The configured retention window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Append a sample to a room's series and evict aged-out samples,
    /// using the current wall clock as "now".
    pub fn append(&mut self, room_id: &str, sample: Sample) {
        self.append_at(room_id, sample, OffsetDateTime::now_utc());
    }

    /// Append with an explicit "now", for deterministic tests.
    pub fn append_at(&mut self, room_id: &str, sample: Sample, now: OffsetDateTime) {
        let series = self.series.entry(room_id.to_string()).or_default();
        series.push_back(sample);
        while let Some(front) = series.front() {
            if Self::within_window(front, self.window, now) {
                break;
            }
            series.pop_front();
        }
    }

    /// Snapshot of a room's series, oldest first, restricted to samples
    /// within the window as of the current wall clock.
    ///
    /// Returns an empty vector for rooms with no recorded samples.
    pub fn snapshot(&self, room_id: &str) -> Vec<Sample> {
        self.snapshot_at(room_id, OffsetDateTime::now_utc())
    }

    /// Snapshot with an explicit "now", for deterministic tests.
    pub fn snapshot_at(&self, room_id: &str, now: OffsetDateTime) -> Vec<Sample> {
        self.series
            .get(room_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|sample| Self::within_window(sample, self.window, now))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop a room's series entirely.
    pub fn remove(&mut self, room_id: &str) {
        self.series.remove(room_id);
    }

    /// Number of physically retained samples for a room, including any
    /// waiting to age out on the next append.
    pub fn len(&self, room_id: &str) -> usize {
        self.series.get(room_id).map_or(0, VecDeque::len)
    }

    /// Whether a room has no retained samples.
    pub fn is_empty(&self, room_id: &str) -> bool {
        self.len(room_id) == 0
    }

    fn within_window(sample: &Sample, window: Duration, now: OffsetDateTime) -> bool {
        (now - sample.timestamp).as_seconds_f64() <= window.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(seconds)
    }

    #[test]
    fn test_append_and_snapshot_oldest_first() {
        let mut buffer = TimeWindowBuffer::new(WINDOW);
        buffer.append_at("1", Sample::new(at(0), 100.0), at(0));
        buffer.append_at("1", Sample::new(at(1), 200.0), at(1));
        buffer.append_at("1", Sample::new(at(2), 300.0), at(2));

        let samples = buffer.snapshot_at("1", at(2));
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].power, 100.0);
        assert_eq!(samples[2].power, 300.0);
    }

    #[test]
    fn test_one_sample_per_second_for_61_seconds() {
        let mut buffer = TimeWindowBuffer::new(WINDOW);
        for second in 0..=61 {
            buffer.append_at("1", Sample::new(at(second), second as f64), at(second));
        }

        // At t=61 the window [1, 61] holds 61 samples; the t=0 sample aged
        // out in strict age order.
        let samples = buffer.snapshot_at("1", at(61));
        assert_eq!(samples.len(), 61);
        assert_eq!(samples[0].power, 1.0);
        assert_eq!(samples.last().unwrap().power, 61.0);
    }

    #[test]
    fn test_snapshot_never_returns_over_age_samples() {
        let mut buffer = TimeWindowBuffer::new(WINDOW);
        for second in 0..30 {
            buffer.append_at("1", Sample::new(at(second), 1.0), at(second));
        }

        // Long after the last append, everything is out of the window even
        // though nothing evicted it physically.
        let samples = buffer.snapshot_at("1", at(500));
        assert!(samples.is_empty());
        for sample in buffer.snapshot_at("1", at(89)) {
            assert!((at(89) - sample.timestamp).whole_seconds() <= 60);
        }
    }

    #[test]
    fn test_out_of_order_timestamps_do_not_panic_and_stay_bounded() {
        let mut buffer = TimeWindowBuffer::new(WINDOW);
        buffer.append_at("1", Sample::new(at(100), 1.0), at(100));
        // A stale sample arrives behind a newer one.
        buffer.append_at("1", Sample::new(at(10), 2.0), at(100));
        buffer.append_at("1", Sample::new(at(101), 3.0), at(101));

        let samples = buffer.snapshot_at("1", at(101));
        // The stale sample is outside the window and must not be reported.
        assert!(samples.iter().all(|s| s.timestamp >= at(41)));
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_eviction_is_per_room() {
        let mut buffer = TimeWindowBuffer::new(WINDOW);
        buffer.append_at("1", Sample::new(at(0), 1.0), at(0));
        buffer.append_at("2", Sample::new(at(90), 2.0), at(90));

        assert!(buffer.snapshot_at("1", at(90)).is_empty());
        assert_eq!(buffer.snapshot_at("2", at(90)).len(), 1);
    }

    #[test]
    fn test_append_bounds_physical_size() {
        let mut buffer = TimeWindowBuffer::new(WINDOW);
        for second in 0..600 {
            buffer.append_at("1", Sample::new(at(second), 0.0), at(second));
        }
        // Physical retention never exceeds one window of one-per-second
        // samples plus the sample just appended.
        assert!(buffer.len("1") <= 62);
    }

    #[test]
    fn test_remove_drops_series() {
        let mut buffer = TimeWindowBuffer::new(WINDOW);
        buffer.append_at("1", Sample::new(at(0), 1.0), at(0));
        buffer.remove("1");
        assert!(buffer.is_empty("1"));
        assert!(buffer.snapshot_at("1", at(0)).is_empty());
    }

    #[test]
    fn test_unknown_room_snapshot_is_empty() {
        let buffer = TimeWindowBuffer::new(WINDOW);
        assert!(buffer.snapshot_at("nope", at(0)).is_empty());
    }
}
