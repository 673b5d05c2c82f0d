use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::{
    bucket::MinuteBucket,
    event::DeliveryEvent,
    timestamp::{format_minute, parse_event_minute, TimestampError},
};

/// The moving average as it stood when the clock reached `minute`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryRecord {
    /// Minutes since the Unix epoch, reported as `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "date", serialize_with = "serialize_minute")]
    pub minute: i64,
    pub average_delivery_time: f64,
}

impl HistoryRecord {
    pub fn date(&self) -> String {
        format_minute(self.minute)
    }
}

fn serialize_minute<S: Serializer>(minute: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_minute(*minute))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("The window size must be at least 1 minute, got {0}")]
    InvalidConfiguration(usize),
    #[error("A window of {0} minutes is too large to allocate")]
    WindowTooLarge(usize),
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
    #[error("Event at {timestamp:?} has no duration")]
    MissingDuration { timestamp: String },
    #[error("Event at {current} arrived after an event at {previous}, events must be in chronological order")]
    OutOfOrder { previous: String, current: String },
    #[error("Adding a duration of {duration} would overflow the running total")]
    DurationOverflow { duration: u64 },
}

/// Moving average of event durations over the last `window_size` minutes.
///
/// Each slot of the ring holds one minute. Whenever an event arrives in a
/// later minute than the previous one, the ring advances one slot per elapsed
/// minute, logging the average for that minute and clearing the slot it lands
/// on. The running totals always equal the sum of the slots, so the average is
/// never recomputed from the slots themselves.
#[derive(Debug, Clone)]
pub struct SlidingWindowAggregator {
    buckets: Box<[MinuteBucket]>,
    current_slot: usize,
    last_seen_minute: Option<i64>,
    running_event_count: u64,
    running_duration_sum: u64,
    history: Vec<HistoryRecord>,
}

impl SlidingWindowAggregator {
    pub fn new(window_size: usize) -> Result<Self, AggregateError> {
        if window_size < 1 {
            return Err(AggregateError::InvalidConfiguration(window_size));
        }

        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(window_size)
            .map_err(|_| AggregateError::WindowTooLarge(window_size))?;
        buckets.resize(window_size, MinuteBucket::new());

        Ok(Self {
            buckets: buckets.into_boxed_slice(),
            current_slot: 0,
            last_seen_minute: None,
            running_event_count: 0,
            running_duration_sum: 0,
            history: Vec::new(),
        })
    }

    pub fn window_size(&self) -> usize {
        self.buckets.len()
    }

    pub fn running_event_count(&self) -> u64 {
        self.running_event_count
    }

    pub fn running_duration_sum(&self) -> u64 {
        self.running_duration_sum
    }

    pub fn last_seen_minute(&self) -> Option<i64> {
        self.last_seen_minute
    }

    /// True until the first event is recorded, and again after a `reset`.
    pub fn is_empty(&self) -> bool {
        self.last_seen_minute.is_none()
    }

    /// Average duration of the events currently in the window, 0 if there are none.
    pub fn average(&self) -> f64 {
        if self.running_event_count > 0 {
            self.running_duration_sum as f64 / self.running_event_count as f64
        } else {
            0.0
        }
    }

    /// Adds an event from the event log. Events must come in chronological order.
    ///
    /// Nothing is changed if the event is rejected.
    pub fn add_event(&mut self, event: &DeliveryEvent) -> Result<(), AggregateError> {
        let minute = parse_event_minute(&event.timestamp)?;
        let duration = event
            .duration
            .ok_or_else(|| AggregateError::MissingDuration {
                timestamp: event.timestamp.clone(),
            })?;
        self.record(minute, duration)
    }

    /// Adds a duration observed during `minute` (minutes since the Unix epoch).
    pub fn record(&mut self, minute: i64, duration: u64) -> Result<(), AggregateError> {
        // Validate everything up front so a rejected event leaves no trace.
        let elapsed = match self.last_seen_minute {
            Some(previous) if minute < previous => {
                return Err(AggregateError::OutOfOrder {
                    previous: format_minute(previous),
                    current: format_minute(minute),
                });
            }
            Some(previous) => minute.abs_diff(previous),
            None => 0,
        };
        let remaining = self.running_duration_sum - self.expiring_duration(elapsed);
        if remaining.checked_add(duration).is_none() {
            return Err(AggregateError::DurationOverflow { duration });
        }

        let last_seen = match self.last_seen_minute {
            Some(last_seen) => last_seen,
            None => {
                // Nothing has been seen yet, so the average leading up to the
                // first event is 0.
                self.push_history(minute);
                minute
            }
        };

        if elapsed > 0 {
            self.advance(last_seen, elapsed);
        }
        self.last_seen_minute = Some(minute);

        self.buckets[self.current_slot].add_event(duration);
        self.running_event_count += 1;
        self.running_duration_sum += duration;
        Ok(())
    }

    /// Total duration held by the slots that moving `elapsed` minutes forward
    /// would clear.
    fn expiring_duration(&self, elapsed: u64) -> u64 {
        let window_size = self.buckets.len();
        let evictions = elapsed.min(window_size as u64) as usize;
        (1..=evictions)
            .map(|step| self.buckets[(self.current_slot + step) % window_size].total_duration())
            .sum()
    }

    /// Moves the ring forward `elapsed` minutes past `last_seen`.
    ///
    /// Every minute crossed gets a history record, but only the first
    /// `window_size` of them can evict anything: after that the ring is empty.
    fn advance(&mut self, last_seen: i64, elapsed: u64) {
        let window_size = self.buckets.len();
        let evictions = elapsed.min(window_size as u64);
        if evictions == window_size as u64 {
            debug!(
                "{} minutes passed since {}, flushing the whole window",
                elapsed,
                format_minute(last_seen)
            );
        } else {
            trace!("Advancing the window by {} minutes", elapsed);
        }

        let start_slot = self.current_slot;
        for offset in 0..elapsed {
            self.push_history(last_seen + offset as i64 + 1);
            if offset < evictions {
                self.current_slot = (self.current_slot + 1) % window_size;
                self.evict(self.current_slot);
            }
        }
        self.current_slot = ((start_slot as u64 + elapsed) % window_size as u64) as usize;
    }

    fn evict(&mut self, slot: usize) {
        let bucket = &mut self.buckets[slot];
        self.running_event_count -= bucket.event_count();
        self.running_duration_sum -= bucket.total_duration();
        bucket.reset();
    }

    fn push_history(&mut self, minute: i64) {
        let record = HistoryRecord {
            minute,
            average_delivery_time: self.average(),
        };
        self.history.push(record);
    }

    /// The closing record for the minute after the last event, covering every
    /// event recorded so far. `None` before the first event.
    pub fn snapshot(&self) -> Option<HistoryRecord> {
        self.last_seen_minute.map(|last_seen| HistoryRecord {
            minute: last_seen.saturating_add(1),
            average_delivery_time: self.average(),
        })
    }

    /// The full history of averages, closed off with `snapshot`.
    ///
    /// Doesn't change the aggregator, so more events can be added afterwards.
    pub fn history(&self) -> Vec<HistoryRecord> {
        let mut history = Vec::with_capacity(self.history.len() + 1);
        history.extend_from_slice(&self.history);
        history.extend(self.snapshot());
        history
    }

    /// Same as `history`, without copying the log.
    pub fn finalize(mut self) -> Vec<HistoryRecord> {
        let last = self.snapshot();
        self.history.extend(last);
        self.history
    }

    /// Back to the just-constructed state, keeping the allocations.
    pub fn reset(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.reset();
        }
        self.current_slot = 0;
        self.last_seen_minute = None;
        self.running_event_count = 0;
        self.running_duration_sum = 0;
        self.history.clear();
    }
}
