//! A single bounded stream of samples of one kind.
//!
//! Channels are owned by the [`RingBufferStore`](super::RingBufferStore) and
//! are never handed out. Eviction runs lazily, on the next append or drain.

use crate::capture::types::{Sample, SampleKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How a channel bounds its memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep at most `max_samples`; the oldest arrival is evicted first.
    Capacity { max_samples: usize },
    /// Keep samples captured within `millis` of the newest timestamp seen.
    Window { millis: i64 },
}

impl RetentionPolicy {
    /// Default policy for a kind.
    ///
    /// Motion sensors fire at tens of Hz and are capacity bound. Key events
    /// are time-window bound so a stale KeyDown cannot pair with a much later
    /// KeyUp.
    pub fn default_for(kind: SampleKind) -> Self {
        match kind {
            SampleKind::Orientation | SampleKind::Acceleration => {
                RetentionPolicy::Capacity { max_samples: 1024 }
            }
            SampleKind::TouchStart => RetentionPolicy::Capacity { max_samples: 256 },
            SampleKind::KeyDown | SampleKind::KeyUp => RetentionPolicy::Window { millis: 30_000 },
        }
    }

    /// A policy that would evict everything is rejected.
    pub fn is_valid(&self) -> bool {
        match self {
            RetentionPolicy::Capacity { max_samples } => *max_samples > 0,
            RetentionPolicy::Window { millis } => *millis > 0,
        }
    }
}

/// Ring buffer for one sample kind.
#[derive(Debug)]
pub(crate) struct Channel {
    kind: SampleKind,
    policy: RetentionPolicy,
    buffer: VecDeque<Sample>,
    /// Highest `captured_at_millis` pushed since the last take
    newest_seen: Option<i64>,
    accepted: u64,
    evicted: u64,
}

/// The contents of a channel at the instant of a drain.
pub(crate) struct Cut {
    pub(crate) samples: VecDeque<Sample>,
    /// Samples captured before this timestamp are expired
    pub(crate) floor: Option<i64>,
    /// Samples evicted from the front just before the cut
    pub(crate) evicted: usize,
}

impl Cut {
    /// Drop expired stragglers and return the rest in arrival order.
    ///
    /// Runs after the channel lock is released.
    pub(crate) fn into_live(self) -> (Vec<Sample>, usize) {
        let before = self.samples.len();
        let live: Vec<Sample> = match self.floor {
            Some(floor) => self
                .samples
                .into_iter()
                .filter(|s| s.captured_at_millis() >= floor)
                .collect(),
            None => self.samples.into(),
        };
        let expired = before - live.len();
        (live, expired)
    }
}

impl Channel {
    pub(crate) fn new(kind: SampleKind, policy: RetentionPolicy) -> Self {
        let initial = match policy {
            RetentionPolicy::Capacity { max_samples } => max_samples.min(256),
            RetentionPolicy::Window { .. } => 64,
        };
        Self {
            kind,
            policy,
            buffer: VecDeque::with_capacity(initial),
            newest_seen: None,
            accepted: 0,
            evicted: 0,
        }
    }

    pub(crate) fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Window floor that `captured_at_millis` falls below, if any.
    ///
    /// Such a sample would be evicted on arrival; the store rejects it
    /// instead of pushing it.
    pub(crate) fn expired_floor(&self, captured_at_millis: i64) -> Option<i64> {
        self.window_floor()
            .filter(|&floor| captured_at_millis < floor)
    }

    /// Push a sample, then evict. Returns the number of samples evicted.
    pub(crate) fn push(&mut self, sample: Sample) -> usize {
        let ts = sample.captured_at_millis();
        self.newest_seen = Some(self.newest_seen.map_or(ts, |n| n.max(ts)));
        self.accepted += 1;

        self.buffer.push_back(sample);
        self.evict()
    }

    /// Swap out the buffer, leaving an empty one behind.
    ///
    /// The time window restarts from the next sample pushed, so a skewed
    /// timestamp only affects the cycle it arrived in.
    pub(crate) fn take(&mut self) -> Cut {
        let evicted = self.evict();
        let floor = self.window_floor();
        self.newest_seen = None;
        Cut {
            samples: std::mem::take(&mut self.buffer),
            floor,
            evicted,
        }
    }

    /// Copy of the live samples. Window-expired samples are skipped, not removed.
    pub(crate) fn snapshot(&self) -> Vec<Sample> {
        match self.window_floor() {
            Some(floor) => self
                .buffer
                .iter()
                .filter(|s| s.captured_at_millis() >= floor)
                .cloned()
                .collect(),
            None => self.buffer.iter().cloned().collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn accepted(&self) -> u64 {
        self.accepted
    }

    pub(crate) fn evicted(&self) -> u64 {
        self.evicted
    }

    pub(crate) fn kind(&self) -> SampleKind {
        self.kind
    }

    fn window_floor(&self) -> Option<i64> {
        match self.policy {
            RetentionPolicy::Window { millis } => {
                self.newest_seen.map(|n| n.saturating_sub(millis))
            }
            RetentionPolicy::Capacity { .. } => None,
        }
    }

    /// Amortized O(1): only the front of the buffer is examined. Expired
    /// samples stuck behind a newer front are filtered when drained.
    fn evict(&mut self) -> usize {
        let before = self.buffer.len();
        match self.policy {
            RetentionPolicy::Capacity { max_samples } => {
                while self.buffer.len() > max_samples {
                    self.buffer.pop_front();
                }
            }
            RetentionPolicy::Window { .. } => {
                if let Some(floor) = self.window_floor() {
                    while matches!(self.buffer.front(), Some(s) if s.captured_at_millis() < floor)
                    {
                        self.buffer.pop_front();
                    }
                }
            }
        }
        let evicted = before - self.buffer.len();
        self.evicted += evicted as u64;
        evicted
    }
}

/// Counters for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub kind: SampleKind,
    pub policy: RetentionPolicy,
    /// Samples currently buffered
    pub buffered: usize,
    /// Samples accepted since creation
    pub accepted: u64,
    /// Samples removed by the retention policy
    pub evicted: u64,
    /// Samples handed out by drains
    pub drained: u64,
}
