//! Session telemetry.
//!
//! The recorder keeps running counters for a detection session plus a
//! bounded history of [`SessionEvent`]s. It is owned by the frame driver
//! and read by the host after (or between) frames.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub mod events;

pub use events::{SessionEvent, SkipReason};

/// Default number of events kept in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;

/// Running counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub geometry_changes: u64,
    /// Key/frame pairs whose color matched
    pub key_matches: u64,
    pub notes_emitted: u64,
    pub notes_flushed: u64,
    pub options_rejected: u64,
}

/// Snapshot of recorder state for CLI reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub stats: SessionStats,
    pub recent: Vec<SessionEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Counter set plus bounded event history.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    stats: SessionStats,
    history: VecDeque<SessionEvent>,
    history_capacity: usize,
    total_events: u64,
    dropped_events: u64,
}

impl SessionRecorder {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            stats: SessionStats::default(),
            history: VecDeque::with_capacity(history_capacity.min(DEFAULT_HISTORY_CAPACITY)),
            history_capacity,
            total_events: 0,
            dropped_events: 0,
        }
    }

    pub fn publish(&mut self, event: SessionEvent) {
        self.total_events += 1;
        match &event {
            SessionEvent::FrameSkipped { .. } => self.stats.frames_skipped += 1,
            SessionEvent::GeometryChanged { .. } => self.stats.geometry_changes += 1,
            SessionEvent::OptionsRejected { .. } => self.stats.options_rejected += 1,
            SessionEvent::NoteEmitted { .. } => self.stats.notes_emitted += 1,
            SessionEvent::NotesFlushed { count, .. } => self.stats.notes_flushed += *count as u64,
            SessionEvent::SessionStarted { .. } | SessionEvent::SessionStopped { .. } => {}
        }

        if self.history_capacity == 0 {
            self.dropped_events += 1;
            return;
        }
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
            self.dropped_events += 1;
        }
        self.history.push_back(event);
    }

    /// Count one sampled frame and its matching keys.
    pub fn frame_processed(&mut self, matched_keys: usize) {
        self.stats.frames_processed += 1;
        self.stats.key_matches += matched_keys as u64;
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn events(&self) -> impl Iterator<Item = &SessionEvent> {
        self.history.iter()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            stats: self.stats.clone(),
            recent: self.history.iter().cloned().collect(),
            total_events: self.total_events,
            dropped_events: self.dropped_events,
        }
    }
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
