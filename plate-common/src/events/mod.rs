//! Progress event types for plate generation jobs
//!
//! A generation job reports its progress as a sequence of [`ProgressSnapshot`]s.
//! Snapshots are ephemeral: they are broadcast to subscribers through a
//! [`ProgressChannel`] and never persisted.

mod channel;

pub use channel::{
    ChannelState, ProgressChannel, ProgressPublisher, ProgressSubscription,
    DEFAULT_CHANNEL_CAPACITY,
};

use serde::{Deserialize, Serialize};

/// Stage reported in a progress snapshot
///
/// Serialized as a lowercase string on the wire (`"generating"`, `"complete"`,
/// `"cancelled"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStage {
    /// A section image is being generated
    Generating,
    /// All sections were attempted
    Complete,
    /// The job was stopped before attempting every section
    Cancelled,
}

impl GenerationStage {
    /// Wire name of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStage::Generating => "generating",
            GenerationStage::Complete => "complete",
            GenerationStage::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time progress report for one generation job
///
/// Within a job `current` never decreases and `total` never changes. The last
/// snapshot of every job has `complete == true` and `current == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current stage
    pub stage: GenerationStage,
    /// Sections processed so far
    pub current: usize,
    /// Section count fixed at job start
    pub total: usize,
    /// Human-readable description of the current step
    pub message: String,
    /// True only for the terminal snapshot
    pub complete: bool,
}

impl ProgressSnapshot {
    /// Completion percentage, `round(current / total * 100)`
    ///
    /// Returns 0 when `total` is 0 and never exceeds 100.
    pub fn percentage(&self) -> u8 {
        percentage(self.current, self.total)
    }

    /// Event name used when the snapshot travels over SSE
    pub fn event_type(&self) -> &'static str {
        "progress"
    }
}

/// Percentage helper shared by the server status view and progress consumers
pub fn percentage(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = current.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}
