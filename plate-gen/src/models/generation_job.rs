//! Generation job lifecycle types

use serde::{Deserialize, Serialize};

/// Lifecycle of one generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Registered, orchestrator not yet started
    Queued,
    /// Walking sections
    Running,
    /// Terminal snapshot emitted
    Terminal,
}

/// Counts reported by the orchestrator when a job ends
///
/// Only for logging and status display; the persisted records are the source
/// of truth for what was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Sections the orchestrator started work on
    pub attempted: usize,
    /// Sections with a persisted record
    pub succeeded: usize,
    /// Sections whose provider call or upload failed
    pub failed: usize,
    /// Whether the job stopped early on a cancellation request
    pub cancelled: bool,
}
