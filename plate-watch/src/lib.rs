//! plate-watch library interface
//!
//! Client side of the progress stream: SSE frame parsing, the progress
//! subscription and the consumer that drives a display and a completion
//! callback.

pub mod consumer;
pub mod sse;

pub use consumer::{
    progress_url, subscribe, ConsumerOutcome, ProgressConsumer, ProgressDisplay, TransportError,
};
pub use sse::{SseFrame, SseFrameParser};
