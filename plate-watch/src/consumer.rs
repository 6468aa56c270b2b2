//! Client progress consumer
//!
//! [`subscribe`] opens the SSE progress stream of one artifact and yields
//! decoded snapshots. [`ProgressConsumer::run`] folds them into a
//! [`ProgressDisplay`] and, once the terminal snapshot arrives, invokes the
//! completion callback exactly once after a short grace period.
//!
//! A stream that fails or ends before the terminal snapshot is an unknown
//! outcome: the job may still be running or may have finished unobserved. The
//! completion callback is not called in that case.

use futures::stream::{Stream, StreamExt};
use plate_common::events::{percentage, GenerationStage, ProgressSnapshot};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::sse::{SseFrame, SseFrameParser};

/// Default pause before the completion callback
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(1500);

/// Stream delivery failures, local to one subscriber
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Malformed progress event: {0}")]
    Decode(String),
}

/// SSE endpoint for an artifact's progress
pub fn progress_url(base_url: &str, artifact_id: Uuid) -> String {
    format!(
        "{}/artifacts/{}/images/progress",
        base_url.trim_end_matches('/'),
        artifact_id
    )
}

/// Decode a frame carrying a progress snapshot, ignoring other event types
pub fn decode_progress(frame: &SseFrame) -> Option<Result<ProgressSnapshot, TransportError>> {
    if frame.event_type() != "progress" {
        debug!(event = frame.event_type(), "Ignoring non-progress event");
        return None;
    }
    Some(serde_json::from_str(&frame.data).map_err(|e| TransportError::Decode(e.to_string())))
}

/// Subscribe to an artifact's progress stream
///
/// The stream ends after the terminal snapshot, after the first error, or when
/// the server closes the connection.
pub fn subscribe(
    client: &reqwest::Client,
    base_url: &str,
    artifact_id: Uuid,
) -> impl Stream<Item = Result<ProgressSnapshot, TransportError>> + Send + 'static {
    let client = client.clone();
    let url = progress_url(base_url, artifact_id);

    async_stream::stream! {
        debug!(url = %url, "Opening progress stream");

        let response = match client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                yield Err(TransportError::Connect(e.to_string()));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            yield Err(TransportError::Status(status.as_u16()));
            return;
        }

        let mut parser = SseFrameParser::new();
        let mut bytes = response.bytes_stream();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(TransportError::Stream(e.to_string()));
                    return;
                }
            };

            for frame in parser.push(&chunk) {
                let Some(result) = decode_progress(&frame) else {
                    continue;
                };
                let terminal = matches!(&result, Ok(snapshot) if snapshot.complete);
                let failed = result.is_err();
                yield result;
                if terminal || failed {
                    return;
                }
            }
        }

        debug!(url = %url, "Progress stream closed by server");
    }
}

/// What a consumer shows for one job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressDisplay {
    pub stage: Option<GenerationStage>,
    pub message: String,
    pub current: usize,
    pub total: usize,
    /// `round(current / total * 100)`, 0 when `total` is 0
    pub percentage: u8,
    pub done: bool,
}

impl ProgressDisplay {
    pub fn apply(&mut self, snapshot: &ProgressSnapshot) {
        self.stage = Some(snapshot.stage);
        self.message = snapshot.message.clone();
        self.current = snapshot.current;
        self.total = snapshot.total;
        self.percentage = percentage(snapshot.current, snapshot.total);
    }
}

/// How a consumer's run ended
#[derive(Debug)]
pub enum ConsumerOutcome {
    /// Terminal snapshot received and completion callback invoked
    Completed(ProgressSnapshot),
    /// Stream ended without a terminal snapshot
    Unknown,
    /// Stream failed before the terminal snapshot
    TransportFailed(TransportError),
}

impl ConsumerOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ConsumerOutcome::Completed(_))
    }
}

/// Drives a display from a snapshot stream
pub struct ProgressConsumer {
    display: ProgressDisplay,
    grace_period: Duration,
}

impl Default for ProgressConsumer {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl ProgressConsumer {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            display: ProgressDisplay::default(),
            grace_period,
        }
    }

    pub fn display(&self) -> &ProgressDisplay {
        &self.display
    }

    pub fn is_done(&self) -> bool {
        self.display.done
    }

    /// Consume `stream` until the terminal snapshot or a transport failure
    ///
    /// `on_update` sees the display after every snapshot. `on_complete` runs
    /// once, after the subscription is dropped and the grace period elapsed.
    pub async fn run<S, U, C>(&mut self, stream: S, mut on_update: U, on_complete: C) -> ConsumerOutcome
    where
        S: Stream<Item = Result<ProgressSnapshot, TransportError>>,
        U: FnMut(&ProgressDisplay),
        C: FnOnce(&ProgressSnapshot),
    {
        let mut stream = Box::pin(stream);

        while let Some(item) = stream.next().await {
            let snapshot = match item {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "Progress stream failed, outcome unknown");
                    return ConsumerOutcome::TransportFailed(e);
                }
            };

            self.display.apply(&snapshot);
            on_update(&self.display);

            if snapshot.complete {
                drop(stream);
                self.display.done = true;
                info!(
                    stage = %snapshot.stage,
                    message = %snapshot.message,
                    "Generation finished"
                );

                tokio::time::sleep(self.grace_period).await;
                on_complete(&snapshot);
                return ConsumerOutcome::Completed(snapshot);
            }
        }

        warn!("Progress stream ended before the terminal snapshot, outcome unknown");
        ConsumerOutcome::Unknown
    }
}
