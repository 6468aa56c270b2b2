//! Server-Sent Events (SSE) utilities
//!
//! Turns a [`ProgressSubscription`] into an axum SSE response. Each snapshot is
//! sent as a `progress` event whose data is the JSON-encoded snapshot. The
//! stream ends right after the terminal snapshot, which closes the connection
//! server-side.

use crate::events::{ProgressSnapshot, ProgressSubscription};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keep-alive comment interval for progress streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Callback invoked when a subscriber goes away before the terminal snapshot
pub type DisconnectHook = Box<dyn FnOnce() + Send + 'static>;

struct DisconnectGuard {
    hook: Option<DisconnectHook>,
}

impl DisconnectGuard {
    fn disarm(&mut self) {
        self.hook = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

/// Encode one snapshot as an SSE event
pub fn snapshot_event(snapshot: &ProgressSnapshot) -> Option<Event> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(Event::default().event(snapshot.event_type()).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize progress snapshot: {}", e);
            None
        }
    }
}

/// Create an SSE response streaming a job's progress
///
/// # Arguments
/// * `label` - Identifies the stream in logs (e.g. the artifact id)
/// * `subscription` - Subscription to forward
/// * `on_disconnect` - Called if the client disconnects before the terminal snapshot
pub fn create_progress_sse_stream(
    label: String,
    subscription: ProgressSubscription,
    on_disconnect: Option<DisconnectHook>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE: progress subscriber connected ({})", label);

    let stream = async_stream::stream! {
        let mut subscription = subscription;
        let mut guard = DisconnectGuard { hook: on_disconnect };

        while let Some(snapshot) = subscription.recv().await {
            let terminal = snapshot.complete;
            if terminal {
                guard.disarm();
            }

            debug!(
                current = snapshot.current,
                total = snapshot.total,
                complete = terminal,
                "SSE: forwarding progress snapshot ({})", label
            );
            if let Some(event) = snapshot_event(&snapshot) {
                yield Ok(event);
            }

            if terminal {
                info!("SSE: terminal snapshot sent, closing stream ({})", label);
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
