//! Per-job progress channel
//!
//! One producer ([`ProgressPublisher`]), any number of subscribers
//! ([`ProgressSubscription`]). Built on `tokio::sync::broadcast` for the ordered
//! snapshot sequence and `tokio::sync::watch` for the latest snapshot.
//!
//! # Lifecycle
//! `Idle` (nothing published) → `Running` (non-terminal snapshots) → `Terminal`
//! (the single `complete == true` snapshot). After the terminal snapshot every
//! subscription ends.
//!
//! # Delivery
//! - A subscriber sees every snapshot published after it attaches, in order.
//!   There is no replay of earlier snapshots.
//! - A subscriber attaching after the job finished receives only the terminal
//!   snapshot.
//! - A subscriber that falls behind by more than the channel capacity skips
//!   ahead to newer snapshots. The terminal snapshot is always delivered.

use super::{GenerationStage, ProgressSnapshot};
use futures::stream::Stream;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Default number of snapshots buffered per subscriber
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Observable state of a progress channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No snapshot published yet
    Idle,
    /// At least one non-terminal snapshot published
    Running,
    /// Terminal snapshot published, channel closed
    Terminal,
}

struct Shared {
    total: usize,
    tx: broadcast::Sender<ProgressSnapshot>,
    // Must be updated before `tx.send` so a racing subscriber observes the
    // terminal snapshot through one of the two paths.
    latest: watch::Sender<Option<ProgressSnapshot>>,
}

/// Subscriber-side handle to a job's progress
///
/// Cheap to clone; all clones observe the same job.
#[derive(Clone)]
pub struct ProgressChannel {
    shared: Arc<Shared>,
}

impl ProgressChannel {
    /// Create a channel for a job over `total` sections
    ///
    /// Returns the subscriber handle and the single publisher.
    ///
    /// # Examples
    ///
    /// ```
    /// use plate_common::events::{GenerationStage, ProgressChannel};
    ///
    /// let (channel, mut publisher) = ProgressChannel::new(2, 16);
    /// publisher.step(0, GenerationStage::Generating, "Section 1 of 2");
    /// assert_eq!(channel.latest().unwrap().current, 0);
    ///
    /// let terminal = publisher.finish(GenerationStage::Complete, "Done");
    /// assert!(terminal.complete);
    /// assert_eq!(terminal.current, 2);
    /// ```
    pub fn new(total: usize, capacity: usize) -> (Self, ProgressPublisher) {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let (latest, _) = watch::channel(None);
        let shared = Arc::new(Shared { total, tx, latest });

        let channel = Self {
            shared: Arc::clone(&shared),
        };
        let publisher = ProgressPublisher {
            shared,
            last_current: 0,
            finished: false,
        };
        (channel, publisher)
    }

    /// Section count fixed at job start
    pub fn total(&self) -> usize {
        self.shared.total
    }

    /// Most recent snapshot, if any
    pub fn latest(&self) -> Option<ProgressSnapshot> {
        self.shared.latest.borrow().clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        match self.shared.latest.borrow().as_ref() {
            None => ChannelState::Idle,
            Some(snapshot) if snapshot.complete => ChannelState::Terminal,
            Some(_) => ChannelState::Running,
        }
    }

    /// Number of attached subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.tx.receiver_count()
    }

    /// Attach a new subscriber
    pub fn subscribe(&self) -> ProgressSubscription {
        let rx = self.shared.tx.subscribe();
        // Read after subscribing: if the terminal snapshot was sent before `rx`
        // existed it is visible here.
        let pending_terminal = self.latest().filter(|snapshot| snapshot.complete);

        ProgressSubscription {
            rx,
            pending_terminal,
            done: false,
        }
    }
}

/// Single producer of a job's snapshots
///
/// Not `Clone`. `finish` consumes the publisher, so a job can emit at most one
/// terminal snapshot. A publisher dropped without `finish` emits a `cancelled`
/// terminal snapshot so subscribers never wait forever.
pub struct ProgressPublisher {
    shared: Arc<Shared>,
    last_current: usize,
    finished: bool,
}

impl ProgressPublisher {
    /// Section count fixed at job start
    pub fn total(&self) -> usize {
        self.shared.total
    }

    /// Publish a non-terminal snapshot
    ///
    /// `current` is clamped to `[previous current, total]`.
    pub fn step(
        &mut self,
        current: usize,
        stage: GenerationStage,
        message: impl Into<String>,
    ) -> ProgressSnapshot {
        let current = current.min(self.shared.total).max(self.last_current);
        self.last_current = current;

        let snapshot = ProgressSnapshot {
            stage,
            current,
            total: self.shared.total,
            message: message.into(),
            complete: false,
        };
        self.emit(snapshot.clone());
        snapshot
    }

    /// Publish the terminal snapshot and close the channel
    pub fn finish(mut self, stage: GenerationStage, message: impl Into<String>) -> ProgressSnapshot {
        self.finished = true;
        let snapshot = self.terminal(stage, message.into());
        self.emit(snapshot.clone());
        snapshot
    }

    fn terminal(&self, stage: GenerationStage, message: String) -> ProgressSnapshot {
        ProgressSnapshot {
            stage,
            current: self.shared.total,
            total: self.shared.total,
            message,
            complete: true,
        }
    }

    fn emit(&self, snapshot: ProgressSnapshot) {
        self.shared.latest.send_replace(Some(snapshot.clone()));

        match self.shared.tx.send(snapshot) {
            Ok(receiver_count) => {
                debug!("Progress: snapshot delivered to {} subscribers", receiver_count);
            }
            Err(broadcast::error::SendError(snapshot)) => {
                debug!(
                    current = snapshot.current,
                    total = snapshot.total,
                    "Progress: no subscribers for snapshot"
                );
            }
        }
    }
}

impl Drop for ProgressPublisher {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        warn!(
            last_current = self.last_current,
            total = self.shared.total,
            "Progress publisher dropped before finishing; emitting cancelled terminal snapshot"
        );
        let snapshot = self.terminal(
            GenerationStage::Cancelled,
            "Generation ended before all sections were attempted".to_string(),
        );
        self.emit(snapshot);
    }
}

/// One subscriber's view of a job's snapshots
pub struct ProgressSubscription {
    rx: broadcast::Receiver<ProgressSnapshot>,
    pending_terminal: Option<ProgressSnapshot>,
    done: bool,
}

impl ProgressSubscription {
    /// Receive the next snapshot
    ///
    /// Returns `None` once the terminal snapshot has been delivered.
    pub async fn recv(&mut self) -> Option<ProgressSnapshot> {
        if self.done {
            return None;
        }

        if self.pending_terminal.is_some() {
            return self.drain_buffered();
        }

        loop {
            match self.rx.recv().await {
                Ok(snapshot) => {
                    if snapshot.complete {
                        self.done = true;
                    }
                    return Some(snapshot);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Progress subscriber lagged, skipped {} snapshots", skipped);
                }
                Err(RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }

    // Job already terminal at subscribe time: deliver whatever reached `rx`
    // before the terminal snapshot, then the terminal snapshot itself.
    fn drain_buffered(&mut self) -> Option<ProgressSnapshot> {
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => {
                    if snapshot.complete {
                        self.pending_terminal = None;
                        self.done = true;
                    }
                    return Some(snapshot);
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {
                    self.done = true;
                    return self.pending_terminal.take();
                }
            }
        }
    }

    /// Whether the terminal snapshot has been delivered
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Adapt the subscription into a `Stream` that ends after the terminal snapshot
    pub fn into_stream(self) -> impl Stream<Item = ProgressSnapshot> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|snapshot| (snapshot, subscription))
        })
    }
}
