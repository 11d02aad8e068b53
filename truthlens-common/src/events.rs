//! Event types and EventBus for Truthlens
//!
//! Score events are broadcast via the EventBus and serialized for SSE
//! transmission; the server and any in-process subscriber share one bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::TruthReport;

/// Score lifecycle events.
///
/// Every event carries the restaurant key so SSE streams can filter per
/// record, and the mutating events carry the full updated report so
/// subscribers never need a follow-up read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScoreEvent {
    /// A background audit was started for a missing or stale record
    ScanStarted {
        restaurant_key: String,
        timestamp: DateTime<Utc>,
    },

    /// The forensic analysis completed and the record moved to `ready`
    AnalysisCompleted {
        restaurant_key: String,
        report: TruthReport,
        timestamp: DateTime<Utc>,
    },

    /// A verifier submission was appended and the blend recomputed
    VerificationRecorded {
        restaurant_key: String,
        report: TruthReport,
        timestamp: DateTime<Utc>,
    },

    /// The reveal workflow marked the record debunked (terminal)
    ReportDebunked {
        restaurant_key: String,
        timestamp: DateTime<Utc>,
    },
}

impl ScoreEvent {
    /// Event type name for SSE `event:` fields
    pub fn event_type(&self) -> &'static str {
        match self {
            ScoreEvent::ScanStarted { .. } => "ScanStarted",
            ScoreEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            ScoreEvent::VerificationRecorded { .. } => "VerificationRecorded",
            ScoreEvent::ReportDebunked { .. } => "ReportDebunked",
        }
    }

    /// Restaurant key the event concerns
    pub fn restaurant_key(&self) -> &str {
        match self {
            ScoreEvent::ScanStarted { restaurant_key, .. }
            | ScoreEvent::AnalysisCompleted { restaurant_key, .. }
            | ScoreEvent::VerificationRecorded { restaurant_key, .. }
            | ScoreEvent::ReportDebunked { restaurant_key, .. } => restaurant_key,
        }
    }
}

/// Broadcast bus for score events.
///
/// Cloning is cheap; all clones share the same channel. Dropping a receiver
/// unsubscribes it; no callbacks fire after teardown.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScoreEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    ///
    /// Old events are dropped once the buffer fills; subscribers only see
    /// events emitted after they subscribed.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScoreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the no-subscriber case.
    ///
    /// Score events are advisory: a record update is already durable in the
    /// store before its event is emitted, so a missed event only delays a
    /// poll-path refresh.
    pub fn emit_lossy(&self, event: ScoreEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("No subscribers for score event: {}", e);
        }
    }

    /// Current subscriber count (for diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
