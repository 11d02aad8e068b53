//! Server-Sent Events for score updates
//!
//! Push channel of the two-source notification model: clients subscribe
//! here for live score transitions and fall back to polling
//! `GET /api/report/:key` when SSE delivery is unavailable. Both sources
//! converge through the forward-transition reducer client-side.

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::AppState;

/// Query parameters for the event stream
#[derive(Debug, Deserialize)]
pub struct EventStreamParams {
    /// When present, only events for this restaurant key are delivered
    pub restaurant_key: Option<String>,
}

/// GET /events - SSE stream of score events
///
/// Streams ScanStarted, AnalysisCompleted, VerificationRecorded, and
/// ReportDebunked events, optionally filtered to a single restaurant key.
/// Heartbeats every 15 seconds keep idle connections alive.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(params): Query<EventStreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(
        restaurant_key = ?params.restaurant_key,
        "New SSE client connected to score events"
    );

    let mut rx = state.event_bus.subscribe();
    let filter_key = params.restaurant_key;

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                result = rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(e) => {
                            // Lagged or closed; drop this client's stream
                            warn!("SSE: event receive failed: {}", e);
                            break;
                        }
                    };

                    if let Some(key) = &filter_key {
                        if event.restaurant_key() != key {
                            continue;
                        }
                    }

                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting score event: {}", event.event_type());
                            yield Ok(Event::default()
                                .event(event.event_type())
                                .data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event: {}", e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
