//! Server-sent events for registry lifecycle changes.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use runway_core::domain::RegistryEvent;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Interval between keep-alive comments.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Turn a registry event receiver into an SSE response.
///
/// Events are sent as JSON with the event type as the SSE event name. A
/// client that falls behind skips the events it missed.
pub fn event_stream(
    receiver: broadcast::Receiver<RegistryEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(event) => match Event::default().event(event_name(&event)).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!("Failed to serialize event: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::debug!("SSE stream error: {}", e);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

const fn event_name(event: &RegistryEvent) -> &'static str {
    match event {
        RegistryEvent::Activated { .. } => "activated",
        RegistryEvent::Failover { .. } => "failover",
        RegistryEvent::Degraded { .. } => "degraded",
        RegistryEvent::Registered { .. } => "registered",
        RegistryEvent::Removed { .. } => "removed",
    }
}
