//! Orchestrator events as server-sent events.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::Extension,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use erpbot_agent::{Bot, BotEvent};

/// GET /bot/events
///
/// One SSE message per event, `event:` set to the event name and `data:` the
/// JSON payload. A subscriber that falls behind skips what it missed.
pub async fn stream(Extension(bot): Extension<Bot>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let events = BroadcastStream::new(bot.subscribe()).filter_map(|received| match received {
        Ok(event) => Some(Ok::<_, Infallible>(to_sse(&event))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(skipped, "event subscriber lagged");
            None
        }
    });
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn to_sse(event: &BotEvent) -> SseEvent {
    let sse = SseEvent::default().event(event.name());
    match serde_json::to_value(event) {
        Ok(value) => sse.data(value.get("data").map(|d| d.to_string()).unwrap_or_else(|| "null".into())),
        Err(e) => {
            warn!(event = event.name(), error = %e, "event not serializable");
            sse.data("null")
        }
    }
}
