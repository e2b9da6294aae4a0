use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::bus::Event;

/// Forward bus events matching `filter` as SSE, named by event type.
pub fn event_stream<F>(
    mut rx: broadcast::Receiver<Event>,
    filter: F,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>>
where
    F: Fn(&Event) -> bool + Send + 'static,
{
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !filter(&event) {
                        continue;
                    }
                    match SseEvent::default().event(event.name()).json_data(&event) {
                        Ok(sse) => yield Ok::<_, Infallible>(sse),
                        Err(e) => error!("Failed to encode event: {}", e),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
