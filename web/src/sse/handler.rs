use crate::error::Result;
use async_stream::stream;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::Stream;
use log::*;
use service::AppState;
use sse::codec::{encode, KEEP_ALIVE_FRAME};
use sse::{Delivery, Subscription};
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// SSE handler that streams every broadcast event to one client.
///
/// The subscription is registered before the response is returned, so
/// everything published after the headers go out reaches this client. The
/// stream ends normally when the hub shuts down. When the client disconnects
/// the body is dropped, and dropping the subscription removes it from the hub.
pub(crate) async fn sse_handler(State(app_state): State<AppState>) -> Result<Response> {
    let subscription = app_state.hub().subscribe().await?;
    let start_id = chrono::Utc::now().timestamp().to_string();

    debug!(
        "Establishing SSE stream {} (start id {start_id})",
        subscription.id()
    );

    let body = Body::from_stream(frames(subscription, app_state.config.keep_alive()));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream".to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::HeaderName::from_static("last-event-id"), start_id),
            (header::SERVER, "sse-hub".to_string()),
        ],
        body,
    )
        .into_response())
}

/// One body chunk per frame, so every event is flushed on its own.
fn frames(
    mut subscription: Subscription,
    keep_alive: Option<Duration>,
) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> {
    stream! {
        let mut ticker = keep_alive.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            let delivery = match ticker.as_mut() {
                Some(ticker) => tokio::select! {
                    delivery = subscription.recv() => Some(delivery),
                    _ = ticker.tick() => None,
                },
                None => Some(subscription.recv().await),
            };

            match delivery {
                Some(Delivery::Event(event)) => {
                    yield Ok::<Bytes, Infallible>(Bytes::from(encode(&event)));
                    // Keep-alives only go out after a full idle period.
                    if let Some(ticker) = ticker.as_mut() {
                        ticker.reset();
                    }
                }
                Some(Delivery::Completed) => {
                    debug!("Hub completed SSE stream {}", subscription.id());
                    break;
                }
                None => {
                    yield Ok(Bytes::from_static(KEEP_ALIVE_FRAME));
                }
            }
        }
    }
}
