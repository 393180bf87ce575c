//! Republishes events read from an upstream `text/event-stream` feed.

use crate::codec::{decode, is_comment_frame, FrameBuffer};
use crate::error::Error;
use events::EventPublisher;
use futures_util::StreamExt;
use log::*;
use reqwest::header::ACCEPT;
use std::time::Duration;

/// Upper bound for the delay between reconnect attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

pub struct Relay {
    client: reqwest::Client,
    url: String,
    source: String,
    reconnect: Option<Duration>,
}

/// How one connection to the upstream ended.
enum Session {
    UpstreamClosed(usize),
    DestinationClosed(usize),
}

impl Relay {
    /// `source` replaces the `source` field of every relayed event so
    /// subscribers can tell which process handed it to them.
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            source: source.into(),
            reconnect: None,
        }
    }

    /// Reconnect after the upstream closes or fails, waiting `delay` first.
    /// The delay doubles after every attempt that relays nothing, up to
    /// [`MAX_RECONNECT_DELAY`].
    pub fn with_reconnect(mut self, delay: Duration) -> Self {
        self.reconnect = Some(delay);
        self
    }

    /// Relays until the publisher reports that it is closed. Without
    /// reconnects it also stops when the upstream closes the stream or fails.
    /// Returns the number of events relayed.
    pub async fn run(self, publisher: EventPublisher) -> Result<usize, Error> {
        let Some(initial_delay) = self.reconnect else {
            return match self.session(&publisher).await? {
                Session::UpstreamClosed(relayed) => {
                    warn!("Upstream {} closed and reconnects are disabled", self.url);
                    Ok(relayed)
                }
                Session::DestinationClosed(relayed) => Ok(relayed),
            };
        };

        let mut relayed = 0;
        let mut delay = initial_delay;

        loop {
            match self.session(&publisher).await {
                Ok(Session::DestinationClosed(count)) => return Ok(relayed + count),
                Ok(Session::UpstreamClosed(count)) => {
                    relayed += count;
                    if count > 0 {
                        delay = initial_delay;
                    }
                    error!("Upstream {} closed, reconnecting in {delay:?}", self.url);
                }
                Err(e) => error!("Upstream {} failed: {e}, reconnecting in {delay:?}", self.url),
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    async fn session(&self, publisher: &EventPublisher) -> Result<Session, Error> {
        info!("Relaying events from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus(status));
        }

        let mut body = response.bytes_stream();
        let mut frames = FrameBuffer::new();
        let mut relayed = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;

            for frame in frames.push(&chunk) {
                if is_comment_frame(&frame) {
                    trace!("Skipping comment frame from upstream");
                    continue;
                }

                let event = decode(&frame).with_source(self.source.as_str());
                match publisher.publish(event).await {
                    Ok(()) => relayed += 1,
                    Err(events::Error::Closed) => {
                        info!("Event destination closed after relaying {relayed} event(s)");
                        return Ok(Session::DestinationClosed(relayed));
                    }
                    Err(e) => warn!("Relayed event was not fully delivered: {e}"),
                }
            }
        }

        if frames.has_partial_frame() {
            warn!("Upstream closed in the middle of a frame, discarding it");
        }
        info!("Upstream {} closed after {relayed} event(s)", self.url);
        Ok(Session::UpstreamClosed(relayed))
    }
}
