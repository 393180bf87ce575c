//! Sample event producer used when no upstream feed is configured.

use crate::{Error, Event, EventPublisher};
use log::*;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Cycles through a fixed table of data sets, publishing one `{"setN": {...}}`
/// event per tick until the publisher reports that it is closed.
pub struct DemoSource {
    sets: Vec<(String, Value)>,
    interval: Duration,
    source: String,
}

impl DemoSource {
    pub fn new(interval: Duration, source: impl Into<String>) -> Self {
        let sets = [
            ("set1", "hello", "world"),
            ("set2", "foo", "bar"),
            ("set3", "tic", "toc"),
            ("set4", "zom", "bee"),
        ]
        .into_iter()
        .map(|(key, val1, val2)| (key.to_string(), json!({ "val1": val1, "val2": val2 })))
        .collect();

        Self {
            sets,
            interval,
            source: source.into(),
        }
    }

    /// Builds the event for the `index`th tick.
    pub fn event_at(&self, index: usize) -> Result<Event, Error> {
        let (key, value) = &self.sets[index % self.sets.len()];
        let mut payload = Map::new();
        payload.insert(key.clone(), value.clone());
        Event::from_json(&payload, self.source.as_str())
    }

    /// Publishes forever, or until the publisher is closed.
    pub async fn run(self, publisher: EventPublisher) {
        info!(
            "Demo source publishing every {}ms as {}",
            self.interval.as_millis(),
            self.source
        );

        let mut ticker = tokio::time::interval(self.interval);
        let mut index = 0usize;

        loop {
            ticker.tick().await;

            let event = self.event_at(index);
            index = index.wrapping_add(1);

            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    error!("Failed to build demo event: {e}");
                    continue;
                }
            };

            match publisher.publish(event).await {
                Ok(()) => {}
                Err(Error::Closed) => {
                    info!("Event destination closed, demo source stopping");
                    break;
                }
                Err(e) => warn!("Demo event was not fully delivered: {e}"),
            }
        }
    }
}
