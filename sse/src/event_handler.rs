use crate::error::Error;
use crate::hub::Hub;
use async_trait::async_trait;
use events::{Event, EventHandler};
use log::*;

/// Forwards published events into the broadcast hub.
///
/// This is what connects an `EventPublisher` (fed by the demo source or the
/// upstream relay) to the hub. A closed hub is reported as
/// [`events::Error::Closed`] so producers know to stop.
pub struct HubEventHandler {
    hub: Hub,
}

impl HubEventHandler {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl EventHandler for HubEventHandler {
    async fn handle(&self, event: &Event) -> Result<(), events::Error> {
        match self.hub.publish(event.clone()).await {
            Ok(delivered) => {
                debug!("Broadcast event {} to {delivered} subscriber(s)", event.id());
                Ok(())
            }
            Err(Error::HubClosed) => Err(events::Error::Closed),
            Err(e) => Err(events::Error::Handler(Box::new(e))),
        }
    }
}
