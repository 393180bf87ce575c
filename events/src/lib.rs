//! Event model and publishing infrastructure.
//!
//! This crate provides the pieces shared by everything that produces events:
//!
//! - **Event**: immutable value carrying a payload plus SSE metadata
//! - **EventHandler**: trait for anything that consumes published events
//! - **EventPublisher**: publishes events to registered handlers
//! - **DemoSource**: a producer that manufactures sample events
//!
//! This crate has no dependencies on internal crates, so the broadcast hub
//! (in `sse`) plugs in as just another `EventHandler`.

use async_trait::async_trait;
use log::*;
use std::sync::Arc;

pub mod error;
pub mod event;
pub mod source;

pub use error::Error;
pub use event::{Event, DEFAULT_KIND};

/// Trait for handling published events.
/// Implementations deliver the event somewhere: a broadcast hub, a log, a test probe.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), Error>;
}

/// Publishes events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    /// A failing handler does not stop the remaining ones from running; the
    /// first error is returned once every handler has seen the event.
    pub async fn publish(&self, event: Event) -> Result<(), Error> {
        let mut first_error = None;

        for handler in self.handlers.iter() {
            if let Err(err) = handler.handle(&event).await {
                match first_error {
                    None => first_error = Some(err),
                    Some(_) => warn!("Additional handler failure for event {}: {err}", event.id()),
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
