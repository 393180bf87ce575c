//! Server-Sent Events (SSE) broadcast infrastructure.
//!
//! This crate fans published events out to every live HTTP stream and owns
//! the text framing those streams carry.
//!
//! # Architecture
//!
//! - **Single control loop**: the [`Hub`] runs one task that owns the
//!   subscriber set. Subscribe, unsubscribe, publish and shutdown requests
//!   are queued to it and handled one at a time, so every subscriber sees
//!   the same events in the same order.
//! - **Bounded inboxes**: each [`Subscription`] has its own bounded inbox.
//!   A subscriber whose inbox is full misses that event; nobody else waits
//!   on it.
//! - **Replay buffer**: optionally, the last N events are handed to each new
//!   subscriber before any live event.
//! - **Completion**: on shutdown the hub lets go of every inbox. Subscribers
//!   drain what is buffered and then see [`Delivery::Completed`].
//!
//! # Message Flow
//!
//! 1. An event source publishes through `events::EventPublisher`
//! 2. [`HubEventHandler`] forwards each event to [`Hub::publish`]
//! 3. The control loop offers the event to every registered inbox
//! 4. Each stream handler receives it from its [`Subscription`], encodes it
//!    with [`codec::encode`] and writes the frame to its client
//!
//! # Modules
//!
//! - `codec`: frame encoding, decoding and reassembly from byte chunks
//! - `hub`: the broadcast hub and its control loop
//! - `subscription`: subscription handle, identity and lifecycle state
//! - `event_handler`: bridge from `EventPublisher` to the hub
//! - `relay`: event source that republishes an upstream SSE feed

pub mod codec;
pub mod error;
pub mod event_handler;
pub mod hub;
pub mod relay;
pub mod subscription;

pub use error::Error;
pub use event_handler::HubEventHandler;
pub use hub::{Hub, HubConfig};
pub use subscription::{Delivery, Subscription, SubscriptionId, SubscriptionState};
