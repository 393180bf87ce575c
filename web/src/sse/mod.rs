//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the event stream endpoint.
//! The broadcast hub and the frame codec live in the `sse` crate.

pub mod handler;
