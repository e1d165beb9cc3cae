//! Route handlers for the HTTP API.

pub mod clips;
pub mod health;
pub mod streaming_helpers;
