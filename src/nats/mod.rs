//! NATS messaging
//!
//! Catalog events are forwarded to NATS when a server is configured.

pub mod client;

pub use client::NatsClient;
