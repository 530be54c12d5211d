//! NATS client wrapper
//!
//! Connection management and JSON publishing for event forwarding.

use async_nats::{Client, ConnectOptions};
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::config::NatsArgs;
use crate::types::{Result, ServiceError};

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    /// Client name for logging
    name: String,
}

impl NatsClient {
    /// Connect to the configured server
    pub async fn new(url: &str, args: &NatsArgs, name: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        // No retry on the initial connect; reconnection still applies afterwards
        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(url)
            .await
            .map_err(|e| ServiceError::Nats(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", url);

        Ok(Self {
            client,
            name: name.to_string(),
        })
    }

    /// Publish a message to a subject
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| ServiceError::Nats(format!("Publish failed: {}", e)))
    }

    /// Serialize a value as JSON and publish it
    pub async fn publish_json<T: Serialize>(&self, subject: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish(subject, Bytes::from(payload)).await
    }

    /// Flush pending messages
    pub async fn flush(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| ServiceError::Nats(format!("Flush failed: {}", e)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
