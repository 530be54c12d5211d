//! Configuration for the academy gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

use crate::identifier::ResolverPolicy;

/// Academy - course catalog, learning paths, certificates and marketing API
#[derive(Parser, Debug, Clone)]
#[command(name = "academy")]
#[command(about = "REST gateway for the academy course catalog")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "academy")]
    pub mongodb_db: String,

    /// Enable development mode (continue without MongoDB or NATS)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Use the in-memory store even when MongoDB is configured
    #[arg(long, env = "MEMORY_STORE", default_value = "false")]
    pub memory_store: bool,

    /// Apply slug-only resolution to the v1 routes as well
    #[arg(long, env = "STRICT_IDENTIFIERS", default_value = "false")]
    pub strict_identifiers: bool,

    /// Base URL of a remote course catalog used to verify courses when
    /// issuing certificates. Local catalog when unset.
    #[arg(long, env = "CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Outbound HTTP request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL. Events stay in-process when unset.
    #[arg(long, env = "NATS_URL")]
    pub nats_url: Option<String>,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,

    /// Subject prefix for forwarded catalog events
    #[arg(long, env = "EVENT_SUBJECT_PREFIX", default_value = "academy.events")]
    pub event_subject_prefix: String,
}

impl Args {
    /// Resolver policy for the v1 routes
    pub fn v1_policy(&self) -> ResolverPolicy {
        if self.strict_identifiers {
            ResolverPolicy::STRICT
        } else {
            ResolverPolicy::LEGACY_COMPATIBLE
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.mongodb_db.trim().is_empty() {
            return Err("MONGODB_DB must not be empty".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if let Some(url) = &self.catalog_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err("CATALOG_URL must start with http:// or https://".to_string());
            }
        }

        let prefix = &self.nats.event_subject_prefix;
        let valid_prefix = !prefix.is_empty()
            && prefix
                .split('.')
                .all(|token| !token.is_empty() && !token.contains(['*', '>', ' ']));
        if !valid_prefix {
            return Err(format!("EVENT_SUBJECT_PREFIX '{}' is not a valid subject", prefix));
        }

        if self.nats.nats_user.is_some() != self.nats.nats_password.is_some() {
            return Err("NATS_USER and NATS_PASSWORD must be set together".to_string());
        }

        Ok(())
    }
}
