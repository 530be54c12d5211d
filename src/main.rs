//! Academy - REST gateway for a course catalog

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use academy::{
    config::Args,
    db::{Collections, MongoClient},
    nats::NatsClient,
    server,
    services::{self, CourseDirectory, HttpCourseDirectory, Services},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("academy={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Academy - Course Catalog Gateway");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("v1 identifiers: {}", args.v1_policy().name());
    info!("v2 identifiers: strict");
    info!(
        "MongoDB: {}",
        if args.memory_store { "disabled (memory store)" } else { args.mongodb_uri.as_str() }
    );
    info!("NATS: {}", args.nats.nats_url.as_deref().unwrap_or("disabled"));
    info!("Catalog: {}", args.catalog_url.as_deref().unwrap_or("local"));
    info!("======================================");

    // Storage: MongoDB unless the memory store is requested (fallback in dev mode)
    let collections = if args.memory_store {
        warn!("Using in-memory store; data is lost on restart");
        Collections::memory()
    } else {
        match connect_mongo(&args).await {
            Ok(collections) => {
                info!("MongoDB connected successfully");
                collections
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                    Collections::memory()
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    // Certificates verify courses against a remote catalog when configured
    let directory: Option<Arc<dyn CourseDirectory>> = args.catalog_url.as_deref().map(|url| {
        let timeout = Duration::from_millis(args.request_timeout_ms);
        Arc::new(HttpCourseDirectory::new(url, timeout)) as Arc<dyn CourseDirectory>
    });

    let services = Services::new(collections, directory);
    services::spawn_logging_listener(Arc::clone(&services.events));

    // Connect to NATS (optional; events stay in-process without it)
    let mut nats_connected = false;
    if let Some(url) = args.nats.nats_url.as_deref() {
        match NatsClient::new(url, &args.nats, "academy").await {
            Ok(client) => {
                info!("NATS connected successfully");
                services::spawn_nats_forwarder(
                    Arc::clone(&services.events),
                    client,
                    args.nats.event_subject_prefix.clone(),
                );
                nats_connected = true;
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("NATS connection failed (dev mode, continuing without): {}", e);
                } else {
                    error!("NATS connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    let state = server::AppState::new(args, services).with_nats(nats_connected);
    server::run(Arc::new(state)).await?;

    Ok(())
}

async fn connect_mongo(args: &Args) -> academy::Result<Collections> {
    let client = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    info!(db = client.db_name(), "Ensuring collection indexes");
    Collections::mongo(&client).await
}
