mod config;
mod error;
mod handlers;
mod ingest;
mod pipeline_runner;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use analytics_store::{AnalyticsStore, TtlConfig};
use push_channel::DownstreamNotifier;

use crate::config::Config;
use crate::state::AppState;

const TTL_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let store = Arc::new(AnalyticsStore::new(TtlConfig::default()));
    tokio::spawn(store.clone().run_ttl_sweeper(TTL_SWEEP_PERIOD));

    let notifier = DownstreamNotifier::spawn(config.core_service_url.clone(), reqwest::Client::new());

    let state = Arc::new(AppState::new(config, store, notifier));
    let app = routes::build(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {addr}: {err}"));
    tracing::info!(%addr, "analytics service listening");

    axum::serve(listener, app)
        .await
        .expect("analytics service server exited unexpectedly");
}
