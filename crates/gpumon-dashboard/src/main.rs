mod args;
mod handlers;
mod metrics;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;

use gpumon_dashboard::{Dashboard, HttpStatusSource, PollConfig};

use crate::args::Args;
use crate::handlers::{
    auto_update, header_position, healthz, index, poll_status, refresh, stop_update, view,
    web_asset,
};
use crate::metrics::{metrics_handler, track_requests, Metrics};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let otel_provider = gpumon_common::telemetry::init_tracing(
        "gpumon-dashboard",
        args.log_format,
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );

    let config = PollConfig {
        interval: Duration::from_millis(args.poll_interval_ms),
        fetch_timeout: Duration::from_millis(args.fetch_timeout_ms),
    };
    let source = HttpStatusSource::new(&args.status_url, config.fetch_timeout)?;
    let dashboard = Arc::new(Dashboard::new(Arc::new(source), config));

    if args.auto_start {
        dashboard.start().await;
    }

    let st = AppState {
        dashboard: dashboard.clone(),
        metrics: Arc::new(Metrics::default()),
        pin_threshold: args.pin_threshold,
        web_dir: args.web_dir,
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/view", get(view))
        .route("/poll-status", get(poll_status))
        .route("/refresh", post(refresh))
        .route("/auto-update", post(auto_update))
        .route("/stop-update", post(stop_update))
        .route("/header-position", get(header_position))
        .route("/web/:file", get(web_asset))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(st.clone(), track_requests))
        .with_state(st);

    tracing::info!(
        listen_addr = %args.listen_addr,
        status_url = %args.status_url,
        "gpumon dashboard listening"
    );
    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    dashboard.stop().await;
    if let Some(provider) = otel_provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("failed to flush traces: {e}");
        }
    }
    Ok(())
}
