use std::path::PathBuf;

use clap::Parser;

use gpumon_common::telemetry::LogFormat;
use gpumon_dashboard::scroll::DEFAULT_PIN_THRESHOLD;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[arg(long, env = "GPUMON_DASHBOARD_ADDR", default_value = "0.0.0.0:8090")]
    pub listen_addr: String,

    /// Cluster status endpoint, e.g. "http://10.0.0.5:8000/get-status".
    #[arg(long, env = "GPUMON_STATUS_URL", default_value = "http://127.0.0.1:8000/get-status")]
    pub status_url: String,

    #[arg(long, env = "GPUMON_POLL_INTERVAL_MS", default_value_t = 3000)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "GPUMON_FETCH_TIMEOUT_MS", default_value_t = 2000)]
    pub fetch_timeout_ms: u64,

    /// Scroll offset past which the header row is pinned.
    #[arg(long, env = "GPUMON_PIN_THRESHOLD", default_value_t = DEFAULT_PIN_THRESHOLD)]
    pub pin_threshold: f64,

    /// Start auto-update as soon as the server is up.
    #[arg(long, env = "GPUMON_AUTO_START", default_value_t = false)]
    pub auto_start: bool,

    /// Directory whose files override the bundled `/web/` assets.
    #[arg(long, env = "GPUMON_WEB_DIR")]
    pub web_dir: Option<PathBuf>,

    #[arg(long, env = "GPUMON_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// OTLP endpoint for exporting traces.
    #[arg(long, env = "GPUMON_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Bearer token for the OTLP endpoint.
    #[arg(long, env = "GPUMON_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
