use std::path::PathBuf;
use std::sync::Arc;

use gpumon_dashboard::Dashboard;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub metrics: Arc<Metrics>,
    pub pin_threshold: f64,
    pub web_dir: Option<PathBuf>,
}
