use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use gpumon_dashboard::{PollState, PollStatus};

use crate::state::AppState;

#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
    pub status_2xx: AtomicU64,
    pub status_4xx: AtomicU64,
    pub status_5xx: AtomicU64,
}

impl Metrics {
    pub fn render(&self, poll: &PollStatus) -> String {
        let polling = u8::from(poll.state == PollState::Polling);
        let last_success = poll.last_success.map(|t| t.timestamp()).unwrap_or(0);
        format!(
            "gpumon_dashboard_requests_total {}\n\
             gpumon_dashboard_requests_inflight {}\n\
             gpumon_dashboard_responses_2xx {}\n\
             gpumon_dashboard_responses_4xx {}\n\
             gpumon_dashboard_responses_5xx {}\n\
             gpumon_dashboard_polling {}\n\
             gpumon_dashboard_fetches_started_total {}\n\
             gpumon_dashboard_fetches_succeeded_total {}\n\
             gpumon_dashboard_fetches_failed_total {}\n\
             gpumon_dashboard_snapshots_rejected_total {}\n\
             gpumon_dashboard_last_success_timestamp_seconds {}\n",
            self.requests_total.load(Ordering::Relaxed),
            self.requests_inflight.load(Ordering::Relaxed),
            self.status_2xx.load(Ordering::Relaxed),
            self.status_4xx.load(Ordering::Relaxed),
            self.status_5xx.load(Ordering::Relaxed),
            polling,
            poll.fetches_started,
            poll.fetches_succeeded,
            poll.fetches_failed,
            poll.snapshots_rejected,
            last_success,
        )
    }
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    let poll = st.dashboard.status().await;
    (axum::http::StatusCode::OK, st.metrics.render(&poll))
}

pub async fn track_requests(
    State(st): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, std::convert::Infallible> {
    st.metrics.requests_inflight.fetch_add(1, Ordering::Relaxed);
    let resp = next.run(req).await;
    st.metrics.requests_inflight.fetch_sub(1, Ordering::Relaxed);
    st.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let status = resp.status().as_u16();
    if status >= 500 {
        st.metrics.status_5xx.fetch_add(1, Ordering::Relaxed);
    } else if status >= 400 {
        st.metrics.status_4xx.fetch_add(1, Ordering::Relaxed);
    } else if status >= 200 {
        st.metrics.status_2xx.fetch_add(1, Ordering::Relaxed);
    }

    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_poll_counters() {
        let metrics = Metrics::default();
        metrics.requests_total.store(4, Ordering::Relaxed);
        let poll = PollStatus {
            state: PollState::Polling,
            fetches_started: 7,
            fetches_failed: 2,
            snapshots_rejected: 1,
            ..Default::default()
        };
        let text = metrics.render(&poll);
        assert!(text.contains("gpumon_dashboard_requests_total 4\n"));
        assert!(text.contains("gpumon_dashboard_polling 1\n"));
        assert!(text.contains("gpumon_dashboard_fetches_started_total 7\n"));
        assert!(text.contains("gpumon_dashboard_fetches_failed_total 2\n"));
        assert!(text.contains("gpumon_dashboard_snapshots_rejected_total 1\n"));
        assert!(text.contains("gpumon_dashboard_last_success_timestamp_seconds 0\n"));
    }
}
