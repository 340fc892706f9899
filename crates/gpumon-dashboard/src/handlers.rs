use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gpumon_dashboard::assets;
use gpumon_dashboard::html::{render_page, PageOptions};
use gpumon_dashboard::{
    Classification, DashboardView, HeaderPosition, PollState, ScrollPin, ScrollState,
};

use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn index(State(st): State<AppState>) -> Html<String> {
    let status = st.dashboard.status().await;
    let polling = status.state == PollState::Polling;
    let reload_secs = polling.then(|| st.dashboard.config().interval.as_secs().max(1));

    let status_line = match (&status.last_success, &status.last_error) {
        (Some(ok), Some(err)) if err.at > *ok => Some(format!(
            "last update {} (latest poll failed: {})",
            ok.format("%H:%M:%S"),
            err.kind
        )),
        (Some(ok), _) => Some(format!("last update {}", ok.format("%H:%M:%S"))),
        (None, Some(err)) => Some(format!("no data yet ({})", err.kind)),
        (None, None) => None,
    };

    let latest = st.dashboard.latest();
    let opts = PageOptions {
        header: HeaderPosition::Unpinned,
        reload_secs,
        polling,
        status_line,
    };
    Html(render_page(latest.as_ref().map(|p| &p.view), &opts))
}

#[derive(Serialize)]
struct ViewResponse<'a> {
    rendered_at: DateTime<Utc>,
    view: &'a DashboardView,
    classification: &'a Classification,
}

pub async fn view(State(st): State<AppState>) -> Response {
    let Some(published) = st.dashboard.latest() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "no snapshot rendered yet"})),
        )
            .into_response();
    };
    Json(ViewResponse {
        rendered_at: published.rendered_at,
        view: &published.view,
        classification: &published.classification,
    })
    .into_response()
}

pub async fn poll_status(State(st): State<AppState>) -> impl IntoResponse {
    Json(st.dashboard.status().await)
}

/// Runs one fetch and waits for it, so the redirected page shows the result.
pub async fn refresh(State(st): State<AppState>) -> Redirect {
    match st.dashboard.refresh().await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::debug!(error=%e, "manual refresh produced no view"),
        Err(e) => tracing::warn!(error=%e, "manual refresh task failed"),
    }
    Redirect::to("/")
}

pub async fn auto_update(State(st): State<AppState>) -> Redirect {
    st.dashboard.start().await;
    Redirect::to("/")
}

pub async fn stop_update(State(st): State<AppState>) -> Redirect {
    st.dashboard.stop().await;
    Redirect::to("/")
}

#[derive(Debug, Deserialize)]
pub struct HeaderQuery {
    pub scroll_top: f64,
    #[serde(default)]
    pub scroll_left: f64,
    #[serde(default)]
    pub margin_left: f64,
}

/// What the page's scroll hook applies to `#head-line`.
#[derive(Debug, Serialize)]
pub struct HeaderPositionBody {
    pub pinned: bool,
    pub left: Option<f64>,
    pub class: Option<&'static str>,
    pub style: Option<String>,
}

impl From<HeaderPosition> for HeaderPositionBody {
    fn from(pos: HeaderPosition) -> Self {
        Self {
            pinned: pos.is_pinned(),
            left: match pos {
                HeaderPosition::Pinned { left } => Some(left),
                HeaderPosition::Unpinned => None,
            },
            class: pos.class(),
            style: pos.style(),
        }
    }
}

pub async fn header_position(
    State(st): State<AppState>,
    Query(q): Query<HeaderQuery>,
) -> Json<HeaderPositionBody> {
    let pin = ScrollPin::new(st.pin_threshold);
    let pos = pin.evaluate(&ScrollState {
        scroll_top: q.scroll_top,
        scroll_left: q.scroll_left,
        header_left_margin: q.margin_left,
    });
    Json(pos.into())
}

/// `GET /web/:file`: the configured web dir first, then the bundled copy.
pub async fn web_asset(State(st): State<AppState>, Path(file): Path<String>) -> Response {
    let content_type = match assets::content_type(&file) {
        Some(ct) if assets::is_safe_name(&file) => ct,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    if let Some(dir) = &st.web_dir {
        match tokio::fs::read(dir.join(&file)).await {
            Ok(body) => return ([(header::CONTENT_TYPE, content_type)], body).into_response(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error=%e, file=%file, "failed to read web asset");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    match assets::bundled(&file) {
        Some(body) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gpumon_common::ClusterSnapshot;
    use gpumon_dashboard::{Dashboard, FetchError, PollConfig, StatusSource};

    use crate::metrics::Metrics;

    struct StaticSource;

    #[async_trait::async_trait]
    impl StatusSource for StaticSource {
        async fn fetch(&self) -> Result<ClusterSnapshot, FetchError> {
            Ok(serde_json::from_value(serde_json::json!({
                "calendar_status": false,
                "Nodes": [{
                    "hostname": "gpu01", "status": "ok", "version": "1.0", "ips": [],
                    "gpus": [{"index": 0, "use_mem": 2, "tot_mem": 8, "utilize": 10, "users": []}]
                }],
                "illegal_users": []
            }))?)
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn app_state() -> AppState {
        AppState {
            dashboard: Arc::new(Dashboard::new(Arc::new(StaticSource), PollConfig::default())),
            metrics: Arc::new(Metrics::default()),
            pin_threshold: 345.6,
            web_dir: None,
        }
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn content_type(resp: &Response) -> &str {
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_index_before_first_poll() {
        let st = app_state();
        let Html(page) = index(State(st)).await;
        assert!(page.contains("<div id=\"content-status\"></div>"));
        assert!(page.contains("action=\"/auto-update\""));
    }

    #[tokio::test]
    async fn test_refresh_then_index_shows_node() {
        let st = app_state();
        let resp = refresh(State(st.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let Html(page) = index(State(st.clone())).await;
        assert!(page.contains("<div class=\"node-name\">gpu01</div>"));
        assert!(page.contains("last update"));
        assert_eq!(st.dashboard.state().await, PollState::Idle);
    }

    #[tokio::test]
    async fn test_page_loads_scroll_hook_and_stylesheet() {
        let st = app_state();
        st.dashboard.poll_once().await.unwrap();
        let Html(page) = index(State(st.clone())).await;
        assert!(page.contains("<div id=\"head-line\">"));

        for link in ["/web/pin.js", "/web/style.css"] {
            assert!(page.contains(link), "page does not load {link}");
            let file = link.trim_start_matches("/web/").to_string();
            let resp = web_asset(State(st.clone()), Path(file)).await;
            assert_eq!(resp.status(), StatusCode::OK, "{link} is not served");
        }
    }

    #[tokio::test]
    async fn test_view_unavailable_until_rendered() {
        let st = app_state();
        let resp = view(State(st.clone())).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        st.dashboard.poll_once().await.unwrap();
        let resp = view(State(st)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_and_stop_toggle_state() {
        let st = app_state();
        let resp = auto_update(State(st.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(st.dashboard.state().await, PollState::Polling);

        let resp = stop_update(State(st.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(st.dashboard.state().await, PollState::Idle);
    }

    #[tokio::test]
    async fn test_header_position() {
        let st = app_state();
        let q = HeaderQuery {
            scroll_top: 400.0,
            scroll_left: 50.0,
            margin_left: 8.0,
        };
        let Json(body) = header_position(State(st.clone()), Query(q)).await;
        assert!(body.pinned);
        assert_eq!(body.left, Some(-42.0));
        assert_eq!(body.class, Some("nav-at-top"));
        assert_eq!(body.style.as_deref(), Some("left: -42px"));

        let q = HeaderQuery {
            scroll_top: 300.0,
            scroll_left: 0.0,
            margin_left: 8.0,
        };
        let Json(body) = header_position(State(st), Query(q)).await;
        assert!(!body.pinned);
        assert_eq!(body.class, None);
        assert_eq!(body.style, None);
    }

    #[tokio::test]
    async fn test_bundled_assets_served_with_content_type() {
        let st = app_state();
        let resp = web_asset(State(st.clone()), Path("style.css".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "text/css; charset=utf-8");
        assert!(body_text(resp).await.contains(".illegal_maxday"));

        let resp = web_asset(State(st.clone()), Path("pin.js".to_string())).await;
        assert_eq!(content_type(&resp), "application/javascript; charset=utf-8");
        assert!(body_text(resp).await.contains("/header-position"));

        for missing in ["nope.css", "../Cargo.toml", ".hidden.js", "notes.txt"] {
            let resp = web_asset(State(st.clone()), Path(missing.to_string())).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{missing}");
        }
    }

    #[tokio::test]
    async fn test_web_dir_overrides_bundled_assets() {
        let dir = std::env::temp_dir().join(format!("gpumon-web-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("style.css"), "body { color: red; }").unwrap();
        std::fs::write(dir.join("extra.js"), "console.log(1);").unwrap();

        let st = AppState {
            web_dir: Some(dir.clone()),
            ..app_state()
        };
        let resp = web_asset(State(st.clone()), Path("style.css".to_string())).await;
        assert_eq!(body_text(resp).await, "body { color: red; }");

        let resp = web_asset(State(st.clone()), Path("extra.js".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // falls back to the bundled copy
        let resp = web_asset(State(st), Path("pin.js".to_string())).await;
        assert!(body_text(resp).await.contains("/header-position"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
