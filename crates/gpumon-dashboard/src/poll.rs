//! Poll loop: owns the auto-update timer and the latest rendered snapshot.
//!
//! Every fetch runs as its own task. In-flight fetches are never cancelled,
//! so a response that lands after [`Dashboard::stop`] still replaces the view,
//! and when fetches overlap the last one to complete wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use gpumon_common::ClusterSnapshot;

use crate::classify::{classify, Classification};
use crate::error::{FetchError, PollError};
use crate::render::render_view;
use crate::source::StatusSource;
use crate::view::DashboardView;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    #[default]
    Idle,
    Polling,
}

/// One successfully rendered poll.
#[derive(Debug)]
pub struct Published {
    pub snapshot: ClusterSnapshot,
    pub classification: Classification,
    pub view: DashboardView,
    pub rendered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollFailure {
    pub at: DateTime<Utc>,
    pub kind: &'static str,
    pub message: String,
}

/// Observable poll health. The page itself stays silent on failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStatus {
    pub state: PollState,
    pub source: String,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<PollFailure>,
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub snapshots_rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Default)]
struct Outcome {
    last_success: Option<DateTime<Utc>>,
    last_error: Option<PollFailure>,
}

struct Shared {
    source: Arc<dyn StatusSource>,
    config: PollConfig,
    view_tx: watch::Sender<Option<Arc<Published>>>,
    outcome: RwLock<Outcome>,
    counters: Counters,
}

impl Shared {
    async fn poll_once(&self) -> Result<Arc<Published>, PollError> {
        self.counters.started.fetch_add(1, Ordering::Relaxed);

        match self.fetch_and_render().await {
            Ok(published) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                self.outcome.write().await.last_success = Some(published.rendered_at);
                self.view_tx.send_replace(Some(published.clone()));
                tracing::debug!(
                    nodes = published.view.nodes.len(),
                    illegal_users = published.classification.illegal_users.len(),
                    violations = published.classification.violations(),
                    "view rebuilt"
                );
                Ok(published)
            }
            Err(e) => {
                if e.is_rejection() {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error=%e, "skipping render of malformed snapshot");
                } else {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        error=%e,
                        source=%self.source.describe(),
                        "status fetch dropped"
                    );
                }
                self.outcome.write().await.last_error = Some(PollFailure {
                    at: Utc::now(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn fetch_and_render(&self) -> Result<Arc<Published>, PollError> {
        let timeout = self.config.fetch_timeout;
        let snapshot = match tokio::time::timeout(timeout, self.source.fetch()).await {
            Ok(res) => res?,
            Err(_) => return Err(FetchError::Timeout(timeout).into()),
        };

        let classification = classify(&snapshot);
        let view = render_view(&snapshot, &classification)?;
        Ok(Arc::new(Published {
            snapshot,
            classification,
            view,
            rendered_at: Utc::now(),
        }))
    }
}

fn spawn_poll(shared: Arc<Shared>) -> JoinHandle<Result<Arc<Published>, PollError>> {
    tokio::spawn(async move { shared.poll_once().await })
}

async fn timer_loop(shared: Arc<Shared>) {
    let period = shared.config.interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        // fire and forget: a slow fetch must not delay the next tick
        let _ = spawn_poll(shared.clone());
    }
}

/// Poll-loop controller.
///
/// Lifecycle: [`Dashboard::new`], then any sequence of `start`/`stop`/
/// `refresh`, then [`Dashboard::dispose`] (or drop).
pub struct Dashboard {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("source", &self.shared.source.describe())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Dashboard {
    pub fn new(source: Arc<dyn StatusSource>, config: PollConfig) -> Self {
        let (view_tx, _rx) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                source,
                config,
                view_tx,
                outcome: RwLock::new(Outcome::default()),
                counters: Counters::default(),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> PollConfig {
        self.shared.config
    }

    /// Idle -> Polling. Fires one immediate fetch besides arming the timer.
    ///
    /// Returns `false` and does nothing when auto-update is already running,
    /// so repeated starts never stack timers.
    pub async fn start(&self) -> bool {
        let mut timer = self.timer.lock().await;
        if timer.is_some() {
            tracing::debug!("auto-update already running");
            return false;
        }
        *timer = Some(tokio::spawn(timer_loop(self.shared.clone())));
        drop(timer);

        let _ = spawn_poll(self.shared.clone());
        tracing::info!(
            interval_ms = self.shared.config.interval.as_millis() as u64,
            source = %self.shared.source.describe(),
            "auto-update started"
        );
        true
    }

    /// Polling -> Idle. Cancels the timer; fetches already in flight still
    /// complete and publish.
    pub async fn stop(&self) -> bool {
        let Some(handle) = self.timer.lock().await.take() else {
            return false;
        };
        handle.abort();
        tracing::info!("auto-update stopped");
        true
    }

    /// One immediate fetch in the background. Timer state is untouched.
    pub fn refresh(&self) -> JoinHandle<Result<Arc<Published>, PollError>> {
        spawn_poll(self.shared.clone())
    }

    /// One fetch, awaited.
    pub async fn poll_once(&self) -> Result<Arc<Published>, PollError> {
        self.shared.poll_once().await
    }

    pub async fn state(&self) -> PollState {
        if self.timer.lock().await.is_some() {
            PollState::Polling
        } else {
            PollState::Idle
        }
    }

    /// Most recent successfully rendered snapshot, if any.
    pub fn latest(&self) -> Option<Arc<Published>> {
        self.shared.view_tx.borrow().clone()
    }

    /// Receives every newly published view.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Published>>> {
        self.shared.view_tx.subscribe()
    }

    pub async fn status(&self) -> PollStatus {
        let outcome = self.shared.outcome.read().await;
        let c = &self.shared.counters;
        PollStatus {
            state: self.state().await,
            source: self.shared.source.describe(),
            last_success: outcome.last_success,
            last_error: outcome.last_error.clone(),
            fetches_started: c.started.load(Ordering::Relaxed),
            fetches_succeeded: c.succeeded.load(Ordering::Relaxed),
            fetches_failed: c.failed.load(Ordering::Relaxed),
            snapshots_rejected: c.rejected.load(Ordering::Relaxed),
        }
    }

    pub async fn dispose(self) {
        self.stop().await;
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}
