use std::time::Duration;

use gpumon_common::ClusterSnapshot;

use crate::error::FetchError;

/// Where snapshots come from. The poll loop only ever calls `fetch`.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self) -> Result<ClusterSnapshot, FetchError>;

    /// Human-readable name for logging.
    fn describe(&self) -> String;
}

/// `GET <url>` against the cluster status endpoint, no auth, no query.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpStatusSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_err(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err)
        }
    }
}

#[async_trait::async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<ClusterSnapshot, FetchError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!("HTTP {status} from {}", self.url)));
        }

        let body = resp.bytes().await.map_err(|e| self.map_err(e))?;
        Ok(ClusterSnapshot::from_slice(&body)?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
