use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// An [`HttpClient`] wrapper that retries failed requests.
///
/// Makes at most `attempts` tries, sleeping `backoff * n` after the n-th
/// failure. Requests whose body cannot be cloned are sent once.
pub struct Retry<C> {
    pub inner: C,
    pub attempts: u32,
    pub backoff: Duration,
}

impl<C> Retry<C> {
    pub fn new(inner: C, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for Retry<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let mut attempt = 1;
        loop {
            let Some(next) = req.try_clone() else {
                return self.inner.execute(req).await;
            };
            match self.inner.execute(next).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.attempts => {
                    warn!(url = %req.url(), attempt, error = %e, "Fetch failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
