mod basic;
mod client;
mod retry;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use retry::Retry;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::debug;

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    Ok(resp.bytes().await?)
}

/// Fetches `source` over HTTP, or reads it from disk when it is not a URL.
#[tracing::instrument(skip(client))]
pub async fn fetch_source<C: HttpClient>(client: &C, source: &str) -> Result<Bytes> {
    let bytes = if source.starts_with("http") {
        fetch_bytes(client, source)
            .await
            .with_context(|| format!("fetching '{source}'"))?
    } else {
        Bytes::from(
            tokio::fs::read(source)
                .await
                .with_context(|| format!("reading '{source}'"))?,
        )
    };
    debug!(bytes = bytes.len(), "Source loaded");
    Ok(bytes)
}
