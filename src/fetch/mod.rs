mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;

/// GETs `url` and deserializes the JSON body.
///
/// # Errors
///
/// Fails on transport errors, non-success status codes and bodies that do not
/// parse as `T`.
pub async fn fetch_json<C: HttpClient, T: DeserializeOwned>(client: &C, url: &str) -> Result<T> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| anyhow!("Failed to send request: {}", e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!("API returned status {}: {}", status, body));
    }

    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| anyhow!("Failed to parse response: {}", e))
}
