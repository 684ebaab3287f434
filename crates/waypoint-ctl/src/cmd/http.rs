//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::Deserialize;

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to waypointd at {} — is it running?", url))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{} returned {}: {}", url, status, body);
    }

    response.json::<T>().await.context("failed to parse response")
}
