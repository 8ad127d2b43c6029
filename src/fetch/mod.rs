//! HTTP plumbing shared by every API wrapper.
//!
//! All clients talk to the network through the [`HttpClient`] trait so the
//! transit, geocoding and IP lookups can be layered ([`layers`]) and stubbed
//! in tests.

mod basic;
mod client;
pub mod layers;
#[cfg(test)]
pub(crate) mod stub;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, anyhow};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

async fn get<C: HttpClient + ?Sized>(client: &C, url: Url) -> Result<reqwest::Response> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.clone());
    let resp = client.execute(req).await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!("GET {} returned status {}: {}", url.path(), status, body));
    }

    Ok(resp)
}

/// Issues a GET and decodes the JSON body into `T`.
///
/// Non-2xx responses are turned into errors carrying the response body.
pub async fn fetch_json<T, C>(client: &C, url: Url) -> Result<T>
where
    T: DeserializeOwned,
    C: HttpClient + ?Sized,
{
    debug!(path = url.path(), "GET");
    let resp = get(client, url).await?;
    Ok(resp.json::<T>().await?)
}
