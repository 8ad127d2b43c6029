//! Approximate client location from its public IP.

use crate::fetch::{HttpClient, fetch_json};
use crate::guard::OrLog;
use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use std::net::{IpAddr, UdpSocket};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClientLocation {
    pub lat: f64,
    pub lon: f64,
}

/// Looks up the caller's location on ipinfo.io.
///
/// `/json` is asked first. On any failure there (transport error, error
/// status, error payload or no `loc`) the widget endpoint is asked for the
/// local address of this machine.
pub struct IpLocator<C> {
    http: C,
    base_url: String,
    fallback_ip: Option<IpAddr>,
}

impl<C: HttpClient> IpLocator<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            http: client,
            base_url: base_url.trim_end_matches('/').to_string(),
            fallback_ip: None,
        }
    }

    /// Address sent to the widget endpoint instead of the discovered one.
    pub fn with_fallback_ip(mut self, ip: IpAddr) -> Self {
        self.fallback_ip = Some(ip);
        self
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_location_of_the_client_request(&self) -> Option<ClientLocation> {
        self.locate()
            .await
            .or_log("get_location_of_the_client_request")
    }

    async fn locate(&self) -> Result<ClientLocation> {
        match self.primary().await {
            Ok(location) => return Ok(location),
            Err(e) => warn!(error = %e, "Failed to get location of the client, trying widget endpoint"),
        }

        let ip = match self.fallback_ip {
            Some(ip) => ip,
            None => local_ip()?,
        };
        let url = Url::parse(&format!("{}/widget/demo/{}", self.base_url, ip))?;
        let fallback: Value = fetch_json(&self.http, url).await?;

        let loc = extract_loc(&fallback).context("Failed to get location of the client")?;
        parse_loc(loc)
    }

    async fn primary(&self) -> Result<ClientLocation> {
        let url = Url::parse(&format!("{}/json", self.base_url))?;
        let payload: Value = fetch_json(&self.http, url).await?;
        let loc = extract_loc(&payload).context("no loc in response")?;
        parse_loc(loc)
    }
}

/// Address of the interface that routes to the internet. Connecting a UDP
/// socket only selects the route; nothing is sent.
fn local_ip() -> Result<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).context("Failed to bind local socket")?;
    socket
        .connect(("8.8.8.8", 80))
        .context("Failed to find a local address")?;
    Ok(socket.local_addr()?.ip())
}

/// `loc` sits at the top level of `/json` and under `data` for the widget.
fn extract_loc(payload: &Value) -> Option<&str> {
    let failed = payload
        .get("error")
        .is_some_and(|e| !e.is_null() && *e != Value::Bool(false));
    if failed {
        return None;
    }

    payload["loc"]
        .as_str()
        .or_else(|| payload["data"]["loc"].as_str())
        .filter(|loc| !loc.is_empty())
}

/// Parses `"lat,lon"`.
fn parse_loc(loc: &str) -> Result<ClientLocation> {
    let (lat, lon) = loc
        .split_once(',')
        .ok_or_else(|| anyhow!("malformed loc '{loc}'"))?;
    Ok(ClientLocation {
        lat: lat.trim().parse().context("invalid latitude in loc")?,
        lon: lon.trim().parse().context("invalid longitude in loc")?,
    })
}
