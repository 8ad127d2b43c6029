use crate::fetch::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};

/// An [`HttpClient`] wrapper that sets a fixed HTTP header on every request.
///
/// Nominatim rejects anonymous traffic, so the geocoder is built on top of
/// [`StaticHeader::user_agent`].
pub struct StaticHeader<C> {
    pub inner: C,
    name: HeaderName,
    value: HeaderValue,
}

impl<C> StaticHeader<C> {
    pub fn new(inner: C, name: &str, value: &str) -> Result<Self> {
        Ok(Self {
            inner,
            name: HeaderName::from_bytes(name.as_bytes())?,
            value: HeaderValue::from_str(value)?,
        })
    }

    pub fn user_agent(inner: C, agent: &str) -> Result<Self> {
        Ok(Self {
            inner,
            name: USER_AGENT,
            value: HeaderValue::from_str(agent)?,
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for StaticHeader<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
