use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared request. Layers in [`super::layers`] wrap an inner
/// client and decorate the request before handing it on.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
