use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
  pub status: u16,
  pub body: String,
}

/// Performs GET requests on behalf of sample tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Fetcher backed by a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
      url: url.to_string(),
      message: e.to_string(),
    })?;
    let response = self.client.get(parsed).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(FetchResponse { status, body })
  }
}
