//! Blob fetcher: turns a URL into a byte stream.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use thiserror::Error;

/// Failure to retrieve a blob.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, status or body error from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other transport failure.
    #[error("{0}")]
    Transport(String),
}

/// Body of a fetched blob.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Source of installer bytes.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    /// Start fetching `url`. Connection failures and non-success status codes
    /// are reported here; failures mid-transfer surface through the stream.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] that prevents the transfer from starting.
    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError>;
}

/// HTTP(S) fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Fetcher with its own client carrying the wgm user agent.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(crate::USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Fetcher over an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::from))
            .boxed())
    }
}
