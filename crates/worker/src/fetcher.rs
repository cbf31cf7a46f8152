//! Package content fetcher.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use sigwarden_core::config::FetcherConfig;
use std::pin::Pin;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

/// Streaming package body.
pub type ByteStream = Pin<Box<dyn Stream<Item = FetchResult<Bytes>> + Send>>;

/// Package fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported content URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("package not found: {0}")]
    NotFound(String),

    #[error("package exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Source of package content by URI.
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Open the package at `uri` as a byte stream.
    async fn fetch(&self, uri: &Url) -> FetchResult<ByteStream>;
}

/// Fetches `http`, `https` and `file` URIs.
pub struct HttpPackageFetcher {
    client: reqwest::Client,
    max_package_size: u64,
}

impl HttpPackageFetcher {
    pub fn new(config: &FetcherConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("sigwarden/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_package_size: config.max_package_size,
        })
    }

    async fn fetch_http(&self, uri: &Url) -> FetchResult<ByteStream> {
        let response = self.client.get(uri.clone()).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(uri.to_string()));
        }
        let response = response.error_for_status()?;

        if let Some(length) = response.content_length()
            && length > self.max_package_size
        {
            return Err(FetchError::TooLarge {
                limit: self.max_package_size,
            });
        }

        let stream = response.bytes_stream().map_err(FetchError::from);
        Ok(limit_size(Box::pin(stream), self.max_package_size))
    }

    async fn fetch_file(&self, uri: &Url) -> FetchResult<ByteStream> {
        let path = uri
            .to_file_path()
            .map_err(|()| FetchError::NotFound(uri.to_string()))?;

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(path.display().to_string())
            } else {
                FetchError::Io(e)
            }
        })?;

        if file.metadata().await?.len() > self.max_package_size {
            return Err(FetchError::TooLarge {
                limit: self.max_package_size,
            });
        }

        let stream = ReaderStream::new(file).map_err(FetchError::from);
        Ok(limit_size(Box::pin(stream), self.max_package_size))
    }
}

#[async_trait]
impl PackageFetcher for HttpPackageFetcher {
    async fn fetch(&self, uri: &Url) -> FetchResult<ByteStream> {
        match uri.scheme() {
            "http" | "https" => self.fetch_http(uri).await,
            "file" => self.fetch_file(uri).await,
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Fail the stream once more than `limit` bytes have been produced.
fn limit_size(stream: ByteStream, limit: u64) -> ByteStream {
    let mut seen = 0u64;
    Box::pin(stream.map(move |chunk| {
        let chunk = chunk?;
        seen = seen.saturating_add(chunk.len() as u64);
        if seen > limit {
            return Err(FetchError::TooLarge { limit });
        }
        Ok(chunk)
    }))
}
