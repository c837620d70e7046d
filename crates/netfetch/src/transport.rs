//! Network transport

use bytes::Bytes;
use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

use crate::config::FetcherConfig;
use crate::error::{Error, Result};

/// Blocking network fetch used by download workers
pub trait Transport: Send + Sync + 'static {
    /// Fetch the full body for `uri`
    fn fetch(&self, uri: &Url) -> Result<Bytes>;
}

/// HTTP(S) transport backed by a blocking reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with the configured timeouts
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, uri: &Url) -> Result<Bytes> {
        debug!(%uri, "HTTP GET");
        let response = self.client.get(uri.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }
        Ok(response.bytes()?)
    }
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn fetch(&self, uri: &Url) -> Result<Bytes> {
        (**self).fetch(uri)
    }
}
