//! Network module loading
//!
//! A plain blocking GET. The body is returned whatever the status code, so
//! an error page reaches the scanner as module source.

use std::io::Read;

use reqwest::blocking::Client;

use crate::error::HttpPluginError;

/// Blocking HTTP fetcher for network modules
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    client: Client,
}

impl UrlFetcher {
    /// Create a fetcher with the client's default policy (no extra headers)
    pub fn new() -> Result<Self, HttpPluginError> {
        let client = Client::builder().build().map_err(HttpPluginError::Client)?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch `url` and decode its body as text
    ///
    /// The response is read to the end and dropped before returning, on the
    /// error path as well.
    pub fn fetch(&self, url: &str) -> Result<String, HttpPluginError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|source| HttpPluginError::Network {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();

        let mut body = Vec::new();
        response
            .read_to_end(&mut body)
            .map_err(|source| HttpPluginError::BodyRead {
                url: url.to_string(),
                source,
            })?;
        drop(response);

        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "non-success status, using body as source");
        }
        tracing::info!(url, status = status.as_u16(), bytes = body.len(), "fetched");

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
