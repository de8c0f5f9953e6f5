//! Errors raised by the http plugin

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpPluginError {
    /// A specifier or its importer is not a valid URL
    #[error("malformed URL: cannot resolve \"{specifier}\" against \"{importer}\": {source}")]
    MalformedUrl {
        specifier: String,
        importer: String,
        #[source]
        source: url::ParseError,
    },

    /// The request could not be sent or answered
    #[error("network error fetching \"{url}\": {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read to the end
    #[error("network error reading \"{url}\": {source}")]
    BodyRead {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be created
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A hook filter failed to compile
    #[error("invalid hook filter: {0}")]
    Filter(#[from] regex::Error),
}

impl HttpPluginError {
    /// Whether this is a transport failure
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            HttpPluginError::Network { .. } | HttpPluginError::BodyRead { .. }
        )
    }
}
