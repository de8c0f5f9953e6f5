//! Network specifier resolution
//!
//! Absolute `http(s)://` specifiers are claimed as-is. Inside a network
//! module every specifier is a URL reference, resolved against the
//! importer's URL with RFC 3986 rules.

use netpack_engine::{Domain, ResolveResult};
use url::Url;

use crate::error::HttpPluginError;

/// Hook filter for absolute network specifiers
pub const URL_PATTERN: &str = r"^https?://";

/// Whether a specifier is an absolute network specifier. The scheme check is
/// case-sensitive.
pub fn is_network_specifier(specifier: &str) -> bool {
    specifier.starts_with("http://") || specifier.starts_with("https://")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkResolver;

impl NetworkResolver {
    pub fn new() -> Self {
        Self
    }

    /// Claim an absolute network specifier unchanged; `None` declines it
    pub fn classify_absolute(&self, specifier: &str) -> Option<ResolveResult> {
        is_network_specifier(specifier).then(|| ResolveResult::new(specifier, Domain::Network))
    }

    /// Resolve a specifier found inside the network module `importer`
    pub fn classify_relative(
        &self,
        specifier: &str,
        importer: &str,
    ) -> Result<ResolveResult, HttpPluginError> {
        let malformed = |source| HttpPluginError::MalformedUrl {
            specifier: specifier.to_string(),
            importer: importer.to_string(),
            source,
        };
        let base = Url::parse(importer).map_err(malformed)?;
        let resolved = base.join(specifier).map_err(malformed)?;
        Ok(ResolveResult::new(resolved.as_str(), Domain::Network))
    }
}
