//! Netpack HTTP plugin
//!
//! Lets a build import modules straight from `http://` and `https://` URLs:
//! - absolute URL specifiers are tagged with the network domain
//! - specifiers inside a network module resolve against its URL
//! - network modules are loaded with a blocking GET
//!
//! ```ignore
//! let mut options = BuildOptions::new(Entry::Stdin(StdinOptions::new(source)));
//! options.plugins.push(http_plugin(UrlFetcher::new()?)?);
//! let result = build(options);
//! ```

pub mod error;
pub mod fetch;
pub mod resolve;

use std::sync::Arc;

use netpack_engine::{Domain, LoadResult, OnLoadOptions, OnResolveOptions, Plugin};
use regex::Regex;

pub use error::HttpPluginError;
pub use fetch::UrlFetcher;
pub use resolve::{is_network_specifier, NetworkResolver, URL_PATTERN};

/// Name the plugin's errors are reported under
pub const PLUGIN_NAME: &str = "http";

/// Build the plugin around `fetcher`
pub fn http_plugin(fetcher: UrlFetcher) -> Result<Plugin, HttpPluginError> {
    let absolute = Regex::new(URL_PATTERN)?;
    let anything = Regex::new(".*")?;
    let fetcher = Arc::new(fetcher);
    let resolver = NetworkResolver::new();

    Ok(Plugin::new(PLUGIN_NAME, move |build| {
        build.on_resolve(
            OnResolveOptions {
                filter: absolute,
                domain: None,
            },
            move |args| Ok(resolver.classify_absolute(args.path)),
        );

        build.on_resolve(
            OnResolveOptions {
                filter: anything.clone(),
                domain: Some(Domain::Network),
            },
            move |args| {
                let importer = args.importer.unwrap_or_default();
                Ok(Some(resolver.classify_relative(args.path, importer)?))
            },
        );

        build.on_load(
            OnLoadOptions {
                filter: anything,
                domain: Some(Domain::Network),
            },
            move |args| {
                let contents = fetcher.fetch(args.path)?;
                Ok(Some(LoadResult { contents }))
            },
        );
    }))
}
