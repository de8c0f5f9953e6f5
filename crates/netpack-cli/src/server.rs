//! HTTP bundling service
//!
//! Every request is one build: the entry text comes from a built-in fixture,
//! the request body or the `source` query parameter, and the bundled module
//! is the response.

use axum::{
    body::Bytes,
    extract::Query,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use netpack_engine::{build, BuildOptions, Entry, Format, MinifyOptions, StdinOptions};
use netpack_http::{http_plugin, HttpPluginError, UrlFetcher};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

/// Content type of bundled output
pub const JAVASCRIPT: &str = "text/javascript;charset=UTF-8";

/// Entry served at `/health`: exercises three remote modules
pub const HEALTH_FIXTURE: &str = r#"
export const hello = 'world';
export * from 'https://raw.githubusercontent.com/RoyalIcing/modules/0003a973c63dfc78bbc595d5d3b7891b89a1b829/constants.js'
export * from 'https://raw.githubusercontent.com/RoyalIcing/modules/0003a973c63dfc78bbc595d5d3b7891b89a1b829/interpolation.js'
export * from 'https://raw.githubusercontent.com/RoyalIcing/modules/0003a973c63dfc78bbc595d5d3b7891b89a1b829/generators.js'
"#;

/// Entry served at `/react@17.0.2`
pub const REACT_FIXTURE: &str = r#"
export * from "https://cdn.jsdelivr.net/npm/react@17.0.2/umd/react.production.min.js";
"#;

const RESOLVE_DIR: &str = "./src";
const SOURCEFILE: &str = "imaginary-file.js";

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// First error of a failed build, reported verbatim
    #[error("{0}")]
    Build(String),

    #[error("{0}")]
    Plugin(#[from] HttpPluginError),

    #[error("build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BundleQuery {
    pub source: Option<String>,
    /// Present (with any value) to minify
    pub minify: Option<String>,
}

pub async fn start_server(config: ServeConfig) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(addr).await?;

    info!("listening on {}", listener.local_addr()?);
    let app = Router::new().fallback(handler);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Pick the entry text for a request
pub fn select_source(method: &Method, path: &str, query: &BundleQuery, body: &[u8]) -> String {
    if path == "/health" {
        HEALTH_FIXTURE.to_string()
    } else if method == Method::POST {
        String::from_utf8_lossy(body).into_owned()
    } else if path == "/react@17.0.2" {
        REACT_FIXTURE.to_string()
    } else {
        query.source.clone().unwrap_or_default()
    }
}

async fn handler(
    method: Method,
    uri: Uri,
    query: Option<Query<BundleQuery>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let source = select_source(&method, uri.path(), &query, &body);
    let minify = query.minify.is_some();
    info!(%method, path = uri.path(), minify, "bundling");

    let output = tokio::task::spawn_blocking(move || bundle(source, minify)).await??;

    Ok(([(header::CONTENT_TYPE, JAVASCRIPT)], output).into_response())
}

/// Run one build; blocks on network fetches
fn bundle(source: String, minify: bool) -> Result<String, AppError> {
    let plugin = http_plugin(UrlFetcher::new()?)?;
    let stdin = StdinOptions::new(source)
        .with_resolve_dir(RESOLVE_DIR)
        .with_sourcefile(SOURCEFILE);

    let mut options = BuildOptions::new(Entry::Stdin(stdin));
    options.format = Format::Esm;
    options.bundle = true;
    options.plugins = vec![plugin];
    if minify {
        options.minify = MinifyOptions::all();
    }

    let mut result = build(options);
    if !result.errors.is_empty() {
        return Err(AppError::Build(result.errors.swap_remove(0).text));
    }
    Ok(result
        .output_files
        .into_iter()
        .next()
        .map(|file| file.contents)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use netpack_engine::{scan, Compiler};

    fn query(source: Option<&str>) -> BundleQuery {
        BundleQuery {
            source: source.map(str::to_string),
            minify: None,
        }
    }

    #[test]
    fn test_health_fixture_wins_over_body() {
        let source = select_source(&Method::POST, "/health", &query(None), b"ignored");
        assert_eq!(source, HEALTH_FIXTURE);
    }

    #[test]
    fn test_post_body_is_entry() {
        let source = select_source(&Method::POST, "/react@17.0.2", &query(Some("q")), b"export const a = 1;");
        assert_eq!(source, "export const a = 1;");
    }

    #[test]
    fn test_react_fixture() {
        let source = select_source(&Method::GET, "/react@17.0.2", &query(None), b"");
        assert_eq!(source, REACT_FIXTURE);
    }

    #[test]
    fn test_source_query_parameter() {
        assert_eq!(select_source(&Method::GET, "/", &query(Some("let x;")), b""), "let x;");
        assert_eq!(select_source(&Method::GET, "/anything", &query(None), b""), "");
    }

    #[test]
    fn test_fixtures_only_import_urls() {
        let compiler = Compiler::new();
        let health = scan(&compiler, "health.js", HEALTH_FIXTURE).unwrap().record;
        assert_eq!(health.star_exports.len(), 3);
        assert!(health.specifiers.iter().all(|s| netpack_http::is_network_specifier(s)));

        let react = scan(&compiler, "react.js", REACT_FIXTURE).unwrap().record;
        assert_eq!(react.specifiers.len(), 1);
    }

    #[tokio::test]
    async fn test_handler_bundles_local_source() {
        let uri: Uri = "/?source=export%20const%20a%20%3D%201%3B".parse().unwrap();
        let q = BundleQuery {
            source: Some("export const a = 1;".to_string()),
            minify: None,
        };
        let response = handler(Method::GET, uri, Some(Query(q)), Bytes::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JAVASCRIPT);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("const a = 1;"), "{text}");
        assert!(text.contains("export {"), "{text}");
    }

    #[tokio::test]
    async fn test_handler_minifies() {
        let q = BundleQuery {
            source: None,
            minify: Some(String::new()),
        };
        let body = Bytes::from_static(b"export const a  =  1; // note\n");
        let response = handler(Method::POST, "/?minify".parse().unwrap(), Some(Query(q)), body)
            .await
            .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("const a=1"), "{text}");
        assert!(!text.contains("note"), "{text}");
    }

    #[tokio::test]
    async fn test_handler_reports_first_error() {
        let body = Bytes::from_static(b"import './missing.js';");
        let err = handler(Method::POST, "/".parse().unwrap(), None, body)
            .await
            .unwrap_err();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&text).starts_with("Could not resolve \"./missing.js\""));
    }
}
