//! Filesystem module resolution
//!
//! Fallback used for filesystem-domain importers when no hook claimed the
//! specifier.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during filesystem resolution
#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    /// Local file not found
    #[error("Could not resolve \"{path}\" (tried: {tried:?})")]
    ModuleNotFound { path: String, tried: Vec<PathBuf> },

    /// Bare specifiers would need a package lookup
    #[error("Could not resolve \"{0}\" (package imports are not supported)")]
    PackageNotSupported(String),

    /// IO error during resolution
    #[error("IO error: {0}")]
    IoError(String),
}

/// Extensions tried, in order, when the specifier has none that exists
static EXTENSIONS: &[&str] = &["js", "mjs"];

/// Resolver for local import specifiers
#[derive(Debug, Clone, Default)]
pub struct FsResolver;

impl FsResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a specifier to an absolute file path
    ///
    /// Relative specifiers are joined to `base_dir`, the directory of the
    /// importing file (or the entry's resolve directory).
    ///
    /// # Resolution Order
    /// For `import "./utils"`:
    /// 1. `./utils` as-is
    /// 2. `./utils.js`, `./utils.mjs`
    /// 3. `./utils/index.js`
    pub fn resolve(&self, specifier: &str, base_dir: &Path) -> Result<PathBuf, ResolveError> {
        let is_relative = specifier.starts_with("./") || specifier.starts_with("../");
        let is_absolute = Path::new(specifier).is_absolute();
        if !is_relative && !is_absolute {
            return Err(ResolveError::PackageNotSupported(specifier.to_string()));
        }

        let base_path = if is_absolute {
            PathBuf::from(specifier)
        } else {
            base_dir.join(specifier)
        };

        let mut tried = Vec::new();

        tried.push(base_path.clone());
        if base_path.is_file() {
            return self.canonicalize(&base_path);
        }

        for ext in EXTENSIONS {
            let mut with_ext = base_path.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            tried.push(with_ext.clone());
            if with_ext.is_file() {
                return self.canonicalize(&with_ext);
            }
        }

        let index_path = base_path.join("index.js");
        tried.push(index_path.clone());
        if index_path.is_file() {
            return self.canonicalize(&index_path);
        }

        Err(ResolveError::ModuleNotFound {
            path: specifier.to_string(),
            tried,
        })
    }

    /// Canonicalize a path to absolute form
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, ResolveError> {
        path.canonicalize().map_err(|e| {
            ResolveError::IoError(format!("Failed to canonicalize {}: {}", path.display(), e))
        })
    }
}
