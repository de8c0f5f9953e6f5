//! Build errors and the messages reported for them

use std::fmt;
use std::io;

use thiserror::Error;

use crate::linker::LinkError;
use crate::plugin::{Domain, HookError};
use crate::resolver::ResolveError;
use crate::scanner::ScanError;

/// A fatal build error. The first one stops the build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Could not resolve \"{specifier}\" (plugin \"{plugin}\"): {error}")]
    ResolveHook {
        specifier: String,
        plugin: String,
        error: HookError,
    },

    #[error("Could not load \"{path}\" (plugin \"{plugin}\"): {error}")]
    LoadHook {
        path: String,
        plugin: String,
        error: HookError,
    },

    #[error("{source}")]
    Resolve {
        importer: String,
        #[source]
        source: ResolveError,
    },

    #[error("Could not resolve \"{specifier}\": no plugin handles imports from the {domain} module \"{importer}\"")]
    NoResolver {
        specifier: String,
        importer: String,
        domain: Domain,
    },

    #[error("Could not load \"{path}\": no plugin loads {domain} modules")]
    NoLoader { path: String, domain: Domain },

    #[error("Could not read \"{path}\": {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Scan {
        path: String,
        #[source]
        source: ScanError,
    },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Could not print \"{path}\": {source}")]
    Print {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    /// Plugin that raised the error, if any
    pub fn plugin(&self) -> Option<&str> {
        match self {
            BuildError::ResolveHook { plugin, .. } | BuildError::LoadHook { plugin, .. } => {
                Some(plugin)
            }
            _ => None,
        }
    }

    /// Module the error was found in, if any
    pub fn file(&self) -> Option<&str> {
        match self {
            BuildError::Resolve { importer, .. } | BuildError::NoResolver { importer, .. } => {
                Some(importer)
            }
            BuildError::Scan { path, .. }
            | BuildError::Read { path, .. }
            | BuildError::Print { path, .. } => Some(path),
            BuildError::Link(LinkError::MissingExport { importer, .. }) => Some(importer),
            _ => None,
        }
    }
}

/// A reported diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub plugin: Option<String>,
    pub file: Option<String>,
}

impl From<&BuildError> for Message {
    fn from(error: &BuildError) -> Self {
        Self {
            text: error.to_string(),
            plugin: error.plugin().map(str::to_string),
            file: error.file().map(str::to_string),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
