//! Netpack Engine
//!
//! This crate provides the bundling core of Netpack, including:
//! - Plugin hooks (ordered resolve/load handlers with domain tags)
//! - Filesystem module resolution
//! - Module scanning on top of the swc parser
//! - Module graph construction with cycle reporting
//! - Linking a graph into one ES module or IIFE script, CommonJS included
//! - Whitespace and identifier minification

pub mod build;
pub mod compiler;
pub mod error;
pub mod graph;
pub mod linker;
pub mod minify;
pub mod plugin;
pub mod resolver;
pub mod scanner;

pub use build::{
    build, default_resolve_dir, BuildOptions, BuildResult, Entry, OutputFile, StdinOptions,
    STDOUT_PATH,
};
pub use compiler::{Compiler, SyntaxError};
pub use error::{BuildError, Message};
pub use graph::{ModuleGraph, ModuleId, ModuleKey};
pub use linker::{Format, LinkError};
pub use minify::MinifyOptions;
pub use plugin::{
    Domain, HookError, LoadArgs, LoadOutput, LoadResult, OnLoadOptions, OnResolveOptions, Plugin,
    PluginBuild, ResolveArgs, ResolveOutput, ResolveResult,
};
pub use resolver::{FsResolver, ResolveError};
pub use scanner::{scan, ModuleKind, ModuleRecord, ScanError};
