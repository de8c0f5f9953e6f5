//! Plugin hooks
//!
//! Plugins extend the engine by registering resolve and load hooks during
//! setup. Each hook is a (filter, handler) pair; hooks are kept in
//! registration order and the first one that claims a request wins.

use std::fmt;
use std::path::Path;

use regex::Regex;

/// Error type returned by hook handlers.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Label telling which world a module lives in.
///
/// The domain of a module decides how the specifiers found inside it are
/// resolved, so it is inherited by every import of that module unless a
/// hook explicitly returns another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Domain {
    /// Local files, resolved by the built-in filesystem resolver
    #[default]
    Filesystem,
    /// Remote modules addressed by absolute URLs
    Network,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Filesystem => "filesystem",
            Domain::Network => "network",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments passed to a resolve hook
#[derive(Debug, Clone)]
pub struct ResolveArgs<'a> {
    /// The specifier as written in the importing module
    pub path: &'a str,
    /// Fully-qualified path of the importing module (`None` for the entry)
    pub importer: Option<&'a str>,
    /// Domain of the importing module
    pub importer_domain: Domain,
    /// Directory relative imports of filesystem modules are resolved against
    pub resolve_dir: &'a Path,
}

/// A resolved import: fully-qualified path plus its domain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveResult {
    pub path: String,
    pub domain: Domain,
}

impl ResolveResult {
    pub fn new(path: impl Into<String>, domain: Domain) -> Self {
        Self {
            path: path.into(),
            domain,
        }
    }
}

/// Arguments passed to a load hook
#[derive(Debug, Clone)]
pub struct LoadArgs<'a> {
    pub path: &'a str,
    pub domain: Domain,
}

/// Source text produced by a load hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub contents: String,
}

/// `Ok(None)` declines the request and lets the next hook try.
pub type ResolveOutput = Result<Option<ResolveResult>, HookError>;
pub type LoadOutput = Result<Option<LoadResult>, HookError>;

type ResolveCallback = Box<dyn Fn(&ResolveArgs<'_>) -> ResolveOutput + Send + Sync>;
type LoadCallback = Box<dyn Fn(&LoadArgs<'_>) -> LoadOutput + Send + Sync>;

/// Match conditions of a resolve hook
#[derive(Debug, Clone)]
pub struct OnResolveOptions {
    /// Tested against the specifier
    pub filter: Regex,
    /// Only run for importers of this domain (any domain when `None`)
    pub domain: Option<Domain>,
}

/// Match conditions of a load hook
#[derive(Debug, Clone)]
pub struct OnLoadOptions {
    /// Tested against the resolved path
    pub filter: Regex,
    /// Only run for modules of this domain (any domain when `None`)
    pub domain: Option<Domain>,
}

fn domain_matches(wanted: Option<Domain>, actual: Domain) -> bool {
    wanted.map_or(true, |d| d == actual)
}

struct ResolveHook {
    plugin: String,
    options: OnResolveOptions,
    callback: ResolveCallback,
}

struct LoadHook {
    plugin: String,
    options: OnLoadOptions,
    callback: LoadCallback,
}

/// Failure raised by a hook, tagged with the plugin that registered it
#[derive(Debug)]
pub struct HookFailure {
    pub plugin: String,
    pub error: HookError,
}

/// Ordered hook lists built from the plugins of one build
#[derive(Default)]
pub struct HookRegistry {
    resolve: Vec<ResolveHook>,
    load: Vec<LoadHook>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("resolve", &self.resolve.len())
            .field("load", &self.load.len())
            .finish()
    }
}

impl HookRegistry {
    /// Run every plugin's setup, in order
    pub fn from_plugins(plugins: Vec<Plugin>) -> Self {
        let mut registry = Self::default();
        for plugin in plugins {
            let mut build = PluginBuild {
                name: plugin.name,
                registry: &mut registry,
            };
            (plugin.setup)(&mut build);
        }
        registry
    }

    pub fn resolve_hook_count(&self) -> usize {
        self.resolve.len()
    }

    pub fn load_hook_count(&self) -> usize {
        self.load.len()
    }

    /// Offer a specifier to the resolve hooks. `Ok(None)` when all declined.
    pub fn resolve(&self, args: &ResolveArgs<'_>) -> Result<Option<ResolveResult>, HookFailure> {
        for hook in &self.resolve {
            if !domain_matches(hook.options.domain, args.importer_domain)
                || !hook.options.filter.is_match(args.path)
            {
                continue;
            }
            match (hook.callback)(args) {
                Ok(Some(result)) => {
                    tracing::debug!(
                        plugin = %hook.plugin,
                        specifier = args.path,
                        resolved = %result.path,
                        domain = %result.domain,
                        "resolved"
                    );
                    return Ok(Some(result));
                }
                Ok(None) => continue,
                Err(error) => {
                    return Err(HookFailure {
                        plugin: hook.plugin.clone(),
                        error,
                    })
                }
            }
        }
        Ok(None)
    }

    /// Offer a resolved module to the load hooks. `Ok(None)` when all declined.
    pub fn load(&self, args: &LoadArgs<'_>) -> Result<Option<LoadResult>, HookFailure> {
        for hook in &self.load {
            if !domain_matches(hook.options.domain, args.domain)
                || !hook.options.filter.is_match(args.path)
            {
                continue;
            }
            match (hook.callback)(args) {
                Ok(Some(result)) => {
                    tracing::debug!(plugin = %hook.plugin, path = args.path, "loaded");
                    return Ok(Some(result));
                }
                Ok(None) => continue,
                Err(error) => {
                    return Err(HookFailure {
                        plugin: hook.plugin.clone(),
                        error,
                    })
                }
            }
        }
        Ok(None)
    }
}

/// Handle given to a plugin's setup function
pub struct PluginBuild<'r> {
    name: String,
    registry: &'r mut HookRegistry,
}

impl PluginBuild<'_> {
    pub fn on_resolve<F>(&mut self, options: OnResolveOptions, callback: F)
    where
        F: Fn(&ResolveArgs<'_>) -> ResolveOutput + Send + Sync + 'static,
    {
        self.registry.resolve.push(ResolveHook {
            plugin: self.name.clone(),
            options,
            callback: Box::new(callback),
        });
    }

    pub fn on_load<F>(&mut self, options: OnLoadOptions, callback: F)
    where
        F: Fn(&LoadArgs<'_>) -> LoadOutput + Send + Sync + 'static,
    {
        self.registry.load.push(LoadHook {
            plugin: self.name.clone(),
            options,
            callback: Box::new(callback),
        });
    }
}

type SetupFn = Box<dyn FnOnce(&mut PluginBuild<'_>) + Send>;

/// A named bundle of hooks, installed when a build starts
pub struct Plugin {
    pub name: String,
    setup: SetupFn,
}

impl Plugin {
    pub fn new<F>(name: impl Into<String>, setup: F) -> Self
    where
        F: FnOnce(&mut PluginBuild<'_>) + Send + 'static,
    {
        Self {
            name: name.into(),
            setup: Box::new(setup),
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name).finish()
    }
}
