//! Build entry point
//!
//! Walks the import graph from the entry module, asking plugin hooks first
//! and the filesystem resolver second, then links and minifies the result.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::compiler::Compiler;
use crate::error::{BuildError, Message};
use crate::graph::{ModuleGraph, ModuleId, ModuleKey};
use crate::linker::{link, Format, LinkModule};
use crate::minify::{emit, MinifyOptions};
use crate::plugin::{Domain, HookRegistry, LoadArgs, Plugin, ResolveArgs, ResolveResult};
use crate::resolver::FsResolver;
use crate::scanner::{scan, ScannedModule};

/// Path reported for output that has no file of its own
pub const STDOUT_PATH: &str = "<stdout>";

/// Entry module given as text
#[derive(Debug, Clone)]
pub struct StdinOptions {
    pub contents: String,
    /// Directory relative imports of the entry are resolved against
    pub resolve_dir: PathBuf,
    /// Name the entry is reported under
    pub sourcefile: String,
}

impl StdinOptions {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            resolve_dir: default_resolve_dir(),
            sourcefile: "<stdin>".to_string(),
        }
    }

    pub fn with_resolve_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resolve_dir = dir.into();
        self
    }

    pub fn with_sourcefile(mut self, name: impl Into<String>) -> Self {
        self.sourcefile = name.into();
        self
    }
}

/// Current working directory, or `.` when it cannot be read
pub fn default_resolve_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, Clone)]
pub enum Entry {
    Stdin(StdinOptions),
    File(PathBuf),
}

/// Options of one build
#[derive(Debug)]
pub struct BuildOptions {
    pub entry: Entry,
    pub format: Format,
    /// Follow imports; when false the entry is only parsed and printed
    pub bundle: bool,
    pub minify: MinifyOptions,
    /// Installed in order; earlier plugins' hooks run first
    pub plugins: Vec<Plugin>,
}

impl BuildOptions {
    pub fn new(entry: Entry) -> Self {
        Self {
            entry,
            format: Format::Esm,
            bundle: true,
            minify: MinifyOptions::default(),
            plugins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Outcome of a build. `output_files` is empty when `errors` is not.
#[derive(Debug, Default)]
pub struct BuildResult {
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
    pub output_files: Vec<OutputFile>,
}

impl BuildResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Contents of the first output file
    pub fn output(&self) -> Option<&str> {
        self.output_files.first().map(|f| f.contents.as_str())
    }
}

/// Run a build. Never panics on bad input; failures land in `errors`.
pub fn build(options: BuildOptions) -> BuildResult {
    let BuildOptions {
        entry,
        format,
        bundle,
        minify,
        plugins,
    } = options;
    let registry = HookRegistry::from_plugins(plugins);
    tracing::debug!(
        resolve_hooks = registry.resolve_hook_count(),
        load_hooks = registry.load_hook_count(),
        "plugins installed"
    );
    let mut builder = Builder::new(&registry);

    let result = if bundle {
        builder.bundle(entry, format, minify)
    } else {
        builder.transform(entry, minify)
    };

    match result {
        Ok(contents) => {
            tracing::info!(
                modules = builder.graph.len(),
                warnings = builder.warnings.len(),
                bytes = contents.len(),
                "build finished"
            );
            BuildResult {
                warnings: builder.warnings,
                output_files: vec![OutputFile {
                    path: PathBuf::from(STDOUT_PATH),
                    contents,
                }],
                ..Default::default()
            }
        }
        Err(error) => {
            tracing::warn!(%error, "build failed");
            BuildResult {
                errors: vec![Message::from(&error)],
                warnings: builder.warnings,
                ..Default::default()
            }
        }
    }
}

/// A module that has been loaded and scanned
struct Module {
    key: ModuleKey,
    /// Base directory for filesystem resolution of this module's imports
    resolve_dir: PathBuf,
    scanned: ScannedModule,
    requests: FxHashMap<String, ModuleId>,
}

struct Builder<'r> {
    registry: &'r HookRegistry,
    compiler: Compiler,
    fs: FsResolver,
    graph: ModuleGraph,
    /// Indexed by [`ModuleId`]
    modules: Vec<Module>,
    warnings: Vec<Message>,
}

impl<'r> Builder<'r> {
    fn new(registry: &'r HookRegistry) -> Self {
        Self {
            registry,
            compiler: Compiler::new(),
            fs: FsResolver::new(),
            graph: ModuleGraph::new(),
            modules: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Identity, source text and resolve directory of the entry
    fn read_entry(entry: Entry) -> Result<(ModuleKey, String, PathBuf), BuildError> {
        match entry {
            Entry::Stdin(stdin) => Ok((
                ModuleKey::new(Domain::Filesystem, stdin.sourcefile),
                stdin.contents,
                stdin.resolve_dir,
            )),
            Entry::File(path) => {
                let read_error = |source| BuildError::Read {
                    path: path.display().to_string(),
                    source,
                };
                let path = path.canonicalize().map_err(read_error)?;
                let source = std::fs::read_to_string(&path).map_err(read_error)?;
                let display = path.display().to_string();
                let dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(default_resolve_dir);
                Ok((ModuleKey::new(Domain::Filesystem, display), source, dir))
            }
        }
    }

    /// Parse and print the entry without following its imports
    fn transform(&mut self, entry: Entry, minify: MinifyOptions) -> Result<String, BuildError> {
        let (key, source, _) = Self::read_entry(entry)?;
        let mut parsed = self
            .compiler
            .parse(&key.path, &source)
            .map_err(|error| BuildError::Scan {
                path: key.path.clone(),
                source: error.into(),
            })?;
        emit(&self.compiler, &mut parsed.ast, &parsed.comments, minify).map_err(|source| {
            BuildError::Print {
                path: key.path.clone(),
                source,
            }
        })
    }

    fn bundle(&mut self, entry: Entry, format: Format, minify: MinifyOptions) -> Result<String, BuildError> {
        let (key, source, resolve_dir) = Self::read_entry(entry)?;
        let (entry, _) = self.graph.add_module(key.clone());
        self.add_module(key, &source, resolve_dir)?;
        let mut queue = VecDeque::from([entry]);

        while let Some(id) = queue.pop_front() {
            let specifiers = self.modules[id].scanned.record.specifiers.clone();
            for specifier in specifiers {
                let resolved = self.resolve(id, &specifier)?;
                let key = ModuleKey::new(resolved.domain, resolved.path);
                let (dep, added) = self.graph.add_module(key.clone());
                if added {
                    self.load(key)?;
                    queue.push_back(dep);
                }
                self.graph.add_dependency(id, dep);
                self.modules[id].requests.insert(specifier, dep);
            }
        }

        for cycle in self.graph.cycles(entry) {
            tracing::debug!(cycle = %cycle.join(" -> "), "import cycle");
            self.warnings.push(Message {
                text: format!("Import cycle: {}", cycle.join(" -> ")),
                plugin: None,
                file: cycle.first().cloned(),
            });
        }

        let order = self.graph.topological_order(entry);
        tracing::debug!(modules = order.len(), "linking");

        let modules = std::mem::take(&mut self.modules)
            .into_iter()
            .map(|m| LinkModule {
                path: m.key.path,
                scanned: m.scanned,
                requests: m.requests,
            })
            .collect();
        Ok(link(&self.compiler, modules, &order, format, minify)?)
    }

    /// Scan a module's source and append it to `modules`
    fn add_module(&mut self, key: ModuleKey, source: &str, resolve_dir: PathBuf) -> Result<(), BuildError> {
        let scanned = scan(&self.compiler, &key.path, source).map_err(|source| BuildError::Scan {
            path: key.path.clone(),
            source,
        })?;
        self.modules.push(Module {
            key,
            resolve_dir,
            scanned,
            requests: FxHashMap::default(),
        });
        Ok(())
    }

    /// Resolve a specifier found in module `importer`
    fn resolve(&self, importer: ModuleId, specifier: &str) -> Result<ResolveResult, BuildError> {
        let module = &self.modules[importer];
        let args = ResolveArgs {
            path: specifier,
            importer: Some(module.key.path.as_str()),
            importer_domain: module.key.domain,
            resolve_dir: &module.resolve_dir,
        };

        let hooked = self
            .registry
            .resolve(&args)
            .map_err(|failure| BuildError::ResolveHook {
                specifier: specifier.to_string(),
                plugin: failure.plugin,
                error: failure.error,
            })?;
        if let Some(result) = hooked {
            return Ok(result);
        }

        match module.key.domain {
            Domain::Filesystem => {
                let path = self
                    .fs
                    .resolve(specifier, &module.resolve_dir)
                    .map_err(|source| BuildError::Resolve {
                        importer: module.key.path.clone(),
                        source,
                    })?;
                Ok(ResolveResult::new(path.display().to_string(), Domain::Filesystem))
            }
            domain => Err(BuildError::NoResolver {
                specifier: specifier.to_string(),
                importer: module.key.path.clone(),
                domain,
            }),
        }
    }

    /// Load and scan a newly discovered module
    fn load(&mut self, key: ModuleKey) -> Result<(), BuildError> {
        let args = LoadArgs {
            path: &key.path,
            domain: key.domain,
        };
        let hooked = self
            .registry
            .load(&args)
            .map_err(|failure| BuildError::LoadHook {
                path: key.path.clone(),
                plugin: failure.plugin,
                error: failure.error,
            })?;

        let source = match (hooked, key.domain) {
            (Some(result), _) => result.contents,
            (None, Domain::Filesystem) => {
                std::fs::read_to_string(&key.path).map_err(|source| BuildError::Read {
                    path: key.path.clone(),
                    source,
                })?
            }
            (None, domain) => {
                return Err(BuildError::NoLoader {
                    path: key.path.clone(),
                    domain,
                })
            }
        };
        tracing::debug!(path = %key.path, domain = %key.domain, bytes = source.len(), "loaded");

        let resolve_dir = match key.domain {
            Domain::Filesystem => Path::new(&key.path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(default_resolve_dir),
            Domain::Network => default_resolve_dir(),
        };
        self.add_module(key, &source, resolve_dir)
    }
}
