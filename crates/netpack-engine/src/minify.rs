//! Output minification
//!
//! Whitespace minification is swc's compact printing. Identifier
//! minification only shortens the names the linker generates, which are
//! never visible to user code, so it needs no scope analysis: a short name
//! is safe as long as no identifier anywhere in the output already uses it.

use rustc_hash::{FxHashMap, FxHashSet};
use swc_core::common::comments::SingleThreadedComments;
use swc_core::ecma::ast::{Ident, Module};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};

use crate::compiler::Compiler;

/// Prefix of every name the linker generates
pub const GENERATED_PREFIX: &str = "__netpack_";

/// Which minifications to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MinifyOptions {
    /// Drop comments and collapse whitespace
    pub whitespace: bool,
    /// Shorten the names the linker generates
    pub identifiers: bool,
}

impl MinifyOptions {
    /// Every minification turned on
    pub fn all() -> Self {
        Self {
            whitespace: true,
            identifiers: true,
        }
    }
}

/// Print `module` according to `options`
pub fn emit(
    compiler: &Compiler,
    module: &mut Module,
    comments: &SingleThreadedComments,
    options: MinifyOptions,
) -> std::io::Result<String> {
    if options.identifiers {
        shorten_generated_names(module);
    }
    let comments = (!options.whitespace).then_some(comments);
    compiler.print(module, comments, options.whitespace)
}

/// Rename every `__netpack_*` identifier to the shortest unused name
pub fn shorten_generated_names(module: &mut Module) {
    let mut names = NameCollector::default();
    module.visit_with(&mut names);
    if names.generated.is_empty() {
        return;
    }

    let mut generator = NameGenerator::default();
    let renames = names
        .generated
        .into_iter()
        .map(|from| loop {
            let candidate = generator.next_name();
            if !names.taken.contains(&candidate) && !RESERVED.contains(&candidate.as_str()) {
                break (from, candidate);
            }
        })
        .collect();
    module.visit_mut_with(&mut Renamer { renames });
}

/// Generated names in order of first appearance, and every other name
#[derive(Default)]
struct NameCollector {
    generated: Vec<String>,
    seen: FxHashSet<String>,
    taken: FxHashSet<String>,
}

impl Visit for NameCollector {
    fn visit_ident(&mut self, ident: &Ident) {
        let name = &*ident.sym;
        if name.starts_with(GENERATED_PREFIX) {
            if self.seen.insert(name.to_string()) {
                self.generated.push(name.to_string());
            }
        } else {
            self.taken.insert(name.to_string());
        }
    }
}

struct Renamer {
    renames: FxHashMap<String, String>,
}

impl VisitMut for Renamer {
    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        if let Some(to) = self.renames.get(&*ident.sym) {
            ident.sym = to.as_str().into();
        }
    }
}

const RESERVED: &[&str] = &[
    "as", "do", "if", "in", "is", "of", "for", "get", "let", "new", "set", "try", "var", "case",
    "else", "enum", "eval", "null", "this", "true", "void", "with", "arguments", "undefined",
];

/// Yields `a`, `b`, ... `z`, `A`, ... `Z`, `aa`, ...
#[derive(Default)]
struct NameGenerator {
    counter: usize,
}

impl NameGenerator {
    const ALPHABET: &'static [u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

    fn next_name(&mut self) -> String {
        let mut n = self.counter;
        self.counter += 1;
        let mut name = String::new();
        loop {
            name.push(Self::ALPHABET[n % Self::ALPHABET.len()] as char);
            n /= Self::ALPHABET.len();
            if n == 0 {
                break;
            }
            n -= 1;
        }
        name
    }
}
