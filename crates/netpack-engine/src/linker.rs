//! Linker
//!
//! Concatenates a module graph into a single script. Every ES module except
//! the entry runs in its own function scope and publishes its exports as
//! getters on a module object declared up front:
//!
//! ```text
//! const __netpack_m1 = {};
//! (() => {
//!   __netpack_export(__netpack_m1, { count: () => count });
//!   let count = 0;
//! })();
//! console.log(__netpack_m1.count);
//! ```
//!
//! Imports are rewritten into reads of the target's module object, so a
//! binding observes later assignments in the exporting module and modules
//! in an import cycle can reach each other. CommonJS modules are wrapped in
//! a function receiving `exports`, `module` and `require`, and their module
//! object is whatever ends up in `module.exports`.
//!
//! Export sets of ES modules are resolved statically and an import of a
//! name the target does not export fails the link.

use std::fmt::Write as _;

use rustc_hash::{FxHashMap, FxHashSet};
use swc_core::common::comments::{Comments, SingleThreadedComments};
use swc_core::common::{BytePos, Spanned, DUMMY_SP};
use swc_core::ecma::ast::{
    Callee, ClassDecl, ComputedPropName, Decl, DefaultDecl, Expr, FnDecl, Id, Ident, KeyValueProp,
    Lit, MemberExpr, MemberProp, Module, ModuleDecl, ModuleItem, Number, ParenExpr, Prop, PropName,
    SeqExpr, Stmt, Str,
};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};
use thiserror::Error;

use crate::compiler::{Compiler, SyntaxError};
use crate::graph::ModuleId;
use crate::minify::{emit, MinifyOptions};
use crate::scanner::{ExportBinding, ImportName, ModuleKind, ScannedModule};

/// Errors produced while linking
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("No matching export in \"{module}\" for import \"{name}\" (imported by \"{importer}\")")]
    MissingExport {
        name: String,
        module: String,
        importer: String,
    },

    #[error("Request \"{request}\" in \"{importer}\" was never resolved")]
    UnresolvedRequest { request: String, importer: String },

    #[error("Could not print \"{path}\": {source}")]
    Print {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Linked output does not parse: {0}")]
    Output(SyntaxError),
}

/// Output format of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// ES module; the entry's exports stay exports
    #[default]
    Esm,
    /// Immediately-invoked function expression; exports are dropped
    Iife,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "esm" => Ok(Format::Esm),
            "iife" => Ok(Format::Iife),
            other => Err(format!("unknown format \"{other}\" (expected esm or iife)")),
        }
    }
}

/// One module as seen by the linker
pub struct LinkModule {
    /// Path used in diagnostics
    pub path: String,
    pub scanned: ScannedModule,
    /// Module each request of the record resolved to
    pub requests: FxHashMap<String, ModuleId>,
}

impl LinkModule {
    fn request(&self, request: &str) -> Result<ModuleId, LinkError> {
        self.requests
            .get(request)
            .copied()
            .ok_or_else(|| LinkError::UnresolvedRequest {
                request: request.to_string(),
                importer: self.path.clone(),
            })
    }

    fn kind(&self) -> ModuleKind {
        self.scanned.record.kind
    }
}

/// Where the value of an exported name comes from
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// A top-level binding of the exporting module
    Local(String),
    /// A property of another module's object
    Member(ModuleId, String),
    /// Another module's object itself
    Namespace(ModuleId),
}

impl Target {
    fn expression(&self) -> String {
        match self {
            Target::Local(name) => name.clone(),
            Target::Member(id, name) => member_access(&module_var(*id), name),
            Target::Namespace(id) => module_var(*id),
        }
    }
}

type ExportTable = Vec<(String, Target)>;

/// Runtime snippets, emitted only when some module needs them
#[derive(Default)]
struct RuntimeHelpers {
    export: bool,
    commonjs: bool,
}

impl RuntimeHelpers {
    fn generate(&self) -> String {
        let mut code = String::new();
        if self.export {
            code.push_str(include_str!("runtime/export.js"));
        }
        if self.commonjs {
            code.push_str(include_str!("runtime/commonjs.js"));
        }
        code
    }
}

/// Link `order` (dependencies first, entry last) into one script
///
/// `modules` is indexed by [`ModuleId`].
pub fn link(
    compiler: &Compiler,
    mut modules: Vec<LinkModule>,
    order: &[ModuleId],
    format: Format,
    minify: MinifyOptions,
) -> Result<String, LinkError> {
    let Some(&entry) = order.last() else {
        return Ok(String::new());
    };

    let mut resolver = ExportTables {
        modules: &modules,
        tables: vec![None; modules.len()],
        visiting: Vec::new(),
    };
    for &id in order {
        resolver.get(id)?;
    }
    let tables: Vec<ExportTable> = resolver
        .tables
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
    check_imports(&modules, order, &tables)?;

    let kinds: Vec<ModuleKind> = modules.iter().map(LinkModule::kind).collect();
    let referenced: FxHashSet<ModuleId> = order
        .iter()
        .flat_map(|&id| modules[id].requests.values().copied())
        .collect();

    let mut helpers = RuntimeHelpers::default();
    let mut declarations = String::new();
    let mut chunks = String::new();

    for &id in order {
        let module = &mut modules[id];
        let bindings = import_bindings(module, &kinds)?;
        let var = module_var(id);
        let is_entry = id == entry;

        let mut body = strip_module_syntax(
            std::mem::take(&mut module.scanned.ast.body),
            &module.scanned.comments,
        );
        body.visit_mut_with(&mut ImportRewriter {
            bindings: &bindings,
        });
        let printed = compiler
            .print(
                &Module {
                    span: DUMMY_SP,
                    body,
                    shebang: None,
                },
                Some(&module.scanned.comments),
                false,
            )
            .map_err(|source| LinkError::Print {
                path: module.path.clone(),
                source,
            })?;

        match kinds[id] {
            ModuleKind::CommonJs => {
                helpers.commonjs = true;
                let requests: Vec<String> = module
                    .scanned
                    .record
                    .specifiers
                    .iter()
                    .filter_map(|specifier| {
                        let dep = module.requests.get(specifier)?;
                        Some(format!("{}: () => {}", js_string(specifier), module_var(*dep)))
                    })
                    .collect();
                let _ = writeln!(
                    chunks,
                    "const {var} = __netpack_cjs(function (exports, module, require) {{\n{printed}}}, {{ {} }});",
                    requests.join(", ")
                );
            }
            ModuleKind::Esm => {
                let has_object = referenced.contains(&id);
                if has_object {
                    let _ = writeln!(declarations, "const {var} = {{}};");
                }
                let install = if has_object && !tables[id].is_empty() {
                    helpers.export = true;
                    format!("__netpack_export({var}, {{\n{}\n}});\n", getters(&tables[id]))
                } else {
                    String::new()
                };
                if is_entry {
                    chunks.push_str(&install);
                    chunks.push_str(&printed);
                } else {
                    let _ = write!(chunks, "(() => {{\n{install}{printed}}})();\n");
                }
            }
        }
    }

    if format == Format::Esm {
        chunks.push_str(&entry_exports(entry, kinds[entry], &tables[entry]));
    }

    let mut code = helpers.generate();
    code.push_str(&declarations);
    code.push_str(&chunks);
    if format == Format::Iife {
        code = format!("(() => {{\n{code}}})();\n");
    }

    let mut output = compiler.parse("<bundle>", &code).map_err(LinkError::Output)?;
    emit(compiler, &mut output.ast, &output.comments, minify).map_err(|source| LinkError::Print {
        path: "<bundle>".to_string(),
        source,
    })
}

/// Export tables of every module, memoized
///
/// A module reached again while its own table is being built contributes
/// nothing to the star exports of the module that reached it.
struct ExportTables<'a> {
    modules: &'a [LinkModule],
    tables: Vec<Option<ExportTable>>,
    visiting: Vec<ModuleId>,
}

impl ExportTables<'_> {
    fn get(&mut self, id: ModuleId) -> Result<ExportTable, LinkError> {
        if let Some(table) = &self.tables[id] {
            return Ok(table.clone());
        }
        if self.visiting.contains(&id) {
            return Ok(ExportTable::new());
        }

        self.visiting.push(id);
        let table = self.build(id);
        self.visiting.pop();

        let table = table?;
        self.tables[id] = Some(table.clone());
        Ok(table)
    }

    fn build(&mut self, id: ModuleId) -> Result<ExportTable, LinkError> {
        let modules = self.modules;
        let module = &modules[id];
        let record = &module.scanned.record;
        let mut table = ExportTable::new();

        if record.kind == ModuleKind::CommonJs {
            for name in &record.commonjs_exports {
                if name != "default" && name != "__esModule" {
                    table.push((name.clone(), Target::Member(id, name.clone())));
                }
            }
            return Ok(table);
        }

        for export in &record.exports {
            let target = match &export.binding {
                ExportBinding::Local(local) => Target::Local(local.0.to_string()),
                ExportBinding::Reexport { request, imported } => {
                    let dep = module.request(request)?;
                    match imported {
                        ImportName::Namespace => Target::Namespace(dep),
                        ImportName::Named(name) => Target::Member(dep, name.clone()),
                    }
                }
            };
            table.push((export.exported.clone(), target));
        }

        // Own names beat star exports, the first star export providing a name wins
        let has_default = table.iter().any(|(name, _)| name == "default");
        let mut commonjs_star = None;
        for request in &record.star_exports {
            let dep = module.request(request)?;
            if modules[dep].kind() == ModuleKind::CommonJs && commonjs_star.is_none() {
                commonjs_star = Some(dep);
            }
            for (name, _) in self.get(dep)? {
                if name == "default" || table.iter().any(|(n, _)| *n == name) {
                    continue;
                }
                table.push((name.clone(), Target::Member(dep, name)));
            }
        }

        // `export * from` a CommonJS module also exposes its `module.exports` as default
        if let (false, Some(dep)) = (has_default, commonjs_star) {
            table.push(("default".to_string(), Target::Namespace(dep)));
        }
        Ok(table)
    }
}

fn check_imports(modules: &[LinkModule], order: &[ModuleId], tables: &[ExportTable]) -> Result<(), LinkError> {
    for &id in order {
        let module = &modules[id];
        let record = &module.scanned.record;

        let imported = record
            .imports
            .iter()
            .flat_map(|import| import.bindings.iter().map(move |b| (&import.request, &b.imported)));
        let reexported = record.exports.iter().filter_map(|export| match &export.binding {
            ExportBinding::Reexport { request, imported } => Some((request, imported)),
            ExportBinding::Local(_) => None,
        });

        for (request, imported) in imported.chain(reexported) {
            let ImportName::Named(name) = imported else {
                continue;
            };
            let dep = module.request(request)?;
            if modules[dep].kind() == ModuleKind::CommonJs {
                continue;
            }
            if !tables[dep].iter().any(|(n, _)| n == name) {
                return Err(LinkError::MissingExport {
                    name: name.clone(),
                    module: modules[dep].path.clone(),
                    importer: module.path.clone(),
                });
            }
        }
    }
    Ok(())
}

/// What each import binding of `module` reads instead
fn import_bindings(module: &LinkModule, kinds: &[ModuleKind]) -> Result<FxHashMap<Id, Replacement>, LinkError> {
    let mut bindings = FxHashMap::default();
    for import in &module.scanned.record.imports {
        let dep = module.request(&import.request)?;
        for binding in &import.bindings {
            let member = match (&binding.imported, kinds[dep]) {
                (ImportName::Namespace, _) => None,
                (ImportName::Named(name), ModuleKind::CommonJs) if name == "default" => None,
                (ImportName::Named(name), _) => Some(name.clone()),
            };
            bindings.insert(
                binding.local.clone(),
                Replacement {
                    object: module_var(dep),
                    member,
                },
            );
        }
    }
    Ok(bindings)
}

/// The entry's `export { .. }` list. Re-exported values are read once, after
/// every module has run.
fn entry_exports(entry: ModuleId, kind: ModuleKind, table: &ExportTable) -> String {
    if kind == ModuleKind::CommonJs {
        return format!("export default {};\n", module_var(entry));
    }
    if table.is_empty() {
        return String::new();
    }

    let mut snapshots = String::new();
    let mut specifiers = Vec::with_capacity(table.len());
    for (index, (name, target)) in table.iter().enumerate() {
        let local = match target {
            Target::Local(local) => local.clone(),
            other => {
                let local = format!("__netpack_r{index}");
                let _ = writeln!(snapshots, "const {local} = {};", other.expression());
                local
            }
        };
        let exported = property_key(name);
        if local == exported {
            specifiers.push(local);
        } else {
            specifiers.push(format!("{local} as {exported}"));
        }
    }
    format!("{snapshots}export {{ {} }};\n", specifiers.join(", "))
}

fn getters(table: &ExportTable) -> String {
    table
        .iter()
        .map(|(name, target)| format!("  {}: () => {}", property_key(name), target.expression()))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Drop imports and re-exports, and turn exported declarations into plain
/// ones. Comments in front of `export` move to the declaration.
fn strip_module_syntax(body: Vec<ModuleItem>, comments: &SingleThreadedComments) -> Vec<ModuleItem> {
    let move_comments = |from: BytePos, to: BytePos| {
        if let Some(leading) = comments.take_leading(from) {
            comments.add_leading_comments(to, leading);
        }
    };

    body.into_iter()
        .filter_map(|item| match item {
            ModuleItem::Stmt(stmt) => Some(stmt),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                move_comments(export.span.lo, export.decl.span().lo);
                Some(Stmt::Decl(export.decl))
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match export.decl {
                DefaultDecl::Fn(function) => function.ident.map(|ident| {
                    Stmt::Decl(Decl::Fn(FnDecl {
                        ident,
                        declare: false,
                        function: function.function,
                    }))
                }),
                DefaultDecl::Class(class) => class.ident.map(|ident| {
                    Stmt::Decl(Decl::Class(ClassDecl {
                        ident,
                        declare: false,
                        class: class.class,
                    }))
                }),
                DefaultDecl::TsInterfaceDecl(_) => None,
            },
            ModuleItem::ModuleDecl(_) => None,
        })
        .map(ModuleItem::Stmt)
        .collect()
}

/// A read of `object` or `object.member`
#[derive(Debug, Clone)]
struct Replacement {
    object: String,
    member: Option<String>,
}

impl Replacement {
    fn expr(&self) -> Expr {
        let object = Expr::Ident(Ident::new(self.object.as_str().into(), DUMMY_SP));
        let Some(member) = &self.member else {
            return object;
        };
        let prop = if is_identifier_name(member) {
            MemberProp::Ident(Ident::new(member.as_str().into(), DUMMY_SP))
        } else {
            MemberProp::Computed(ComputedPropName {
                span: DUMMY_SP,
                expr: Box::new(Expr::Lit(Lit::Str(Str {
                    span: DUMMY_SP,
                    value: member.as_str().into(),
                    raw: None,
                }))),
            })
        };
        Expr::Member(MemberExpr {
            span: DUMMY_SP,
            obj: Box::new(object),
            prop,
        })
    }
}

/// Rewrites references to import bindings into module object reads
struct ImportRewriter<'a> {
    bindings: &'a FxHashMap<Id, Replacement>,
}

impl VisitMut for ImportRewriter<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Expr::Ident(ident) = expr {
            if let Some(replacement) = self.bindings.get(&ident.to_id()) {
                *expr = replacement.expr();
                return;
            }
        }
        expr.visit_mut_children_with(self);
    }

    // `f()` becomes `(0, m.f)()` so the callee is not called with `m` as `this`
    fn visit_mut_callee(&mut self, callee: &mut Callee) {
        if let Callee::Expr(expr) = callee {
            if let Expr::Ident(ident) = &**expr {
                if let Some(replacement) = self.bindings.get(&ident.to_id()) {
                    if replacement.member.is_some() {
                        **expr = Expr::Paren(ParenExpr {
                            span: DUMMY_SP,
                            expr: Box::new(Expr::Seq(SeqExpr {
                                span: DUMMY_SP,
                                exprs: vec![
                                    Box::new(Expr::Lit(Lit::Num(Number {
                                        span: DUMMY_SP,
                                        value: 0.0,
                                        raw: None,
                                    }))),
                                    Box::new(replacement.expr()),
                                ],
                            })),
                        });
                        return;
                    }
                }
            }
        }
        callee.visit_mut_children_with(self);
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop {
            if let Some(replacement) = self.bindings.get(&ident.to_id()) {
                *prop = Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(Ident::new(ident.sym.clone(), DUMMY_SP)),
                    value: Box::new(replacement.expr()),
                });
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }
}

fn module_var(id: ModuleId) -> String {
    format!("__netpack_m{id}")
}

/// `IdentifierName` check; reserved words are allowed
fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || c == '_' || c == '\u{200c}' || c == '\u{200d}' || c.is_alphanumeric())
}

fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn property_key(name: &str) -> String {
    if is_identifier_name(name) {
        name.to_string()
    } else {
        js_string(name)
    }
}

fn member_access(object: &str, name: &str) -> String {
    if is_identifier_name(name) {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", js_string(name))
    }
}
