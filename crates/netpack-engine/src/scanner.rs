//! Module scanner
//!
//! Parses a module with swc and records its static structure: the requests
//! it makes, what each import binds, and what it exports. Modules without
//! any import or export syntax that touch a free `module` or `exports` are
//! recorded as CommonJS, together with the export names they assign
//! statically and the literal `require()` calls they make.
//!
//! `export default <expression>` is rewritten here into a declaration of
//! [`DEFAULT_LOCAL`], and anonymous default functions and classes are given
//! that name, so every export is backed by a top-level binding.

use rustc_hash::FxHashMap;
use swc_core::common::comments::SingleThreadedComments;
use swc_core::common::util::take::Take;
use swc_core::common::{SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::{
    BindingIdent, CallExpr, Callee, Decl, DefaultDecl, ExportSpecifier, Expr, Id, Ident, ImportSpecifier, Lit,
    MemberExpr, MemberProp, Module, ModuleDecl, ModuleExportName, ModuleItem, Pat, Stmt, VarDecl,
    VarDeclKind, VarDeclarator,
};
use swc_core::ecma::utils::find_pat_ids;
use swc_core::ecma::visit::{Visit, VisitWith};
use thiserror::Error;

use crate::compiler::{Compiler, SyntaxError};

/// Local that holds the module's default export when it has no name of its own
pub const DEFAULT_LOCAL: &str = "__netpack_default";

/// Errors produced while scanning a module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("{0}")]
    Syntax(#[from] SyntaxError),

    #[error("Multiple exports with the same name \"{name}\"")]
    DuplicateExport { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleKind {
    #[default]
    Esm,
    CommonJs,
}

/// What an import binding refers to in the target module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportName {
    /// A named export (`"default"` for default imports)
    Named(String),
    /// The whole module namespace
    Namespace,
}

impl ImportName {
    pub fn named(name: impl Into<String>) -> Self {
        ImportName::Named(name.into())
    }
}

/// `imported as local`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub imported: ImportName,
    pub local: Id,
}

/// One import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub request: String,
    /// Empty for side-effect imports
    pub bindings: Vec<ImportBinding>,
}

/// Where an exported name gets its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportBinding {
    /// A top-level binding of this module
    Local(Id),
    /// `export { x as y } from "..."`, `export * as ns from "..."`, or a
    /// local export list entry naming an import binding
    Reexport { request: String, imported: ImportName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub exported: String,
    pub binding: ExportBinding,
}

/// Static module structure of one source text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRecord {
    pub kind: ModuleKind,
    /// Unique requests, in source order. For CommonJS these are the
    /// literal `require()` arguments.
    pub specifiers: Vec<String>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    /// `export * from "..."` requests
    pub star_exports: Vec<String>,
    /// Names a CommonJS module assigns on `exports` or `module.exports`
    pub commonjs_exports: Vec<String>,
}

impl ModuleRecord {
    fn add_specifier(&mut self, specifier: &str) {
        if !self.specifiers.iter().any(|s| s == specifier) {
            self.specifiers.push(specifier.to_string());
        }
    }

    fn add_export(&mut self, exported: String, binding: ExportBinding) -> Result<(), ScanError> {
        if self.exports.iter().any(|e| e.exported == exported) {
            return Err(ScanError::DuplicateExport { name: exported });
        }
        self.exports.push(Export { exported, binding });
        Ok(())
    }
}

/// A parsed module ready for linking
pub struct ScannedModule {
    pub ast: Module,
    pub comments: SingleThreadedComments,
    pub record: ModuleRecord,
}

/// Parse and scan one module
pub fn scan(compiler: &Compiler, name: &str, source: &str) -> Result<ScannedModule, ScanError> {
    let parsed = compiler.parse(name, source)?;
    let mut ast = parsed.ast;
    let mut record = ModuleRecord::default();

    // Import bindings by local id, so `export { x }` of an import becomes a re-export
    let mut imported: FxHashMap<Id, (String, ImportName)> = FxHashMap::default();
    for item in &ast.body {
        if let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item {
            let request = import.src.value.to_string();
            let bindings: Vec<ImportBinding> = import
                .specifiers
                .iter()
                .map(|specifier| match specifier {
                    ImportSpecifier::Named(named) => ImportBinding {
                        imported: ImportName::Named(
                            named
                                .imported
                                .as_ref()
                                .map(export_name)
                                .unwrap_or_else(|| named.local.sym.to_string()),
                        ),
                        local: named.local.to_id(),
                    },
                    ImportSpecifier::Default(default) => ImportBinding {
                        imported: ImportName::named("default"),
                        local: default.local.to_id(),
                    },
                    ImportSpecifier::Namespace(namespace) => ImportBinding {
                        imported: ImportName::Namespace,
                        local: namespace.local.to_id(),
                    },
                })
                .collect();
            for binding in &bindings {
                imported.insert(binding.local.clone(), (request.clone(), binding.imported.clone()));
            }
            record.imports.push(Import { request, bindings });
        }
    }

    let mut has_module_syntax = false;
    for item in ast.body.iter_mut() {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        has_module_syntax = true;

        match decl {
            ModuleDecl::Import(import) => record.add_specifier(&import.src.value),
            ModuleDecl::ExportDecl(export) => match &export.decl {
                Decl::Class(class) => {
                    record.add_export(class.ident.sym.to_string(), ExportBinding::Local(class.ident.to_id()))?
                }
                Decl::Fn(function) => record.add_export(
                    function.ident.sym.to_string(),
                    ExportBinding::Local(function.ident.to_id()),
                )?,
                Decl::Var(var) => {
                    for id in find_pat_ids::<_, Id>(&**var) {
                        record.add_export(id.0.to_string(), ExportBinding::Local(id))?;
                    }
                }
                _ => {}
            },
            ModuleDecl::ExportNamed(named) => {
                if let Some(src) = &named.src {
                    record.add_specifier(&src.value);
                }
                for specifier in &named.specifiers {
                    let (exported, binding) = match specifier {
                        ExportSpecifier::Named(spec) => {
                            let orig = export_name(&spec.orig);
                            let exported = spec.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone());
                            let binding = match (&named.src, &spec.orig) {
                                (Some(src), _) => ExportBinding::Reexport {
                                    request: src.value.to_string(),
                                    imported: ImportName::Named(orig),
                                },
                                (None, ModuleExportName::Ident(ident)) => match imported.get(&ident.to_id()) {
                                    Some((request, name)) => ExportBinding::Reexport {
                                        request: request.clone(),
                                        imported: name.clone(),
                                    },
                                    None => ExportBinding::Local(ident.to_id()),
                                },
                                // A string name without `from` is rejected by the parser
                                (None, ModuleExportName::Str(_)) => continue,
                            };
                            (exported, binding)
                        }
                        ExportSpecifier::Namespace(spec) => match &named.src {
                            Some(src) => (
                                export_name(&spec.name),
                                ExportBinding::Reexport {
                                    request: src.value.to_string(),
                                    imported: ImportName::Namespace,
                                },
                            ),
                            None => continue,
                        },
                        // `export v from "..."` is not ES syntax
                        ExportSpecifier::Default(_) => continue,
                    };
                    record.add_export(exported, binding)?;
                }
            }
            ModuleDecl::ExportDefaultDecl(export) => {
                let ident = match &mut export.decl {
                    DefaultDecl::Class(class) => class
                        .ident
                        .get_or_insert_with(|| default_ident(parsed.top_level_ctxt))
                        .clone(),
                    DefaultDecl::Fn(function) => function
                        .ident
                        .get_or_insert_with(|| default_ident(parsed.top_level_ctxt))
                        .clone(),
                    DefaultDecl::TsInterfaceDecl(_) => continue,
                };
                record.add_export("default".to_string(), ExportBinding::Local(ident.to_id()))?;
            }
            ModuleDecl::ExportDefaultExpr(export) => {
                let ident = default_ident(parsed.top_level_ctxt);
                let expr = export.expr.take();
                record.add_export("default".to_string(), ExportBinding::Local(ident.to_id()))?;
                *item = ModuleItem::Stmt(const_decl(ident, expr));
            }
            ModuleDecl::ExportAll(all) => {
                record.add_specifier(&all.src.value);
                record.star_exports.push(all.src.value.to_string());
            }
            _ => {}
        }
    }

    if !has_module_syntax {
        let mut usage = CommonJsUsage::new(parsed.unresolved_ctxt);
        ast.visit_with(&mut usage);
        if usage.uses_module {
            record.kind = ModuleKind::CommonJs;
            record.specifiers = usage.requires;
            record.commonjs_exports = usage.exports;
        }
    }

    Ok(ScannedModule {
        ast,
        comments: parsed.comments,
        record,
    })
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

fn default_ident(top_level_ctxt: SyntaxContext) -> Ident {
    Ident::new(DEFAULT_LOCAL.into(), DUMMY_SP.with_ctxt(top_level_ctxt))
}

fn const_decl(ident: Ident, init: Box<Expr>) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        kind: VarDeclKind::Const,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent::from(ident)),
            init: Some(init),
            definite: false,
        }],
    })))
}

/// Free `module`/`exports` references, static export names and literal requires
struct CommonJsUsage {
    unresolved: SyntaxContext,
    uses_module: bool,
    requires: Vec<String>,
    exports: Vec<String>,
}

impl CommonJsUsage {
    fn new(unresolved: SyntaxContext) -> Self {
        Self {
            unresolved,
            uses_module: false,
            requires: Vec::new(),
            exports: Vec::new(),
        }
    }

    fn is_free(&self, expr: &Expr, name: &str) -> bool {
        matches!(expr, Expr::Ident(ident) if ident.span.ctxt == self.unresolved && &*ident.sym == name)
    }

    /// `exports` or `module.exports`
    fn is_exports_object(&self, expr: &Expr) -> bool {
        if self.is_free(expr, "exports") {
            return true;
        }
        match expr {
            Expr::Member(member) => {
                self.is_free(&member.obj, "module")
                    && matches!(&member.prop, MemberProp::Ident(prop) if &*prop.sym == "exports")
            }
            _ => false,
        }
    }

    fn add_export(&mut self, name: &str) {
        if !self.exports.iter().any(|n| n == name) {
            self.exports.push(name.to_string());
        }
    }
}

fn string_literal(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Lit(Lit::Str(s)) => Some(&*s.value),
        _ => None,
    }
}

impl Visit for CommonJsUsage {
    fn visit_ident(&mut self, ident: &Ident) {
        if ident.span.ctxt == self.unresolved && (&*ident.sym == "module" || &*ident.sym == "exports") {
            self.uses_module = true;
        }
    }

    fn visit_member_expr(&mut self, member: &MemberExpr) {
        member.visit_children_with(self);
        if !self.is_exports_object(&member.obj) {
            return;
        }
        match &member.prop {
            MemberProp::Ident(prop) => self.add_export(&prop.sym),
            MemberProp::Computed(computed) => {
                if let Some(name) = string_literal(&computed.expr) {
                    self.add_export(name);
                }
            }
            _ => {}
        }
    }

    fn visit_call_expr(&mut self, call: &CallExpr) {
        call.visit_children_with(self);
        let Callee::Expr(callee) = &call.callee else {
            return;
        };

        if self.is_free(callee, "require") {
            if let [arg] = call.args.as_slice() {
                if arg.spread.is_none() {
                    if let Some(specifier) = string_literal(&arg.expr) {
                        if !self.requires.iter().any(|r| r == specifier) {
                            self.requires.push(specifier.to_string());
                        }
                    }
                }
            }
            return;
        }

        // Object.defineProperty(exports, "name", ...)
        let Expr::Member(member) = &**callee else {
            return;
        };
        let is_define_property = self.is_free(&member.obj, "Object")
            && matches!(&member.prop, MemberProp::Ident(prop) if &*prop.sym == "defineProperty");
        if let (true, [target, name, ..]) = (is_define_property, call.args.as_slice()) {
            if self.is_exports_object(&target.expr) {
                if let Some(name) = string_literal(&name.expr) {
                    self.add_export(name);
                }
            }
        }
    }
}
