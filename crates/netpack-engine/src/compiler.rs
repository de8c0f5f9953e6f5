//! Parsing and printing with swc
//!
//! One [`Compiler`] is shared by every module of a build so that all source
//! files live in the same source map.

use std::io;

use swc_core::common::comments::{Comments, SingleThreadedComments};
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, Globals, Mark, SourceMap, Spanned, SyntaxContext, GLOBALS};
use swc_core::ecma::ast::{EsVersion, Module};
use swc_core::ecma::codegen::{text_writer::JsWriter, Config, Emitter};
use swc_core::ecma::parser::{error::Error as ParserError, lexer::Lexer, Parser, StringInput, Syntax};
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::visit::VisitMutWith;
use thiserror::Error;

/// A syntax error, positioned in the module it was found in
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} ({line}:{column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// A parsed module with its identifiers resolved to scopes
pub struct ParsedModule {
    pub ast: Module,
    pub comments: SingleThreadedComments,
    /// Context of references to undeclared (global) names
    pub unresolved_ctxt: SyntaxContext,
    /// Context of the module's top-level bindings
    pub top_level_ctxt: SyntaxContext,
}

#[derive(Default)]
pub struct Compiler {
    cm: Lrc<SourceMap>,
    globals: Globals,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source` as an ES module and run the scope resolver over it
    pub fn parse(&self, name: &str, source: &str) -> Result<ParsedModule, SyntaxError> {
        let fm = self
            .cm
            .new_source_file(FileName::Custom(name.to_string()), source.to_string());
        let comments = SingleThreadedComments::default();

        let lexer = Lexer::new(
            Syntax::Es(Default::default()),
            EsVersion::latest(),
            StringInput::from(&*fm),
            Some(&comments),
        );
        let mut parser = Parser::new_from(lexer);
        let parsed = parser.parse_module();
        if let Some(error) = parser.take_errors().into_iter().next() {
            return Err(self.syntax_error(&error));
        }
        let mut ast = parsed.map_err(|error| self.syntax_error(&error))?;

        let (unresolved_ctxt, top_level_ctxt) = GLOBALS.set(&self.globals, || {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();
            ast.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));
            (
                SyntaxContext::empty().apply_mark(unresolved_mark),
                SyntaxContext::empty().apply_mark(top_level_mark),
            )
        });

        Ok(ParsedModule {
            ast,
            comments,
            unresolved_ctxt,
            top_level_ctxt,
        })
    }

    /// Print a module. Comments are kept when given.
    pub fn print(
        &self,
        module: &Module,
        comments: Option<&SingleThreadedComments>,
        minify: bool,
    ) -> io::Result<String> {
        let mut output = Vec::new();
        {
            let mut cfg = Config::default();
            cfg.target = EsVersion::latest();
            cfg.minify = minify;

            let mut emitter = Emitter {
                cfg,
                cm: self.cm.clone(),
                comments: comments.map(|c| c as &dyn Comments),
                wr: JsWriter::new(self.cm.clone(), "\n", &mut output, None),
            };
            emitter.emit_module(module)?;
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn syntax_error(&self, error: &ParserError) -> SyntaxError {
        let loc = self.cm.lookup_char_pos(error.span().lo);
        SyntaxError {
            message: error.kind().msg().to_string(),
            line: loc.line,
            column: loc.col.0 + 1,
        }
    }
}
