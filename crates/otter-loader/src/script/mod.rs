//! Built-in compiler for module scripts.
//!
//! Handles the module-level subset of JavaScript the loader needs to be
//! useful on its own: every `import`/`export` form, `const`/`let`
//! declarations, assignment, `throw`, and expressions over literals,
//! arrays, objects, member access, calls, `+`, `new Error(...)`, `typeof`
//! and `import.meta`. The completion value of a module is the value of its
//! last expression statement.
//!
//! Embedders with a real engine supply their own [`SourceCompiler`].

mod ast;
mod eval;
mod lexer;
mod parser;

use std::sync::Arc;

use tracing::trace;

use crate::compiler::{CompiledModule, SourceCompiler};
use crate::error::{LoadError, LoadResult};

/// Compiler for the built-in module script language
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    /// Create a compiler
    pub fn new() -> Self {
        Self
    }
}

impl SourceCompiler for ScriptCompiler {
    fn compile(&self, url: &str, source: &str) -> LoadResult<CompiledModule> {
        let parsed = parser::parse(source).map_err(|message| LoadError::compile(url, message))?;
        trace!(
            url,
            requests = parsed.requests.len(),
            imports = parsed.imports.len(),
            exports = parsed.exports.len(),
            "compiled module script"
        );
        Ok(CompiledModule {
            requests: parsed.requests,
            imports: parsed.imports,
            exports: parsed.exports,
            body: Arc::new(parsed.program),
        })
    }
}
