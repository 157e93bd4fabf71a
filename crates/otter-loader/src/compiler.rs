//! Compiler capability consumed by module records.
//!
//! The loader never parses source itself. A [`SourceCompiler`] turns source
//! text into a [`CompiledModule`]: the static import/export shape the linker
//! needs, plus an opaque [`ModuleBody`] the evaluator runs once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::binding::Binding;
use crate::error::LoadResult;
use crate::hooks::ImportMetaHook;
use crate::value::{JsObject, Value};

/// Turns source text into a compiled module
pub trait SourceCompiler: Send + Sync {
    /// Compile `source` for the module at `url`.
    ///
    /// Malformed source fails with [`crate::LoadError::Compile`].
    fn compile(&self, url: &str, source: &str) -> LoadResult<CompiledModule>;
}

/// Executable part of a compiled module
pub trait ModuleBody: Send + Sync {
    /// Run the body once. `Ok` is the completion value, `Err` the thrown value.
    fn evaluate(&self, scope: &ModuleScope) -> Result<Value, Value>;
}

/// Which export of the dependency an import refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportName {
    /// A single named export (`default` included)
    Named(String),
    /// The whole namespace (`* as ns`)
    Namespace,
}

/// `import <import_name> as <local_name> from <specifier>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Raw specifier
    pub specifier: String,
    /// Imported export
    pub import_name: ImportName,
    /// Local binding name
    pub local_name: String,
}

/// One export declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEntry {
    /// `export const x = ...`, `export default ...`, `export { local as exported }`
    Local {
        /// Exported name
        export_name: String,
        /// Local binding name (may name an import, which re-exports it)
        local_name: String,
    },
    /// `export { name as exported } from "specifier"`, `export * as ns from "specifier"`
    Indirect {
        /// Exported name
        export_name: String,
        /// Raw specifier
        specifier: String,
        /// Export of the dependency
        import_name: ImportName,
    },
    /// `export * from "specifier"`
    Star {
        /// Raw specifier
        specifier: String,
    },
}

impl ExportEntry {
    /// Exported name, `None` for star exports
    pub fn export_name(&self) -> Option<&str> {
        match self {
            ExportEntry::Local { export_name, .. } | ExportEntry::Indirect { export_name, .. } => {
                Some(export_name)
            }
            ExportEntry::Star { .. } => None,
        }
    }
}

/// Output of [`SourceCompiler::compile`]
#[derive(Clone)]
pub struct CompiledModule {
    /// Requested specifiers in source order, without duplicates
    pub requests: Vec<String>,
    /// Import declarations
    pub imports: Vec<ImportEntry>,
    /// Export declarations
    pub exports: Vec<ExportEntry>,
    /// Executable body
    pub body: Arc<dyn ModuleBody>,
}

impl CompiledModule {
    /// Requests derived from imports and exports, in declaration order.
    pub fn collect_requests(imports: &[ImportEntry], exports: &[ExportEntry]) -> Vec<String> {
        let mut requests: Vec<String> = Vec::new();
        let from_exports = exports.iter().filter_map(|e| match e {
            ExportEntry::Indirect { specifier, .. } | ExportEntry::Star { specifier } => {
                Some(specifier)
            }
            ExportEntry::Local { .. } => None,
        });
        for specifier in imports.iter().map(|i| &i.specifier).chain(from_exports) {
            if !requests.contains(specifier) {
                requests.push(specifier.clone());
            }
        }
        requests
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModule")
            .field("requests", &self.requests)
            .field("imports", &self.imports)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

/// What a module body sees while it runs.
///
/// Imports are aliases of the dependency's export slots and are read-only
/// for the body; exported locals are the module's own slots.
pub struct ModuleScope {
    url: String,
    imports: HashMap<String, Binding>,
    exports: HashMap<String, Binding>,
    meta: OnceLock<Value>,
    meta_hook: Option<ImportMetaHook>,
}

impl ModuleScope {
    pub(crate) fn new(
        url: String,
        imports: HashMap<String, Binding>,
        exports: HashMap<String, Binding>,
        meta_hook: Option<ImportMetaHook>,
    ) -> Self {
        Self {
            url,
            imports,
            exports,
            meta: OnceLock::new(),
            meta_hook,
        }
    }

    /// URL of the running module
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Imported binding for a local name
    pub fn import(&self, local_name: &str) -> Option<&Binding> {
        self.imports.get(local_name)
    }

    /// Export slot of a local declaration
    pub fn export(&self, local_name: &str) -> Option<&Binding> {
        self.exports.get(local_name)
    }

    /// `import.meta`, created on first use
    pub fn import_meta(&self) -> Value {
        self.meta
            .get_or_init(|| {
                let meta = JsObject::from_entries([("url", Value::from(self.url.as_str()))]);
                if let Some(hook) = &self.meta_hook {
                    hook(&self.url, &meta);
                }
                Value::Object(meta)
            })
            .clone()
    }
}
