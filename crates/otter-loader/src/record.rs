//! Module records and their lifecycle.
//!
//! A [`ModuleRecord`] is the unit the loader drives: created unlinked by the
//! cache, compiled by an init hook, wired to its dependencies during
//! discovery, then instantiated and evaluated by [`crate::link`]. Status only
//! moves forward; `Evaluated` and `Errored` are final.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::binding::Binding;
use crate::compiler::{CompiledModule, ExportEntry, ImportEntry, ModuleBody, ModuleScope, SourceCompiler};
use crate::dynamic::{Executor, Reflect};
use crate::error::{LoadError, LoadResult};
use crate::hooks::ImportMetaHook;
use crate::link;
use crate::namespace::Namespace;
use crate::value::Value;

/// Shared handle to a module record
pub type ModuleRef = Arc<ModuleRecord>;

/// Producer of host export values, run once on first evaluation
pub type LazyExports = Box<dyn FnOnce() -> Vec<(String, Value)> + Send>;

/// Module state during linking and evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Created or compiled, imports not bound yet
    Unlinked,
    /// Binding resolution in progress
    Instantiating,
    /// Every import is bound
    Instantiated,
    /// Body (or a dependency's body) is running
    Evaluating,
    /// Body completed
    Evaluated,
    /// Linking or evaluation failed; the error is kept on the record
    Errored,
}

impl ModuleStatus {
    /// No further compile, instantiate or evaluate will happen
    pub fn is_terminal(self) -> bool {
        matches!(self, ModuleStatus::Evaluated | ModuleStatus::Errored)
    }

    /// Imports have been bound successfully
    pub fn is_linked(self) -> bool {
        matches!(
            self,
            ModuleStatus::Instantiated | ModuleStatus::Evaluating | ModuleStatus::Evaluated
        )
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleStatus::Unlinked => "unlinked",
            ModuleStatus::Instantiating => "instantiating",
            ModuleStatus::Instantiated => "instantiated",
            ModuleStatus::Evaluating => "evaluating",
            ModuleStatus::Evaluated => "evaluated",
            ModuleStatus::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Compiled source module
pub(crate) struct SourceModule {
    pub(crate) imports: Vec<ImportEntry>,
    pub(crate) exports: Vec<ExportEntry>,
    /// Export slots keyed by local name
    pub(crate) cells: HashMap<String, Binding>,
    pub(crate) body: Arc<dyn ModuleBody>,
}

/// Exports backed by host-settable cells plus an executor run as the body
pub(crate) struct SyntheticModule {
    pub(crate) cells: IndexMap<String, Binding>,
    pub(crate) executor: Option<Executor>,
    pub(crate) reflect: Arc<Reflect>,
}

/// Host object exposed as a module, materialized on evaluation
pub(crate) struct HostModule {
    pub(crate) cells: IndexMap<String, Binding>,
    pub(crate) thunk: Option<LazyExports>,
}

/// What backs a record's exports
pub(crate) enum ModuleKind {
    Uncompiled,
    Source(SourceModule),
    Synthetic(SyntheticModule),
    Host(HostModule),
}

pub(crate) struct RecordState {
    pub(crate) status: ModuleStatus,
    pub(crate) kind: ModuleKind,
    pub(crate) requested: Vec<String>,
    pub(crate) resolved: HashMap<String, ModuleRef>,
    pub(crate) scope: Option<Arc<ModuleScope>>,
    pub(crate) exception: Option<LoadError>,
}

impl RecordState {
    /// Dependencies in request order (only the wired ones)
    pub(crate) fn dependencies(&self) -> Vec<ModuleRef> {
        self.requested
            .iter()
            .filter_map(|s| self.resolved.get(s).cloned())
            .collect()
    }
}

/// A module identified by its canonical URL
pub struct ModuleRecord {
    url: String,
    state: Mutex<RecordState>,
    namespace: OnceLock<Arc<Namespace>>,
    meta_hook: Option<ImportMetaHook>,
}

impl ModuleRecord {
    /// Create a new unlinked, uncompiled record
    pub fn new(url: impl Into<String>) -> ModuleRef {
        Self::with_meta_hook(url, None)
    }

    pub(crate) fn with_meta_hook(url: impl Into<String>, meta_hook: Option<ImportMetaHook>) -> ModuleRef {
        Arc::new(Self {
            url: url.into(),
            state: Mutex::new(RecordState {
                status: ModuleStatus::Unlinked,
                kind: ModuleKind::Uncompiled,
                requested: Vec::new(),
                resolved: HashMap::new(),
                scope: None,
                exception: None,
            }),
            namespace: OnceLock::new(),
            meta_hook,
        })
    }

    /// Canonical URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current status
    pub fn status(&self) -> ModuleStatus {
        self.state.lock().status
    }

    /// Stored error of an errored record
    pub fn exception(&self) -> Option<LoadError> {
        self.state.lock().exception.clone()
    }

    /// Whether the record has source, synthetic or host exports installed
    pub fn is_compiled(&self) -> bool {
        !matches!(self.state.lock().kind, ModuleKind::Uncompiled)
    }

    /// Raw import specifiers, fixed once compiled
    pub fn requested_specifiers(&self) -> Vec<String> {
        self.state.lock().requested.clone()
    }

    /// Compile source text with `compiler` and install the result
    pub fn compile(&self, compiler: &dyn SourceCompiler, source: &str) -> LoadResult<()> {
        self.ensure_uncompiled()?;
        let compiled = compiler.compile(&self.url, source)?;
        self.install(compiled)
    }

    /// Install an already compiled module
    pub fn install(&self, compiled: CompiledModule) -> LoadResult<()> {
        let mut state = self.lock_uncompiled()?;

        let mut cells = HashMap::new();
        for export in &compiled.exports {
            if let ExportEntry::Local { local_name, .. } = export {
                let is_import = compiled.imports.iter().any(|i| &i.local_name == local_name);
                if !is_import {
                    cells.entry(local_name.clone()).or_insert_with(Binding::new);
                }
            }
        }

        state.requested = compiled.requests;
        state.kind = ModuleKind::Source(SourceModule {
            imports: compiled.imports,
            exports: compiled.exports,
            cells,
            body: compiled.body,
        });
        Ok(())
    }

    /// Expose `names` as exports whose values come from `thunk`.
    ///
    /// The thunk runs once, when the record is first evaluated. Names it does
    /// not produce stay uninitialized.
    pub fn set_lazy_static_exports(&self, names: Vec<String>, thunk: LazyExports) -> LoadResult<()> {
        let mut state = self.lock_uncompiled()?;
        let cells = names.into_iter().map(|n| (n, Binding::new())).collect();
        state.kind = ModuleKind::Host(HostModule {
            cells,
            thunk: Some(thunk),
        });
        Ok(())
    }

    pub(crate) fn install_synthetic(
        &self,
        cells: IndexMap<String, Binding>,
        executor: Option<Executor>,
        reflect: Arc<Reflect>,
    ) -> LoadResult<()> {
        let mut state = self.lock_uncompiled()?;
        state.kind = ModuleKind::Synthetic(SyntheticModule {
            cells,
            executor,
            reflect,
        });
        Ok(())
    }

    /// Wire one import edge
    pub fn resolve_request(&self, specifier: &str, dependency: ModuleRef) -> LoadResult<()> {
        let mut state = self.state.lock();
        if !state.requested.iter().any(|s| s == specifier) {
            return Err(LoadError::link(
                &self.url,
                format!("module does not request '{}'", specifier),
            ));
        }
        if let Some(existing) = state.resolved.get(specifier) {
            if !Arc::ptr_eq(existing, &dependency) {
                return Err(LoadError::link(
                    &self.url,
                    format!("'{}' is already bound to '{}'", specifier, existing.url()),
                ));
            }
        }
        state.resolved.insert(specifier.to_string(), dependency);
        Ok(())
    }

    /// Whether `specifier` has a wired dependency
    pub fn is_resolved(&self, specifier: &str) -> bool {
        self.state.lock().resolved.contains_key(specifier)
    }

    /// The dependency wired for `specifier`
    pub fn resolved_dependency(&self, specifier: &str) -> Option<ModuleRef> {
        self.state.lock().resolved.get(specifier).cloned()
    }

    /// Wired dependencies in request order
    pub fn dependencies(&self) -> Vec<ModuleRef> {
        self.state.lock().dependencies()
    }

    /// Bind imports to dependency exports
    pub fn instantiate(self: &Arc<Self>) -> LoadResult<()> {
        link::instantiate(self)
    }

    /// Evaluate dependencies, then this module's body. Returns the completion value.
    pub fn evaluate(self: &Arc<Self>) -> LoadResult<Value> {
        link::evaluate(self)
    }

    /// Namespace handle; entries are readable once the record is linked
    pub fn namespace(self: &Arc<Self>) -> Arc<Namespace> {
        self.namespace
            .get_or_init(|| Arc::new(Namespace::new(self.url.clone(), Arc::downgrade(self))))
            .clone()
    }

    pub(crate) fn meta_hook(&self) -> Option<ImportMetaHook> {
        self.meta_hook.clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock()
    }

    /// Move to `Errored`, keeping `error` for later requests
    pub(crate) fn fail(&self, error: LoadError) {
        let mut state = self.state.lock();
        state.status = ModuleStatus::Errored;
        state.exception = Some(error);
    }

    fn ensure_uncompiled(&self) -> LoadResult<()> {
        self.lock_uncompiled().map(drop)
    }

    fn lock_uncompiled(&self) -> LoadResult<MutexGuard<'_, RecordState>> {
        let state = self.state.lock();
        if !matches!(state.kind, ModuleKind::Uncompiled) || state.status != ModuleStatus::Unlinked {
            return Err(LoadError::init(&self.url, "module has already been compiled"));
        }
        Ok(state)
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ModuleRecord")
            .field("url", &self.url)
            .field("status", &state.status)
            .field("requested", &state.requested)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(ModuleStatus::Evaluated.is_terminal());
        assert!(ModuleStatus::Errored.is_terminal());
        assert!(!ModuleStatus::Evaluating.is_terminal());

        assert!(ModuleStatus::Instantiated.is_linked());
        assert!(!ModuleStatus::Errored.is_linked());
        assert!(!ModuleStatus::Unlinked.is_linked());
    }

    #[test]
    fn test_new_record_is_unlinked() {
        let record = ModuleRecord::new("file:///a.js");
        assert_eq!(record.url(), "file:///a.js");
        assert_eq!(record.status(), ModuleStatus::Unlinked);
        assert!(!record.is_compiled());
        assert!(record.requested_specifiers().is_empty());
        assert!(record.exception().is_none());
    }

    #[test]
    fn test_resolve_request_requires_known_specifier() {
        let record = ModuleRecord::new("file:///a.js");
        let dep = ModuleRecord::new("file:///b.js");
        let err = record.resolve_request("./b.js", dep).unwrap_err();
        assert!(matches!(err, LoadError::Link { .. }));
    }

    #[test]
    fn test_lazy_exports_install_once() {
        let record = ModuleRecord::new("node:os");
        record
            .set_lazy_static_exports(vec!["default".into()], Box::new(Vec::new))
            .unwrap();
        assert!(record.is_compiled());

        let again = record.set_lazy_static_exports(vec![], Box::new(Vec::new));
        assert!(matches!(again, Err(LoadError::Init { .. })));
    }
}
