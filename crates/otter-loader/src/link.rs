//! Linking and evaluation of module records.
//!
//! Instantiation binds every import of a record to the export slot of the
//! module that ultimately owns it, following re-exports and `export *`.
//! Evaluation walks dependencies depth-first in request order and runs each
//! body at most once; a record already `Evaluating` is a cycle back-edge and
//! is not re-entered.
//!
//! Record locks are only held for bookkeeping. Bodies, executors and host
//! thunks always run unlocked so they can read other modules' namespaces.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::binding::Binding;
use crate::compiler::{ExportEntry, ImportEntry, ImportName, ModuleBody, ModuleScope};
use crate::dynamic::{Executor, Reflect};
use crate::error::{LoadError, LoadResult};
use crate::record::{LazyExports, ModuleKind, ModuleRef, ModuleStatus};
use crate::value::Value;

/// Outcome of looking up an export through the link graph
#[derive(Debug)]
pub(crate) enum Resolution {
    Found(Binding),
    NotFound,
    Ambiguous,
    Circular,
}

enum Lookup {
    Done(Resolution),
    Named(ModuleRef, String),
    Namespace(ModuleRef),
    Stars(Vec<ModuleRef>),
}

fn dependency(
    url: &str,
    resolved: &HashMap<String, ModuleRef>,
    specifier: &str,
) -> LoadResult<ModuleRef> {
    resolved.get(specifier).cloned().ok_or_else(|| {
        LoadError::link(url, format!("import '{}' has not been resolved", specifier))
    })
}

/// Find the slot that backs export `name` of `record`.
///
/// `visited` holds `(url, name)` pairs seen during this lookup; revisiting
/// one means the re-export chain loops.
pub(crate) fn resolve_export(
    record: &ModuleRef,
    name: &str,
    visited: &mut Vec<(String, String)>,
) -> LoadResult<Resolution> {
    if visited.iter().any(|(u, n)| u == record.url() && n == name) {
        return Ok(Resolution::Circular);
    }
    visited.push((record.url().to_string(), name.to_string()));

    let lookup = {
        let state = record.lock();
        let url = record.url();
        match &state.kind {
            ModuleKind::Uncompiled => {
                return Err(LoadError::link(url, "module has not been compiled"));
            }
            ModuleKind::Synthetic(synthetic) => Lookup::Done(found_or_missing(synthetic.cells.get(name))),
            ModuleKind::Host(host) => Lookup::Done(found_or_missing(host.cells.get(name))),
            ModuleKind::Source(source) => {
                match source.exports.iter().find(|e| e.export_name() == Some(name)) {
                    Some(ExportEntry::Local { local_name, .. }) => {
                        if let Some(cell) = source.cells.get(local_name) {
                            Lookup::Done(Resolution::Found(cell.clone()))
                        } else {
                            let import = source
                                .imports
                                .iter()
                                .find(|i| &i.local_name == local_name)
                                .ok_or_else(|| {
                                    LoadError::link(
                                        url,
                                        format!("export '{}' refers to an undeclared binding", name),
                                    )
                                })?;
                            let dep = dependency(url, &state.resolved, &import.specifier)?;
                            match &import.import_name {
                                ImportName::Named(n) => Lookup::Named(dep, n.clone()),
                                ImportName::Namespace => Lookup::Namespace(dep),
                            }
                        }
                    }
                    Some(ExportEntry::Indirect {
                        specifier,
                        import_name,
                        ..
                    }) => {
                        let dep = dependency(url, &state.resolved, specifier)?;
                        match import_name {
                            ImportName::Named(n) => Lookup::Named(dep, n.clone()),
                            ImportName::Namespace => Lookup::Namespace(dep),
                        }
                    }
                    Some(ExportEntry::Star { .. }) => Lookup::Done(Resolution::NotFound),
                    None if name == "default" => Lookup::Done(Resolution::NotFound),
                    None => {
                        let mut stars = Vec::new();
                        for export in &source.exports {
                            if let ExportEntry::Star { specifier } = export {
                                stars.push(dependency(url, &state.resolved, specifier)?);
                            }
                        }
                        Lookup::Stars(stars)
                    }
                }
            }
        }
    };

    match lookup {
        Lookup::Done(resolution) => Ok(resolution),
        Lookup::Named(dep, import_name) => resolve_export(&dep, &import_name, visited),
        Lookup::Namespace(dep) => Ok(Resolution::Found(Binding::with_value(Value::Namespace(
            dep.namespace(),
        )))),
        Lookup::Stars(deps) => {
            let mut found: Option<Binding> = None;
            for dep in deps {
                match resolve_export(&dep, name, visited)? {
                    Resolution::Found(binding) => match &found {
                        Some(existing) if !existing.ptr_eq(&binding) => {
                            return Ok(Resolution::Ambiguous);
                        }
                        Some(_) => {}
                        None => found = Some(binding),
                    },
                    Resolution::Ambiguous => return Ok(Resolution::Ambiguous),
                    Resolution::NotFound | Resolution::Circular => {}
                }
            }
            Ok(found.map_or(Resolution::NotFound, Resolution::Found))
        }
    }
}

fn found_or_missing(cell: Option<&Binding>) -> Resolution {
    cell.cloned().map_or(Resolution::NotFound, Resolution::Found)
}

/// All names `record` exports, star exports included (minus `default`)
pub(crate) fn exported_names(record: &ModuleRef, visited: &mut HashSet<String>) -> Vec<String> {
    if !visited.insert(record.url().to_string()) {
        return Vec::new();
    }

    let (mut names, stars) = {
        let state = record.lock();
        match &state.kind {
            ModuleKind::Uncompiled => return Vec::new(),
            ModuleKind::Synthetic(s) => return s.cells.keys().cloned().collect(),
            ModuleKind::Host(h) => return h.cells.keys().cloned().collect(),
            ModuleKind::Source(source) => {
                let names: Vec<String> = source
                    .exports
                    .iter()
                    .filter_map(|e| e.export_name().map(str::to_string))
                    .collect();
                let stars: Vec<ModuleRef> = source
                    .exports
                    .iter()
                    .filter_map(|e| match e {
                        ExportEntry::Star { specifier } => state.resolved.get(specifier).cloned(),
                        _ => None,
                    })
                    .collect();
                (names, stars)
            }
        }
    };

    for dep in stars {
        for name in exported_names(&dep, visited) {
            if name != "default" && !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Resolved slots for every unambiguous export of `record`
pub(crate) fn namespace_bindings(record: &ModuleRef) -> BTreeMap<String, Binding> {
    let mut bindings = BTreeMap::new();
    for name in exported_names(record, &mut HashSet::new()) {
        match resolve_export(record, &name, &mut Vec::new()) {
            Ok(Resolution::Found(binding)) => {
                bindings.insert(name, binding);
            }
            Ok(other) => trace!(url = record.url(), name = %name, ?other, "export left out of namespace"),
            Err(e) => trace!(url = record.url(), name = %name, error = %e, "export left out of namespace"),
        }
    }
    bindings
}

enum Plan {
    Source {
        imports: Vec<ImportEntry>,
        indirect: Vec<String>,
        exports: HashMap<String, Binding>,
        resolved: HashMap<String, ModuleRef>,
    },
    Static,
}

/// Bind the imports of `record`.
///
/// Records that are already linked, in progress, or terminal are left as
/// they are. On failure the record becomes `Errored` and keeps the error.
pub(crate) fn instantiate(record: &ModuleRef) -> LoadResult<()> {
    let plan = {
        let mut state = record.lock();
        if state.status != ModuleStatus::Unlinked {
            return Ok(());
        }
        let plan = match &state.kind {
            ModuleKind::Uncompiled => {
                return Err(LoadError::link(record.url(), "module has not been compiled"));
            }
            ModuleKind::Source(source) => Plan::Source {
                imports: source.imports.clone(),
                indirect: source
                    .exports
                    .iter()
                    .filter_map(|e| match e {
                        ExportEntry::Indirect {
                            export_name,
                            import_name: ImportName::Named(_),
                            ..
                        } => Some(export_name.clone()),
                        _ => None,
                    })
                    .collect(),
                exports: source.cells.clone(),
                resolved: state.resolved.clone(),
            },
            ModuleKind::Synthetic(_) | ModuleKind::Host(_) => Plan::Static,
        };
        state.status = ModuleStatus::Instantiating;
        plan
    };

    let scope = match plan {
        Plan::Static => None,
        Plan::Source {
            imports,
            indirect,
            exports,
            resolved,
        } => match bind_imports(record, &imports, &indirect, &resolved) {
            Ok(imports) => Some(Arc::new(ModuleScope::new(
                record.url().to_string(),
                imports,
                exports,
                record.meta_hook(),
            ))),
            Err(e) => {
                debug!(url = record.url(), error = %e, "instantiate failed");
                record.fail(e.clone());
                return Err(e);
            }
        },
    };

    {
        let mut state = record.lock();
        state.scope = scope;
        state.status = ModuleStatus::Instantiated;
    }
    record.namespace().publish(record);
    trace!(url = record.url(), "instantiated");
    Ok(())
}

fn bind_imports(
    record: &ModuleRef,
    imports: &[ImportEntry],
    indirect: &[String],
    resolved: &HashMap<String, ModuleRef>,
) -> LoadResult<HashMap<String, Binding>> {
    let url = record.url();
    let mut bound = HashMap::with_capacity(imports.len());

    for import in imports {
        let dep = dependency(url, resolved, &import.specifier)?;
        let binding = match &import.import_name {
            ImportName::Namespace => Binding::with_value(Value::Namespace(dep.namespace())),
            ImportName::Named(name) => {
                let resolution = resolve_export(&dep, name, &mut Vec::new())?;
                expect_found(url, &import.specifier, name, resolution)?
            }
        };
        bound.insert(import.local_name.clone(), binding);
    }

    for export_name in indirect {
        let resolution = resolve_export(record, export_name, &mut Vec::new())?;
        expect_found(url, url, export_name, resolution)?;
    }

    Ok(bound)
}

fn expect_found(url: &str, specifier: &str, name: &str, resolution: Resolution) -> LoadResult<Binding> {
    match resolution {
        Resolution::Found(binding) => Ok(binding),
        Resolution::NotFound => Err(LoadError::link(
            url,
            format!(
                "The requested module '{}' does not provide an export named '{}'",
                specifier, name
            ),
        )),
        Resolution::Ambiguous => Err(LoadError::link(
            url,
            format!(
                "The requested module '{}' contains conflicting star exports for name '{}'",
                specifier, name
            ),
        )),
        Resolution::Circular => Err(LoadError::link(
            url,
            format!("Detected cycle while resolving name '{}' in '{}'", name, specifier),
        )),
    }
}

enum Runner {
    Body(Arc<dyn ModuleBody>, Option<Arc<ModuleScope>>),
    Executor(Option<Executor>, Arc<Reflect>),
    Host(Option<LazyExports>, Vec<(String, Binding)>),
}

/// Evaluate `record` after its dependencies.
///
/// Returns the body's completion value. A record that is evaluated or
/// currently evaluating yields `undefined`; an errored record yields its
/// stored error.
pub(crate) fn evaluate(record: &ModuleRef) -> LoadResult<Value> {
    let deps = {
        let mut state = record.lock();
        match state.status {
            ModuleStatus::Evaluated | ModuleStatus::Evaluating => return Ok(Value::Undefined),
            ModuleStatus::Errored => {
                return Err(state.exception.clone().unwrap_or_else(|| {
                    LoadError::internal(format!("module '{}' errored without an error", record.url()))
                }));
            }
            ModuleStatus::Unlinked | ModuleStatus::Instantiating => {
                return Err(LoadError::link(record.url(), "module is not linked"));
            }
            ModuleStatus::Instantiated => {}
        }
        state.status = ModuleStatus::Evaluating;
        state.dependencies()
    };

    for dep in deps {
        if let Err(e) = evaluate(&dep) {
            record.fail(e.clone());
            return Err(e);
        }
    }

    let runner = {
        let mut state = record.lock();
        let scope = state.scope.clone();
        match &mut state.kind {
            ModuleKind::Source(source) => Runner::Body(source.body.clone(), scope),
            ModuleKind::Synthetic(synthetic) => {
                Runner::Executor(synthetic.executor.take(), synthetic.reflect.clone())
            }
            ModuleKind::Host(host) => Runner::Host(
                host.thunk.take(),
                host.cells.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ),
            ModuleKind::Uncompiled => Runner::Host(None, Vec::new()),
        }
    };

    debug!(url = record.url(), "eval");
    let outcome = match runner {
        Runner::Body(body, Some(scope)) => body.evaluate(&scope),
        Runner::Body(_, None) => {
            let e = LoadError::internal(format!("module '{}' has no scope", record.url()));
            record.fail(e.clone());
            return Err(e);
        }
        Runner::Executor(executor, reflect) => match executor {
            Some(executor) => executor(&reflect).map(|()| Value::Undefined),
            None => Ok(Value::Undefined),
        },
        Runner::Host(thunk, cells) => {
            if let Some(thunk) = thunk {
                let values: HashMap<String, Value> = thunk().into_iter().collect();
                for (name, cell) in &cells {
                    if let Some(value) = values.get(name) {
                        cell.set(value.clone());
                    }
                }
            }
            Ok(Value::Undefined)
        }
    };

    match outcome {
        Ok(completion) => {
            record.lock().status = ModuleStatus::Evaluated;
            Ok(completion)
        }
        Err(exception) => {
            let e = LoadError::Evaluation {
                url: record.url().to_string(),
                exception,
            };
            debug!(url = record.url(), error = %e, "evaluation threw");
            record.fail(e.clone());
            Err(e)
        }
    }
}
