//! Host-defined modules with settable exports.
//!
//! [`create_dynamic_module`] turns an uncompiled record into a module whose
//! exports are plain cells the host writes through a [`Reflect`] handle.
//! Importers see those cells live, exactly like exports of a source module.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::binding::Binding;
use crate::error::{LoadError, LoadResult};
use crate::namespace::Namespace;
use crate::record::ModuleRef;
use crate::value::Value;

/// Runs once as the module body when the record is evaluated.
/// `Err` is the thrown value.
pub type Executor = Box<dyn FnOnce(&Reflect) -> Result<(), Value> + Send>;

/// Accessor pair for one export
#[derive(Clone)]
pub struct ReflectiveExport {
    name: String,
    cell: Binding,
}

impl ReflectiveExport {
    /// Export name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value
    pub fn get(&self) -> Value {
        self.cell.get().unwrap_or_default()
    }

    /// Replace the value; importers observe the new value
    pub fn set(&self, value: impl Into<Value>) {
        self.cell.set(value.into());
    }

    /// Underlying slot
    pub fn binding(&self) -> &Binding {
        &self.cell
    }
}

impl fmt::Debug for ReflectiveExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectiveExport")
            .field("name", &self.name)
            .field("value", &self.get())
            .finish()
    }
}

/// Host handle to a dynamic module's exports
pub struct Reflect {
    exports: IndexMap<String, ReflectiveExport>,
    namespace: Arc<Namespace>,
}

impl Reflect {
    /// Accessors keyed by export name, in declaration order
    pub fn exports(&self) -> &IndexMap<String, ReflectiveExport> {
        &self.exports
    }

    /// Accessor for one export
    pub fn export(&self, name: &str) -> Option<&ReflectiveExport> {
        self.exports.get(name)
    }

    /// Namespace of the module
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }
}

impl fmt::Debug for Reflect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflect")
            .field("url", &self.namespace.url())
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Result of [`create_dynamic_module`]
#[derive(Debug, Clone)]
pub struct DynamicModule {
    /// The initialized target record
    pub record: ModuleRef,
    /// Accessors for its exports
    pub reflect: Arc<Reflect>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Give `target` exactly the exports in `export_names`.
///
/// Every export starts out `undefined`. `evaluate`, when given, runs once
/// with the [`Reflect`] handle when the record is evaluated; without it,
/// evaluation does nothing. The target is instantiated before returning, so
/// it can be wired as a dependency right away.
pub fn create_dynamic_module<S: AsRef<str>>(
    target: &ModuleRef,
    export_names: &[S],
    evaluate: Option<Executor>,
) -> LoadResult<DynamicModule> {
    let url = target.url();
    let mut exports: IndexMap<String, ReflectiveExport> = IndexMap::with_capacity(export_names.len());
    for name in export_names.iter().map(AsRef::as_ref) {
        if !is_identifier(name) {
            return Err(LoadError::init(
                url,
                format!("'{}' is not a valid export name", name),
            ));
        }
        if exports.contains_key(name) {
            return Err(LoadError::init(url, format!("duplicate export name '{}'", name)));
        }
        exports.insert(
            name.to_string(),
            ReflectiveExport {
                name: name.to_string(),
                cell: Binding::with_value(Value::Undefined),
            },
        );
    }

    debug!(
        url,
        exports = ?exports.keys().collect::<Vec<_>>(),
        "creating dynamic module"
    );

    let cells = exports
        .iter()
        .map(|(name, export)| (name.clone(), export.cell.clone()))
        .collect();
    let reflect = Arc::new(Reflect {
        exports,
        namespace: target.namespace(),
    });

    target.install_synthetic(cells, evaluate, reflect.clone())?;
    target.instantiate()?;

    Ok(DynamicModule {
        record: target.clone(),
        reflect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ModuleRecord, ModuleStatus};

    #[test]
    fn test_identifier_validation() {
        assert!(is_identifier("x"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("$el2"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let target = ModuleRecord::new("virtual:dup");
        let err = create_dynamic_module(&target, &["x", "x"], None).unwrap_err();
        assert!(matches!(err, LoadError::Init { .. }));
        assert!(!target.is_compiled());
    }

    #[test]
    fn test_exports_start_undefined_and_are_live() {
        let target = ModuleRecord::new("virtual:live");
        let module = create_dynamic_module(&target, &["x", "y"], None).unwrap();
        assert_eq!(target.status(), ModuleStatus::Instantiated);

        let ns = target.namespace();
        assert_eq!(ns.keys(), vec!["x", "y"]);
        assert_eq!(ns.get("x"), Some(Value::Undefined));

        module.reflect.export("x").unwrap().set(7);
        assert_eq!(ns.get("x"), Some(Value::from(7)));
    }

    #[test]
    fn test_executor_runs_on_evaluate() {
        let target = ModuleRecord::new("virtual:exec");
        let module = create_dynamic_module(
            &target,
            &["answer"],
            Some(Box::new(|reflect: &Reflect| {
                reflect.export("answer").unwrap().set(42);
                Ok(())
            })),
        )
        .unwrap();

        assert_eq!(module.reflect.export("answer").unwrap().get(), Value::Undefined);
        target.evaluate().unwrap();
        assert_eq!(module.reflect.export("answer").unwrap().get(), Value::from(42));
        assert_eq!(target.status(), ModuleStatus::Evaluated);
    }

    #[test]
    fn test_compiled_target_is_rejected() {
        let target = ModuleRecord::new("virtual:twice");
        create_dynamic_module(&target, &["a"], None).unwrap();
        assert!(create_dynamic_module(&target, &["b"], None).is_err());
    }
}
