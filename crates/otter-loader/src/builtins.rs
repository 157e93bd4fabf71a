//! Host builtin modules (`node:fs`, `node:process`, ...).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::LoadResult;
use crate::record::ModuleRef;
use crate::value::{ObjectRef, Value};

/// Registry of host objects exposed as modules, keyed by URL
#[derive(Clone, Default)]
pub struct HostBuiltins {
    objects: Arc<RwLock<HashMap<String, ObjectRef>>>,
}

impl HostBuiltins {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `object` as the module at `url`
    pub fn register(&self, url: impl Into<String>, object: ObjectRef) {
        self.objects.write().insert(url.into(), object);
    }

    /// Object registered for `url`
    pub fn get(&self, url: &str) -> Option<ObjectRef> {
        self.objects.read().get(url).cloned()
    }

    /// Whether `url` is registered
    pub fn contains(&self, url: &str) -> bool {
        self.objects.read().contains_key(url)
    }

    /// Registered URLs, sorted
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.objects.read().keys().cloned().collect();
        urls.sort();
        urls
    }
}

impl std::fmt::Debug for HostBuiltins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBuiltins")
            .field("urls", &self.urls())
            .finish()
    }
}

/// Expose `object` through `record`.
///
/// Each own property becomes a named export and `default` is the object
/// itself, so `import fs from "node:fs"` and `import { readFile } from
/// "node:fs"` see the same values. Values are read from the object when the
/// record is first evaluated.
pub fn init_host_builtin(record: &ModuleRef, object: &ObjectRef) -> LoadResult<()> {
    let mut names = object.keys();
    if !names.iter().any(|n| n == "default") {
        names.push("default".to_string());
    }
    trace!(url = record.url(), exports = names.len(), "bridging host builtin");

    let object = object.clone();
    record.set_lazy_static_exports(
        names,
        Box::new(move || {
            let mut entries = object.entries();
            entries.retain(|(name, _)| name != "default");
            entries.push(("default".to_string(), Value::Object(object)));
            entries
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ModuleRecord;
    use crate::value::JsObject;

    #[test]
    fn test_builtin_exports_alias_object_properties() {
        let read_file = Value::function("readFile", |_| Ok(Value::Undefined));
        let fs = JsObject::from_entries([("readFile", read_file.clone())]);

        let record = ModuleRecord::new("node:fs");
        init_host_builtin(&record, &fs).unwrap();
        record.instantiate().unwrap();

        let ns = record.namespace();
        assert_eq!(ns.keys(), vec!["default", "readFile"]);
        assert_eq!(ns.get("readFile"), None);

        record.evaluate().unwrap();
        assert_eq!(ns.get("readFile"), Some(read_file.clone()));
        let default = ns.get("default").unwrap();
        assert_eq!(default, Value::Object(fs));
        assert_eq!(default.get_property("readFile"), read_file);
    }

    #[test]
    fn test_registry_lookup() {
        let builtins = HostBuiltins::new();
        builtins.register("node:os", JsObject::new());
        assert!(builtins.contains("node:os"));
        assert!(builtins.get("node:path").is_none());
        assert_eq!(builtins.urls(), vec!["node:os"]);
    }
}
