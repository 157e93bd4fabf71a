//! Module namespace objects.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{OnceLock, Weak};

use crate::binding::Binding;
use crate::link;
use crate::record::{ModuleRecord, ModuleRef};
use crate::value::{self, Value};

/// Read-only view of a module's exports.
///
/// Entries are live: each one aliases the export slot that owns the value.
/// The export set is computed from the record's link graph and fixed when
/// the record is instantiated, so a published namespace stays readable after
/// its loader and record are gone.
pub struct Namespace {
    url: String,
    record: Weak<ModuleRecord>,
    bindings: OnceLock<BTreeMap<String, Binding>>,
}

impl Namespace {
    pub(crate) fn new(url: String, record: Weak<ModuleRecord>) -> Self {
        Self {
            url,
            record,
            bindings: OnceLock::new(),
        }
    }

    /// Fix the export set of a linked record
    pub(crate) fn publish(&self, record: &ModuleRef) {
        self.bindings.get_or_init(|| link::namespace_bindings(record));
    }

    /// URL of the module
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current value of an export. Uninitialized or missing exports read as `None`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.with_bindings(|b| b.get(name).and_then(Binding::get))
    }

    /// Slot backing an export
    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.with_bindings(|b| b.get(name).cloned())
    }

    /// Whether the module exports `name`
    pub fn has(&self, name: &str) -> bool {
        self.with_bindings(|b| b.contains_key(name))
    }

    /// Export names, sorted
    pub fn keys(&self) -> Vec<String> {
        self.with_bindings(|b| b.keys().cloned().collect())
    }

    /// Initialized exports, sorted by name
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.with_bindings(|b| {
            b.iter()
                .filter_map(|(name, slot)| slot.get().map(|v| (name.clone(), v)))
                .collect()
        })
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.with_bindings(BTreeMap::len)
    }

    /// Whether the module has no exports
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON object of initialized exports. A namespace reachable from its
    /// own exports is written as `"[Circular]"`.
    pub fn to_json(&self) -> serde_json::Value {
        value::nested(&mut Vec::new(), self as *const Self as usize, |ancestors| {
            self.to_json_within(ancestors)
        })
    }

    pub(crate) fn to_json_within(&self, ancestors: &mut Vec<usize>) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries()
                .into_iter()
                .map(|(k, v)| (k, v.to_json_within(ancestors)))
                .collect(),
        )
    }

    fn with_bindings<R>(&self, f: impl FnOnce(&BTreeMap<String, Binding>) -> R) -> R {
        if let Some(bindings) = self.bindings.get() {
            return f(bindings);
        }
        let Some(record) = self.record.upgrade() else {
            return f(&BTreeMap::new());
        };

        let bindings = link::namespace_bindings(&record);
        if record.status().is_linked() {
            f(self.bindings.get_or_init(|| bindings))
        } else {
            f(&bindings)
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("url", &self.url)
            .field("keys", &self.keys())
            .finish()
    }
}
