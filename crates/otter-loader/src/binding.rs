//! Live export bindings.
//!
//! A [`Binding`] is one mutable slot shared between the module that owns an
//! export and every importer of it. Linking aliases importers to the owner's
//! slot, so writes are observed everywhere without copying.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::Value;

/// Shared, mutable export slot. `None` means not yet initialized.
#[derive(Clone, Default)]
pub struct Binding(Arc<RwLock<Option<Value>>>);

impl Binding {
    /// Create an uninitialized binding
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a binding holding `value`
    pub fn with_value(value: Value) -> Self {
        Self(Arc::new(RwLock::new(Some(value))))
    }

    /// Current value, `None` while uninitialized
    pub fn get(&self) -> Option<Value> {
        self.0.read().clone()
    }

    /// Store a value
    pub fn set(&self, value: Value) {
        *self.0.write() = Some(value);
    }

    /// Whether a value has been stored
    pub fn is_initialized(&self) -> bool {
        self.0.read().is_some()
    }

    /// Whether both handles point at the same slot
    pub fn ptr_eq(&self, other: &Binding) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => write!(f, "Binding({:?})", value),
            None => write!(f, "Binding(<uninitialized>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliased_binding_is_live() {
        let owner = Binding::new();
        let importer = owner.clone();
        assert!(!importer.is_initialized());

        owner.set(Value::from(1));
        assert_eq!(importer.get(), Some(Value::from(1)));
        assert!(owner.ptr_eq(&importer));
        assert!(!owner.ptr_eq(&Binding::with_value(Value::from(1))));
    }
}
