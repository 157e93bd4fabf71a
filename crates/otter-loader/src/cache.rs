//! Per-loader module cache.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::hooks::ImportMetaHook;
use crate::record::{ModuleRecord, ModuleRef, ModuleStatus};

/// Summary of one cached record, for tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Canonical URL
    pub url: String,
    /// Current status
    pub status: ModuleStatus,
    /// URLs of wired dependencies, in request order
    pub dependencies: Vec<String>,
}

/// Canonical URL to record map. At most one record exists per URL.
pub struct ModuleCache {
    modules: Mutex<IndexMap<String, ModuleRef>>,
    meta_hook: Option<ImportMetaHook>,
}

impl ModuleCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::with_meta_hook(None)
    }

    pub(crate) fn with_meta_hook(meta_hook: Option<ImportMetaHook>) -> Self {
        Self {
            modules: Mutex::new(IndexMap::new()),
            meta_hook,
        }
    }

    /// Existing record for `url`, or a fresh unlinked one
    pub fn get_or_create(&self, url: &str) -> ModuleRef {
        let mut modules = self.modules.lock();
        if let Some(record) = modules.get(url) {
            return record.clone();
        }
        let record = ModuleRecord::with_meta_hook(url, self.meta_hook.clone());
        modules.insert(url.to_string(), record.clone());
        record
    }

    /// Record for `url`, if any
    pub fn get(&self, url: &str) -> Option<ModuleRef> {
        self.modules.lock().get(url).cloned()
    }

    /// Check if `url` has a record
    pub fn contains(&self, url: &str) -> bool {
        self.modules.lock().contains_key(url)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.modules.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.modules.lock().is_empty()
    }

    /// Cached URLs in creation order
    pub fn urls(&self) -> Vec<String> {
        self.modules.lock().keys().cloned().collect()
    }

    /// Status and edges of every record, in creation order
    pub fn snapshot(&self) -> Vec<ModuleInfo> {
        let records: Vec<ModuleRef> = self.modules.lock().values().cloned().collect();
        records
            .iter()
            .map(|record| ModuleInfo {
                url: record.url().to_string(),
                status: record.status(),
                dependencies: record
                    .dependencies()
                    .iter()
                    .map(|d| d.url().to_string())
                    .collect(),
            })
            .collect()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("urls", &self.urls())
            .finish()
    }
}
