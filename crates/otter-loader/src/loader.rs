//! Loader facade.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use tracing::{Instrument, Span};

use crate::builtins::HostBuiltins;
use crate::cache::ModuleCache;
use crate::compiler::SourceCompiler;
use crate::config::LoaderConfig;
use crate::error::LoadResult;
use crate::hooks::{FetchHook, ImportMetaHook, InitContext, InitHook, LoaderHooks, Resource, ResolveHook};
use crate::job;
use crate::namespace::Namespace;
use crate::record::ModuleRef;
use crate::script::ScriptCompiler;
use crate::value::ObjectRef;

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct LoaderShared {
    pub(crate) id: u64,
    pub(crate) config: LoaderConfig,
    pub(crate) hooks: LoaderHooks,
    pub(crate) cache: ModuleCache,
    pub(crate) builtins: HostBuiltins,
    pub(crate) compiler: Arc<dyn SourceCompiler>,
    pub(crate) span: Span,
}

/// Module loader.
///
/// Cloning is cheap and clones share the cache, hooks and builtins. Must be
/// driven from inside a Tokio runtime: fetches are spawned tasks.
#[derive(Clone)]
pub struct Loader {
    shared: Arc<LoaderShared>,
}

impl Loader {
    /// Loader with default hooks and the built-in script compiler
    pub fn new() -> Self {
        LoaderBuilder::new().build()
    }

    /// Start configuring a loader
    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    /// Load, link and evaluate the module at `url`, returning its namespace.
    ///
    /// `url` must already be canonical; it is not passed through the resolve
    /// hook. Repeated calls for a finished module return the same namespace,
    /// or the same error if it failed.
    pub async fn import_from_resolved_url(&self, url: &str) -> LoadResult<Arc<Namespace>> {
        let record = self.load(url).await?;
        Ok(record.namespace())
    }

    /// Like [`Loader::import_from_resolved_url`], returning the record
    pub async fn load(&self, url: &str) -> LoadResult<ModuleRef> {
        job::load_module(&self.shared, url)
            .instrument(self.shared.span.clone())
            .await
    }

    /// The module cache
    pub fn cache(&self) -> &ModuleCache {
        &self.shared.cache
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.shared.config
    }

    /// Registered host builtins
    pub fn builtins(&self) -> &HostBuiltins {
        &self.shared.builtins
    }

    /// Process-unique loader id
    pub fn id(&self) -> u64 {
        self.shared.id
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("id", &self.shared.id)
            .field("name", &self.shared.config.name)
            .field("modules", &self.shared.cache.len())
            .finish()
    }
}

/// Builder for [`Loader`]. Hooks left unset use the defaults.
#[derive(Default)]
pub struct LoaderBuilder {
    config: LoaderConfig,
    fetch: Option<FetchHook>,
    resolve: Option<ResolveHook>,
    init: Option<InitHook>,
    import_meta: Option<ImportMetaHook>,
    builtins: HostBuiltins,
    compiler: Option<Arc<dyn SourceCompiler>>,
    span: Option<Span>,
}

impl LoaderBuilder {
    /// New builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the fetch hook
    pub fn fetch<F, Fut>(mut self, fetch: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<Resource>> + Send + 'static,
    {
        self.fetch = Some(Arc::new(move |url| fetch(url).boxed()));
        self
    }

    /// Set the resolve hook
    pub fn resolve<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&str, &str) -> LoadResult<String> + Send + Sync + 'static,
    {
        self.resolve = Some(Arc::new(resolve));
        self
    }

    /// Set the init hook
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&ModuleRef, &Resource, &InitContext<'_>) -> LoadResult<()> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    /// Set the `import.meta` decorator
    pub fn import_meta<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &ObjectRef) + Send + Sync + 'static,
    {
        self.import_meta = Some(Arc::new(hook));
        self
    }

    /// Register a host builtin module
    pub fn builtin(self, url: impl Into<String>, object: ObjectRef) -> Self {
        self.builtins.register(url, object);
        self
    }

    /// Replace the source compiler
    pub fn compiler(mut self, compiler: Arc<dyn SourceCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Parent span for the loader's logging
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the loader
    pub fn build(self) -> Loader {
        let id = NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed);
        let defaults = LoaderHooks::defaults(&self.config);
        let hooks = LoaderHooks {
            fetch: self.fetch.unwrap_or(defaults.fetch),
            resolve: self.resolve.unwrap_or(defaults.resolve),
            init: self.init.unwrap_or(defaults.init),
            import_meta: self.import_meta,
        };
        let span = match self.span {
            Some(parent) => tracing::debug_span!(parent: &parent, "otter_loader", id, name = %self.config.name),
            None => tracing::debug_span!("otter_loader", id, name = %self.config.name),
        };

        Loader {
            shared: Arc::new(LoaderShared {
                id,
                cache: ModuleCache::with_meta_hook(hooks.import_meta.clone()),
                hooks,
                builtins: self.builtins,
                compiler: self.compiler.unwrap_or_else(|| Arc::new(ScriptCompiler::new())),
                span,
                config: self.config,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_ids_are_unique() {
        let a = Loader::new();
        let b = Loader::new();
        assert_ne!(a.id(), b.id());
        assert!(a.cache().is_empty());
    }
}
