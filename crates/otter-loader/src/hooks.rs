//! Host hooks: fetch, resolve, init and `import.meta`.
//!
//! The loader owns no I/O policy. Everything it needs from the outside
//! world goes through these four hooks; [`LoaderHooks::defaults`] wires up
//! file-system fetching, URL-relative resolution and content-type based
//! initialization.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::trace;
use url::Url;

use crate::builtins::{HostBuiltins, init_host_builtin};
use crate::compiler::SourceCompiler;
use crate::config::LoaderConfig;
use crate::dynamic::{Reflect, create_dynamic_module};
use crate::error::{LoadError, LoadResult};
use crate::record::ModuleRef;
use crate::value::{ObjectRef, Value};

/// Content type the default fetch hook reports for builtin URLs
pub const BUILTIN_CONTENT_TYPE: &str = "application/x-otter-builtin";

/// Future returned by a fetch hook
pub type FetchFuture = BoxFuture<'static, LoadResult<Resource>>;

/// Retrieve the resource at a canonical URL
pub type FetchHook = Arc<dyn Fn(String) -> FetchFuture + Send + Sync>;

/// Map `(specifier, referrer_url)` to a canonical URL
pub type ResolveHook = Arc<dyn Fn(&str, &str) -> LoadResult<String> + Send + Sync>;

/// Prepare a fetched record (compile it, or install synthetic exports)
pub type InitHook =
    Arc<dyn Fn(&ModuleRef, &Resource, &InitContext<'_>) -> LoadResult<()> + Send + Sync>;

/// Decorate a module's `import.meta` object
pub type ImportMetaHook = Arc<dyn Fn(&str, &ObjectRef) + Send + Sync>;

/// A fetched resource
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    bytes: Vec<u8>,
    content_type: String,
}

impl Resource {
    /// Create a resource from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    /// Script source
    pub fn script(source: impl Into<String>) -> Self {
        Self::new(source.into().into_bytes(), "text/javascript")
    }

    /// Marker resource for builtin modules
    pub fn builtin() -> Self {
        Self::new(Vec::new(), BUILTIN_CONTENT_TYPE)
    }

    /// Raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content type, without parameters
    pub fn content_type(&self) -> &str {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Bytes decoded as UTF-8
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// What an init hook can reach besides the record and the resource
pub struct InitContext<'a> {
    pub(crate) compiler: &'a dyn SourceCompiler,
    pub(crate) builtins: &'a HostBuiltins,
    pub(crate) config: &'a LoaderConfig,
}

impl<'a> InitContext<'a> {
    /// Source compiler of the loader
    pub fn compiler(&self) -> &'a dyn SourceCompiler {
        self.compiler
    }

    /// Registered host builtins
    pub fn builtins(&self) -> &'a HostBuiltins {
        self.builtins
    }

    /// Loader configuration
    pub fn config(&self) -> &'a LoaderConfig {
        self.config
    }
}

/// The hook set a loader runs with
#[derive(Clone)]
pub struct LoaderHooks {
    /// Fetch hook
    pub fetch: FetchHook,
    /// Resolve hook
    pub resolve: ResolveHook,
    /// Init hook
    pub init: InitHook,
    /// Optional `import.meta` decorator
    pub import_meta: Option<ImportMetaHook>,
}

impl LoaderHooks {
    /// Default hooks for `config`
    pub fn defaults(config: &LoaderConfig) -> Self {
        Self {
            fetch: default_fetch(config),
            resolve: default_resolve(config),
            init: default_init(),
            import_meta: None,
        }
    }
}

impl fmt::Debug for LoaderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderHooks")
            .field("import_meta", &self.import_meta.is_some())
            .finish_non_exhaustive()
    }
}

/// Guess a content type from a file extension
pub fn content_type_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js" | "mjs" | "cjs") => "text/javascript",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Fetch `file:` URLs from disk; builtin-scheme URLs yield [`Resource::builtin`]
pub fn default_fetch(config: &LoaderConfig) -> FetchHook {
    let scheme = config.builtin_scheme.clone();
    Arc::new(move |url: String| {
        let scheme = scheme.clone();
        async move {
            if url.starts_with(&scheme) {
                return Ok(Resource::builtin());
            }
            let parsed = Url::parse(&url).map_err(|e| LoadError::fetch(&url, e.to_string()))?;
            match parsed.scheme() {
                "file" => {
                    let path = parsed
                        .to_file_path()
                        .map_err(|_| LoadError::fetch(&url, "not a valid file path"))?;
                    trace!(path = %path.display(), "reading module file");
                    let bytes = tokio::fs::read(&path)
                        .await
                        .map_err(|e| LoadError::fetch(&url, e.to_string()))?;
                    Ok(Resource::new(bytes, content_type_for_path(&path)))
                }
                other => Err(LoadError::fetch(
                    &url,
                    format!("unsupported URL scheme '{}'", other),
                )),
            }
        }
        .boxed()
    })
}

/// Resolve relative specifiers against the referrer URL.
///
/// Absolute URLs and builtin-scheme specifiers pass through unchanged. Bare
/// specifiers are rejected.
pub fn default_resolve(config: &LoaderConfig) -> ResolveHook {
    let scheme = config.builtin_scheme.clone();
    Arc::new(move |specifier: &str, referrer: &str| {
        if specifier.starts_with(&scheme) {
            return Ok(specifier.to_string());
        }
        if let Ok(absolute) = Url::parse(specifier) {
            return Ok(absolute.into());
        }
        let relative = specifier.starts_with('/')
            || specifier.starts_with("./")
            || specifier.starts_with("../");
        if !relative {
            return Err(LoadError::resolve(
                specifier,
                referrer,
                "bare specifiers are not supported",
            ));
        }
        let base = Url::parse(referrer)
            .map_err(|e| LoadError::resolve(specifier, referrer, e.to_string()))?;
        base.join(specifier)
            .map(String::from)
            .map_err(|e| LoadError::resolve(specifier, referrer, e.to_string()))
    })
}

/// Initialize by content type: builtins are bridged, scripts compiled, JSON
/// becomes a module with a single `default` export.
pub fn default_init() -> InitHook {
    Arc::new(|record: &ModuleRef, resource: &Resource, cx: &InitContext<'_>| {
        let url = record.url();
        let content_type = resource.content_type();

        if content_type == BUILTIN_CONTENT_TYPE {
            let object = cx
                .builtins()
                .get(url)
                .ok_or_else(|| LoadError::init(url, "no builtin module registered"))?;
            return init_host_builtin(record, &object);
        }

        if cx.config().is_script(content_type) {
            let source = resource
                .text()
                .map_err(|e| LoadError::init(url, e.to_string()))?;
            return record.compile(cx.compiler(), source);
        }

        if cx.config().is_json(content_type) {
            let json: serde_json::Value = serde_json::from_slice(resource.bytes())
                .map_err(|e| LoadError::compile(url, e.to_string()))?;
            let value = Value::from_json(&json);
            create_dynamic_module(
                record,
                &["default"],
                Some(Box::new(move |reflect: &Reflect| {
                    if let Some(export) = reflect.export("default") {
                        export.set(value);
                    }
                    Ok(())
                })),
            )?;
            return Ok(());
        }

        Err(LoadError::init(
            url,
            format!("unsupported content type '{}'", content_type),
        ))
    })
}
