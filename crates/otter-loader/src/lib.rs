//! # Otter Loader
//!
//! Module graph loader for the Otter runtime. Given the canonical URL of an
//! entry module, it discovers the transitive import graph through pluggable
//! host hooks, links every import to the export that owns it, evaluates the
//! graph exactly once, and hands back the entry's namespace.
//!
//! - Fetches run concurrently; everything else happens on the task driving
//!   the load
//! - Finished modules are cached per loader, errors included: a module that
//!   threw once rethrows the identical exception on every later import
//! - Host code can define modules with settable exports
//!   ([`create_dynamic_module`]) and expose host objects as builtins
//!   ([`init_host_builtin`])
//!
//! # Example
//!
//! ```no_run
//! use otter_loader::{Loader, Resource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), otter_loader::LoadError> {
//!     let loader = Loader::builder()
//!         .fetch(|url: String| async move {
//!             Ok(Resource::script(format!("export default {:?};", url)))
//!         })
//!         .build();
//!
//!     let ns = loader.import_from_resolved_url("file:///main.js").await?;
//!     println!("{:?}", ns.get("default"));
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod binding;
pub mod builtins;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod hooks;
mod job;
mod link;
pub mod loader;
pub mod namespace;
pub mod record;
pub mod script;
mod task_group;
pub mod value;

pub use binding::Binding;
pub use builtins::{HostBuiltins, init_host_builtin};
pub use cache::{ModuleCache, ModuleInfo};
pub use compiler::{
    CompiledModule, ExportEntry, ImportEntry, ImportName, ModuleBody, ModuleScope, SourceCompiler,
};
pub use config::LoaderConfig;
pub use dynamic::{DynamicModule, Executor, Reflect, ReflectiveExport, create_dynamic_module};
pub use error::{LoadError, LoadResult};
pub use hooks::{
    BUILTIN_CONTENT_TYPE, FetchFuture, FetchHook, ImportMetaHook, InitContext, InitHook,
    LoaderHooks, ResolveHook, Resource, default_fetch, default_init, default_resolve,
};
pub use loader::{Loader, LoaderBuilder};
pub use namespace::Namespace;
pub use record::{LazyExports, ModuleRecord, ModuleRef, ModuleStatus};
pub use script::ScriptCompiler;
pub use task_group::InFlightPolicy;
pub use value::{ErrorObject, JsObject, NativeFunction, ObjectRef, Value};
