//! Load jobs: graph discovery driven by a single task.
//!
//! A job owns the set of records it has seen and a group of in-flight
//! fetches. Fetch results are handled one at a time on the driving task:
//! init, then resolve every requested specifier, then discover the new
//! dependencies. Once nothing is outstanding the job instantiates every
//! discovered record and evaluates the entry.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{Instrument, debug, debug_span, trace};

use crate::error::{LoadError, LoadResult};
use crate::hooks::{InitContext, Resource};
use crate::loader::LoaderShared;
use crate::record::{ModuleRef, ModuleStatus};
use crate::task_group::TaskGroup;

struct Fetched {
    record: ModuleRef,
    resource: Resource,
}

/// Load, link and evaluate the module graph rooted at `url`.
///
/// An entry that already finished is answered from the cache: an evaluated
/// record is returned as is, an errored one rethrows its stored error.
pub(crate) async fn load_module(shared: &Arc<LoaderShared>, url: &str) -> LoadResult<ModuleRef> {
    let existing = shared.cache.get(url);
    if let Some(record) = &existing {
        match record.status() {
            ModuleStatus::Evaluated => {
                trace!(url, "cache hit");
                return Ok(record.clone());
            }
            ModuleStatus::Errored => {
                trace!(url, "cache hit (errored)");
                return Err(record.exception().unwrap_or_else(|| {
                    LoadError::internal(format!("module '{}' errored without an error", url))
                }));
            }
            _ => {}
        }
    }

    let entry = existing.unwrap_or_else(|| shared.cache.get_or_create(url));
    LoadJob::new(shared.clone()).run(entry).await
}

pub(crate) struct LoadJob {
    shared: Arc<LoaderShared>,
    visited: IndexMap<String, ModuleRef>,
    fetches: TaskGroup<Fetched>,
}

impl LoadJob {
    pub(crate) fn new(shared: Arc<LoaderShared>) -> Self {
        let policy = shared.config.in_flight;
        Self {
            shared,
            visited: IndexMap::new(),
            fetches: TaskGroup::new(policy),
        }
    }

    pub(crate) async fn run(mut self, entry: ModuleRef) -> LoadResult<ModuleRef> {
        let url = entry.url().to_string();
        debug!(url = %url, "LoadJob::run");

        self.discover(entry.clone())?;
        while let Some(Fetched { record, resource }) = self.fetches.next().await? {
            self.initialize(&record, &resource)?;
        }

        debug!(url = %url, modules = self.visited.len(), "instantiating");
        for record in self.visited.values() {
            record.instantiate()?;
        }

        let completion = entry.evaluate()?;
        debug!(url = %url, completion = %completion, "evaluated");
        Ok(entry)
    }

    /// Add `record` and everything it already knows about to the job.
    ///
    /// Uncompiled records get a fetch; compiled ones have their requests
    /// wired immediately. Terminal records are left as they are.
    fn discover(&mut self, record: ModuleRef) -> LoadResult<()> {
        let mut pending = VecDeque::from([record]);
        while let Some(record) = pending.pop_front() {
            if self.visited.contains_key(record.url()) {
                continue;
            }
            self.visited.insert(record.url().to_string(), record.clone());

            if record.status().is_terminal() {
                continue;
            }
            if record.is_compiled() {
                pending.extend(self.wire_dependencies(&record)?);
            } else {
                self.spawn_fetch(record);
            }
        }
        Ok(())
    }

    fn spawn_fetch(&mut self, record: ModuleRef) {
        let url = record.url().to_string();
        trace!(url = %url, in_flight = self.fetches.len() + 1, "fetch");
        let fetch = self.shared.hooks.fetch.clone();
        let span = debug_span!(parent: &self.shared.span, "fetch", url = %url);
        self.fetches.spawn(
            async move {
                let resource = fetch(url).await?;
                Ok(Fetched { record, resource })
            }
            .instrument(span),
        );
    }

    fn initialize(&mut self, record: &ModuleRef, resource: &Resource) -> LoadResult<()> {
        let url = record.url();
        debug!(url, content_type = resource.content_type(), "initialize");

        let cx = InitContext {
            compiler: self.shared.compiler.as_ref(),
            builtins: &self.shared.builtins,
            config: &self.shared.config,
        };
        (self.shared.hooks.init)(record, resource, &cx)?;
        if !record.is_compiled() {
            return Err(LoadError::init(url, "init hook left the module uncompiled"));
        }

        for dependency in self.wire_dependencies(record)? {
            self.discover(dependency)?;
        }
        Ok(())
    }

    /// Resolve every requested specifier of `record`, returning the dependencies
    fn wire_dependencies(&self, record: &ModuleRef) -> LoadResult<Vec<ModuleRef>> {
        let url = record.url();
        let requests = record.requested_specifiers();
        debug!(url, ?requests, "resolving");

        let mut dependencies = Vec::with_capacity(requests.len());
        for specifier in requests {
            if let Some(dependency) = record.resolved_dependency(&specifier) {
                dependencies.push(dependency);
                continue;
            }
            let dependency_url = (self.shared.hooks.resolve)(&specifier, url)?;
            let dependency = self.shared.cache.get_or_create(&dependency_url);
            debug!("resolveRequest {} --[{}]--> {}", url, specifier, dependency_url);
            record.resolve_request(&specifier, dependency.clone())?;
            dependencies.push(dependency);
        }
        Ok(dependencies)
    }
}
