//! Spawned fetch tasks owned by a load job.

use std::future::Future;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{LoadError, LoadResult};

/// What happens to outstanding tasks when their group is dropped early
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InFlightPolicy {
    /// Let them finish; their results are discarded
    #[default]
    Detach,
    /// Cancel them
    Abort,
}

/// Set of spawned tasks yielding results in completion order
pub(crate) struct TaskGroup<T> {
    tasks: FuturesUnordered<JoinHandle<LoadResult<T>>>,
    policy: InFlightPolicy,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub(crate) fn new(policy: InFlightPolicy) -> Self {
        Self {
            tasks: FuturesUnordered::new(),
            policy,
        }
    }

    /// Spawn `task` on the current runtime
    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = LoadResult<T>> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(task));
    }

    /// Number of tasks still running
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Next finished task. `Ok(None)` once the group is empty.
    pub(crate) async fn next(&mut self) -> LoadResult<Option<T>> {
        match self.tasks.next().await {
            None => Ok(None),
            Some(joined) => {
                let output = joined.map_err(|e| LoadError::internal(format!("fetch task failed: {}", e)))?;
                output.map(Some)
            }
        }
    }
}

impl<T> Drop for TaskGroup<T> {
    fn drop(&mut self) {
        if self.policy == InFlightPolicy::Abort {
            for task in self.tasks.iter() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_results_in_completion_order() {
        let mut group = TaskGroup::new(InFlightPolicy::Detach);
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok("slow")
        });
        group.spawn(async { Ok("fast") });
        assert_eq!(group.len(), 2);

        assert_eq!(group.next().await.unwrap(), Some("fast"));
        assert_eq!(group.next().await.unwrap(), Some("slow"));
        assert_eq!(group.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_abort_policy_cancels_on_drop() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let mut group: TaskGroup<()> = TaskGroup::new(InFlightPolicy::Abort);
        group.spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        drop(group);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_detach_policy_lets_tasks_finish() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let mut group: TaskGroup<()> = TaskGroup::new(InFlightPolicy::Detach);
        group.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        drop(group);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }
}
