// Copyright 2025 taskgrid Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The callable executed inside a worker.
//!
//! A task function receives the worker's current state (a single opaque
//! value owned by the worker), a logger scoped to the task, and the
//! opaque argument bytes the scheduler materialised. Its return value
//! replaces the worker state when the task is flagged as a state
//! generator; otherwise it is stringified into the persisted result.

use std::{any::Any, future::Future, sync::Arc};

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::id::{TaskUuid, WorkerUuid};

/// The single opaque state value owned by a worker runtime.
pub type StateValue = Arc<dyn Any + Send + Sync>;

/// Outcome of a task function: an optional value, or a captured error
/// message. Errors never escape the worker loop; they become `Error`
/// status reports.
pub type TaskFuture = BoxFuture<'static, Result<Option<StateValue>, String>>;

/// A function body runnable on a worker.
pub trait TaskFn: Send + Sync {
    fn call(
        &self,
        state: Option<StateValue>,
        logger: TaskLogger,
        argument: Option<Bytes>,
    ) -> TaskFuture;
}

pub type BoxTaskFn = Arc<dyn TaskFn>;

impl std::fmt::Debug for dyn TaskFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("TaskFn") }
}

impl<F> TaskFn for F
where
    F: Fn(Option<StateValue>, TaskLogger, Option<Bytes>) -> TaskFuture + Send + Sync,
{
    fn call(
        &self,
        state: Option<StateValue>,
        logger: TaskLogger,
        argument: Option<Bytes>,
    ) -> TaskFuture {
        self(state, logger, argument)
    }
}

/// Wrap an async closure into a boxed [`TaskFn`].
pub fn task_fn<F, Fut>(f: F) -> BoxTaskFn
where
    F: Fn(Option<StateValue>, TaskLogger, Option<Bytes>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<StateValue>, String>> + Send + 'static,
{
    Arc::new(move |state, logger, argument| {
        Box::pin(f(state, logger, argument)) as TaskFuture
    })
}

/// Logger injected into task functions; every record carries the worker
/// and task identity as structured fields.
#[derive(Clone, Debug)]
pub struct TaskLogger {
    worker: WorkerUuid,
    task:   TaskUuid,
}

impl TaskLogger {
    #[must_use]
    pub const fn new(worker: WorkerUuid, task: TaskUuid) -> Self { Self { worker, task } }

    pub fn debug(&self, msg: &str) {
        tracing::debug!(worker = %self.worker, task = %self.task, "{msg}");
    }

    pub fn info(&self, msg: &str) {
        tracing::info!(worker = %self.worker, task = %self.task, "{msg}");
    }

    pub fn warn(&self, msg: &str) {
        tracing::warn!(worker = %self.worker, task = %self.task, "{msg}");
    }

    pub fn error(&self, msg: &str) {
        tracing::error!(worker = %self.worker, task = %self.task, "{msg}");
    }
}

/// Best-effort rendering of a task's returned value into the persisted
/// result string. Values that aren't plain data render as `<opaque>`.
#[must_use]
pub fn stringify_state(value: &StateValue) -> String {
    if let Some(s) = value.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = value.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(n) = value.downcast_ref::<i64>() {
        n.to_string()
    } else if let Some(n) = value.downcast_ref::<i32>() {
        n.to_string()
    } else if let Some(n) = value.downcast_ref::<u64>() {
        n.to_string()
    } else if let Some(n) = value.downcast_ref::<f64>() {
        n.to_string()
    } else if let Some(b) = value.downcast_ref::<bool>() {
        b.to_string()
    } else if value.downcast_ref::<()>().is_some() {
        String::new()
    } else {
        "<opaque>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringify_common_values() {
        let s: StateValue = Arc::new("done".to_string());
        assert_eq!(stringify_state(&s), "done");

        let n: StateValue = Arc::new(42_i64);
        assert_eq!(stringify_state(&n), "42");

        let unit: StateValue = Arc::new(());
        assert_eq!(stringify_state(&unit), "");

        let opaque: StateValue = Arc::new(vec![1_u8, 2, 3]);
        assert_eq!(stringify_state(&opaque), "<opaque>");
    }
}
