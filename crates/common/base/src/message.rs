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

//! Messages flowing over the per-worker queue triple.
//!
//! Three channels connect a worker to the manager side: the task queue
//! (manager → worker, work to do), the control queue (manager → worker,
//! kill signals), and the shared status queue (all workers → manager,
//! progress and liveness fan-in).

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{
    entity::Func,
    id::{TaskUuid, WorkerUuid},
    status::ReportedStatus,
};

/// The payload of a queued task as the worker sees it.
///
/// The function body travels unresolved: the worker loads it (and its
/// declared dependencies) through its own registry on pickup, so a
/// resolution failure is captured inside the worker like any other
/// task failure.
#[derive(Clone, Debug)]
pub struct InnerTask {
    /// Manager-side handle (`uuid_in_manager` on the persisted task).
    pub uuid:            TaskUuid,
    pub func:            Func,
    /// The returned value replaces the worker's state.
    pub result_as_state: bool,
}

/// One unit of work on a worker's task queue.
#[derive(Clone, Debug)]
pub struct TaskQueueMessage {
    pub task:       InnerTask,
    pub argument:   Option<Bytes>,
    pub timeout:    Option<Duration>,
    pub created_at: DateTime<Utc>,
}

impl TaskQueueMessage {
    #[must_use]
    pub fn new(task: InnerTask, argument: Option<Bytes>, timeout: Option<Duration>) -> Self {
        Self {
            task,
            argument,
            timeout,
            created_at: Utc::now(),
        }
    }
}

/// Control signals addressed to a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSig {
    /// Abort the named task if it is currently running (or fail it on
    /// pickup if it is still queued).
    Kill(TaskUuid),
}

/// One message on a worker's control queue.
#[derive(Clone, Copy, Debug)]
pub struct ControlQueueMessage {
    pub worker_uuid: WorkerUuid,
    pub control_sig: ControlSig,
    pub created_at:  DateTime<Utc>,
}

impl ControlQueueMessage {
    #[must_use]
    pub fn new(worker_uuid: WorkerUuid, control_sig: ControlSig) -> Self {
        Self {
            worker_uuid,
            control_sig,
            created_at: Utc::now(),
        }
    }
}

/// A progress or liveness record on the fan-in status queue.
#[derive(Clone, Debug)]
pub struct StatusReport {
    pub worker_uuid: WorkerUuid,
    /// Absent for worker-level records (heartbeat, died).
    pub task_uuid:   Option<TaskUuid>,
    pub status:      ReportedStatus,
    /// Result string or captured error message, when there is one.
    pub content:     Option<String>,
    pub created_at:  DateTime<Utc>,
}

impl StatusReport {
    #[must_use]
    pub fn task(worker: WorkerUuid, task: TaskUuid, status: crate::TaskStatus) -> Self {
        Self {
            worker_uuid: worker,
            task_uuid:   Some(task),
            status:      ReportedStatus::Task(status),
            content:     None,
            created_at:  Utc::now(),
        }
    }

    #[must_use]
    pub fn worker(worker: WorkerUuid, status: crate::WorkerStatus) -> Self {
        Self {
            worker_uuid: worker,
            task_uuid:   None,
            status:      ReportedStatus::Worker(status),
            content:     None,
            created_at:  Utc::now(),
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}
