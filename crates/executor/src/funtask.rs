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

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use taskgrid_base::{
    ControlQueueMessage, ControlSig, Func, InnerTask, StatusReport, TaskQueueMessage, TaskStatus,
    TaskUuid, WorkerUuid,
};
use taskgrid_error::Result;
use taskgrid_queue::Queue;
use tracing::debug;

use crate::manager::WorkerManager;

/// Dispatch façade over a [`WorkerManager`].
///
/// This is the surface the scheduler's RPC layer talks to: spin workers
/// up, address tasks to a worker by uuid, push kill signals, and drain
/// the unified status queue. Function bodies are handed over unresolved;
/// the receiving worker loads them through its registry.
pub struct FunTaskManager {
    worker_manager: Arc<dyn WorkerManager>,
    status_queue:   Arc<dyn Queue<StatusReport>>,
}

impl FunTaskManager {
    #[must_use]
    pub fn new(
        worker_manager: Arc<dyn WorkerManager>,
        status_queue: Arc<dyn Queue<StatusReport>>,
    ) -> Self {
        Self {
            worker_manager,
            status_queue,
        }
    }

    pub async fn increase_workers(&self, number: usize) -> Result<Vec<WorkerUuid>> {
        let mut workers = Vec::with_capacity(number);
        for _ in 0..number {
            workers.push(self.increase_worker().await?);
        }
        Ok(workers)
    }

    pub async fn increase_worker(&self) -> Result<WorkerUuid> {
        self.worker_manager.increase_worker().await
    }

    /// Mint a task uuid, wrap the function as a queue message and put it
    /// on the worker's task queue. `change_status` marks the task as a
    /// state generator: its return value replaces the worker's state.
    pub async fn dispatch_fun_task(
        &self,
        worker_uuid: WorkerUuid,
        func: Func,
        change_status: bool,
        timeout: Option<Duration>,
        argument: Option<Bytes>,
    ) -> Result<TaskUuid> {
        let task_uuid = TaskUuid::new();
        let message = TaskQueueMessage::new(
            InnerTask {
                uuid: task_uuid,
                func,
                result_as_state: change_status,
            },
            argument,
            timeout,
        );
        self.worker_manager
            .get_task_queue(worker_uuid)
            .await?
            .put(message)
            .await?;
        self.status_queue
            .put(StatusReport::task(worker_uuid, task_uuid, TaskStatus::Queued))
            .await?;
        debug!(worker = %worker_uuid, task = %task_uuid, "task dispatched");
        Ok(task_uuid)
    }

    /// Sugar over dispatch for state regenerators.
    pub async fn generate_worker_state(
        &self,
        worker_uuid: WorkerUuid,
        state_generator: Func,
        timeout: Option<Duration>,
        argument: Option<Bytes>,
    ) -> Result<TaskUuid> {
        self.dispatch_fun_task(worker_uuid, state_generator, true, timeout, argument)
            .await
    }

    /// Push a kill signal addressed to one task on one worker.
    pub async fn stop_task(&self, worker_uuid: WorkerUuid, task_uuid: TaskUuid) -> Result<()> {
        self.worker_manager
            .get_control_queue(worker_uuid)
            .await?
            .put(ControlQueueMessage::new(
                worker_uuid,
                ControlSig::Kill(task_uuid),
            ))
            .await
    }

    pub async fn stop_worker(&self, worker_uuid: WorkerUuid) -> Result<()> {
        self.worker_manager.stop_worker(worker_uuid).await
    }

    pub async fn kill_worker(&self, worker_uuid: WorkerUuid) -> Result<()> {
        self.worker_manager.kill_worker(worker_uuid).await
    }

    /// One pop from the unified status queue; `None` on timeout.
    pub async fn get_queued_status(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Option<StatusReport>> {
        self.status_queue.get(timeout).await
    }

    pub async fn get_task_queue_size(&self, worker_uuid: WorkerUuid) -> Result<usize> {
        Ok(self
            .worker_manager
            .get_task_queue(worker_uuid)
            .await?
            .qsize()
            .await)
    }
}
