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

//! Local transports for the two RPC façades.
//!
//! Both adapters collapse the wire hop: the leader placement RPC
//! becomes bookkeeping over an in-memory table, and the task-manager
//! RPC forwards persisted function bodies straight into the executor
//! crate — resolution stays on the receiving worker.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use taskgrid_base::{CronTaskUuid, Func, SchedulerNode, SchedulerNodeUuid, StatusReport, TaskUuid, WorkerUuid};
use taskgrid_error::Result;
use taskgrid_executor::FunTaskManager;
use taskgrid_scheduler::interface::{LeaderSchedulerRpc, RpcFunTaskManager};
use tokio::sync::Mutex;
use tracing::debug;

/// Placement bookkeeping standing in for the node-to-node RPC.
pub struct LocalSchedulerRpc {
    assignments: Mutex<HashMap<SchedulerNodeUuid, Vec<CronTaskUuid>>>,
}

impl LocalSchedulerRpc {
    #[must_use]
    pub fn new() -> Self {
        Self {
            assignments: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LocalSchedulerRpc {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl LeaderSchedulerRpc for LocalSchedulerRpc {
    async fn assign_task_to_node(
        &self,
        node: &SchedulerNode,
        cron_task: CronTaskUuid,
        effective_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        debug!(node = %node.uuid, cron_task = %cron_task, ?effective_at, "assign");
        let mut assignments = self.assignments.lock().await;
        let tasks = assignments.entry(node.uuid).or_default();
        if !tasks.contains(&cron_task) {
            tasks.push(cron_task);
        }
        Ok(())
    }

    async fn get_node_task_list(&self, node: &SchedulerNode) -> Result<Vec<CronTaskUuid>> {
        Ok(self
            .assignments
            .lock()
            .await
            .get(&node.uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_task_from_node(
        &self,
        node: &SchedulerNode,
        cron_task: CronTaskUuid,
        effective_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        debug!(node = %node.uuid, cron_task = %cron_task, ?effective_at, "remove");
        if let Some(tasks) = self.assignments.lock().await.get_mut(&node.uuid) {
            tasks.retain(|uuid| *uuid != cron_task);
        }
        Ok(())
    }
}

/// Task-manager façade over an in-process executor.
pub struct LocalFunTaskManager {
    inner: Arc<FunTaskManager>,
}

impl LocalFunTaskManager {
    #[must_use]
    pub fn new(inner: Arc<FunTaskManager>) -> Self { Self { inner } }
}

#[async_trait]
impl RpcFunTaskManager for LocalFunTaskManager {
    async fn increase_workers(&self, number: usize) -> Result<Vec<WorkerUuid>> {
        self.inner.increase_workers(number).await
    }

    async fn increase_worker(&self) -> Result<WorkerUuid> { self.inner.increase_worker().await }

    async fn dispatch_fun_task(
        &self,
        worker_uuid: WorkerUuid,
        func: &Func,
        change_status: bool,
        timeout: Option<Duration>,
        argument: Option<Bytes>,
    ) -> Result<TaskUuid> {
        self.inner
            .dispatch_fun_task(worker_uuid, func.clone(), change_status, timeout, argument)
            .await
    }

    async fn stop_task(&self, worker_uuid: WorkerUuid, task_uuid: TaskUuid) -> Result<()> {
        self.inner.stop_task(worker_uuid, task_uuid).await
    }

    async fn stop_worker(&self, worker_uuid: WorkerUuid) -> Result<()> {
        self.inner.stop_worker(worker_uuid).await
    }

    async fn kill_worker(&self, worker_uuid: WorkerUuid) -> Result<()> {
        self.inner.kill_worker(worker_uuid).await
    }

    async fn get_queued_status(&self, timeout: Option<Duration>) -> Result<Option<StatusReport>> {
        self.inner.get_queued_status(timeout).await
    }

    async fn get_task_queue_size(&self, worker_uuid: WorkerUuid) -> Result<usize> {
        self.inner.get_task_queue_size(worker_uuid).await
    }
}
