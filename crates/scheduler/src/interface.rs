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

//! Contracts of the scheduler's external collaborators.
//!
//! The scheduler never sees a database, a wire protocol or an etcd
//! client — only these traits. Implementations live with their backing
//! technology; the in-process ones ship in `taskgrid-providers`.

use std::{any::Any, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use taskgrid_base::{
    ClusterUuid, CronTask, CronTaskUuid, Func, FuncGroup, FuncGroupUuid, FuncParameterSchema,
    FuncUuid, ParameterSchemaUuid, SchedulerNode, SchedulerNodeUuid, StatusReport, Task,
    TaskStatus, TaskUuid, Worker, WorkerStatus, WorkerUuid,
};
use taskgrid_error::Result;

/// Partial update applied to a persisted task.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub status:          Option<TaskStatus>,
    pub uuid_in_manager: Option<TaskUuid>,
    pub worker_uuid:     Option<WorkerUuid>,
    pub result:          Option<String>,
}

/// The system of record. Lookups for unknown uuids fail with
/// `RecordNotFound`.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_task_from_uuid(&self, uuid: TaskUuid) -> Result<Task>;

    async fn get_cron_task_from_uuid(&self, uuid: CronTaskUuid) -> Result<CronTask>;

    async fn get_worker_from_uuid(&self, uuid: WorkerUuid) -> Result<Worker>;

    async fn get_workers_from_tags(&self, tags: &[String]) -> Result<Vec<Worker>>;

    /// Every task currently bound to a worker, any status.
    async fn get_tasks_on_worker(&self, worker: WorkerUuid) -> Result<Vec<Task>>;

    async fn get_all_cron_task(&self) -> Result<Vec<CronTask>>;

    async fn add_task(&self, task: Task) -> Result<TaskUuid>;

    async fn add_cron_task(&self, cron_task: CronTask) -> Result<CronTaskUuid>;

    async fn add_func(&self, func: Func) -> Result<FuncUuid>;

    async fn add_func_group(&self, group: FuncGroup) -> Result<FuncGroupUuid>;

    async fn add_func_parameter_schema(
        &self,
        schema: FuncParameterSchema,
    ) -> Result<ParameterSchemaUuid>;

    /// Change a task's status, enforcing nothing: the status lattice is
    /// the scheduler's concern, persistence is this trait's.
    async fn change_task_status(&self, uuid: TaskUuid, status: TaskStatus) -> Result<()>;

    async fn update_task(&self, uuid: TaskUuid, patch: TaskPatch) -> Result<()>;

    async fn update_task_uuid_in_manager(
        &self,
        uuid: TaskUuid,
        uuid_in_manager: TaskUuid,
    ) -> Result<()>;

    async fn update_worker_last_heart_beat_time(
        &self,
        uuid: WorkerUuid,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn update_worker_status(&self, uuid: WorkerUuid, status: WorkerStatus) -> Result<()>;
}

/// Callback fired by the cron timer.
pub type CronCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// The cron timer. Names are opaque strings; the scheduler encodes
/// `"{cron_uuid}/{timepoint}"` so registrations can be enumerated and
/// cancelled by prefix.
#[async_trait]
pub trait Cron: Send + Sync {
    async fn every_n_milliseconds(&self, name: &str, n: u32, task: CronCallback) -> Result<()>;

    async fn every_n_seconds(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()>;

    async fn every_n_minutes(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()>;

    async fn every_n_hours(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()>;

    async fn every_n_days(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()>;

    async fn every_n_weeks(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()>;

    async fn cancel(&self, name: &str) -> Result<()>;

    async fn get_all(&self) -> Result<Vec<String>>;
}

/// Scoped acquisition handle; releasing happens on drop, on every exit
/// path.
pub struct LockGuard {
    _inner: Box<dyn Any + Send>,
}

impl LockGuard {
    pub fn new(inner: impl Any + Send) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

/// Cluster-wide mutual exclusion, keyed by name. Queue-admission
/// decisions lock on the worker uuid.
#[async_trait]
pub trait DistributeLock: Send + Sync {
    /// Acquire, waiting up to `timeout` (forever when `None`). Fails
    /// with `Timeout` on expiry.
    async fn lock(&self, name: &str, timeout: Option<Duration>) -> Result<LockGuard>;

    /// Non-blocking acquisition attempt; `None` on contention.
    async fn try_lock(&self, name: &str) -> Result<Option<LockGuard>>;
}

/// Leader election, fully delegated.
#[async_trait]
pub trait LeaderControl: Send + Sync {
    async fn get_leader(&self) -> Result<Option<SchedulerNode>>;

    async fn elect_leader(&self, uuid: SchedulerNodeUuid) -> Result<bool>;

    async fn is_he_leader(&self, uuid: SchedulerNodeUuid) -> Result<bool>;

    async fn get_all_nodes(&self) -> Result<Vec<SchedulerNode>>;

    async fn get_cluster_id(&self) -> Result<ClusterUuid>;
}

/// Leader → worker-scheduler placement calls.
#[async_trait]
pub trait LeaderSchedulerRpc: Send + Sync {
    async fn assign_task_to_node(
        &self,
        node: &SchedulerNode,
        cron_task: CronTaskUuid,
        effective_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn get_node_task_list(&self, node: &SchedulerNode) -> Result<Vec<CronTaskUuid>>;

    async fn remove_task_from_node(
        &self,
        node: &SchedulerNode,
        cron_task: CronTaskUuid,
        effective_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Remote façade of the data plane's task manager. Function bodies
/// travel as persisted `Func` entities (serialised payload plus
/// dependency names); the far side resolves them through its registry.
#[async_trait]
pub trait RpcFunTaskManager: Send + Sync {
    async fn increase_workers(&self, number: usize) -> Result<Vec<WorkerUuid>>;

    async fn increase_worker(&self) -> Result<WorkerUuid>;

    async fn dispatch_fun_task(
        &self,
        worker_uuid: WorkerUuid,
        func: &Func,
        change_status: bool,
        timeout: Option<Duration>,
        argument: Option<Bytes>,
    ) -> Result<TaskUuid>;

    async fn stop_task(&self, worker_uuid: WorkerUuid, task_uuid: TaskUuid) -> Result<()>;

    async fn stop_worker(&self, worker_uuid: WorkerUuid) -> Result<()>;

    async fn kill_worker(&self, worker_uuid: WorkerUuid) -> Result<()>;

    async fn get_queued_status(&self, timeout: Option<Duration>) -> Result<Option<StatusReport>>;

    async fn get_task_queue_size(&self, worker_uuid: WorkerUuid) -> Result<usize>;
}
