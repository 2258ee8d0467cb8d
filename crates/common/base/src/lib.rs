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

//! Core entities and shared types for the taskgrid platform.
//!
//! Everything the control plane (scheduler) and data plane (workers)
//! exchange lives here: typed identifiers, the task/cron-task/worker
//! entities, the pluggable scheduling strategies, the queue message
//! shapes, and the callable type executed inside workers.

mod entity;
mod id;
mod message;
mod status;
mod strategy;
mod task_fn;

pub use entity::{
    CronTask, Func, FuncGroup, FuncParameterSchema, SchedulerNode, Task, TimePoint, TimeUnit,
    Worker,
};
pub use id::{
    ClusterUuid, CronTaskUuid, FuncGroupUuid, FuncUuid, ParameterSchemaUuid, QueueUuid,
    SchedulerNodeUuid, TaskUuid, WorkerUuid,
};
pub use message::{ControlQueueMessage, ControlSig, InnerTask, StatusReport, TaskQueueMessage};
pub use status::{ReportedStatus, TaskStatus, WorkerStatus};
pub use strategy::{
    ArgumentStrategy, QueueFullStrategy, StrategyInfo, UdfSpec, WorkerChooseStrategy,
};
pub use task_fn::{BoxTaskFn, StateValue, TaskFn, TaskFuture, TaskLogger, stringify_state, task_fn};
