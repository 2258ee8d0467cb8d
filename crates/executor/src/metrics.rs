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

use lazy_static::lazy_static;
use prometheus::*;

pub const WORKER_LABEL: &str = "worker";

lazy_static! {
    pub static ref WORKER_SPAWNED: IntCounter = register_int_counter!(
        "taskgrid_worker_spawned_total",
        "Total number of workers spawned"
    )
    .unwrap();
    pub static ref WORKER_STOPPED: IntCounter = register_int_counter!(
        "taskgrid_worker_stopped_total",
        "Total number of workers stopped gracefully"
    )
    .unwrap();
    pub static ref WORKER_KILLED: IntCounter = register_int_counter!(
        "taskgrid_worker_killed_total",
        "Total number of workers forcefully killed"
    )
    .unwrap();
    pub static ref WORKER_DIED: IntCounter = register_int_counter!(
        "taskgrid_worker_died_total",
        "Total number of workers that died unexpectedly"
    )
    .unwrap();
    pub static ref TASKS_EXECUTED: IntCounterVec = register_int_counter_vec!(
        "taskgrid_tasks_executed_total",
        "Total number of tasks picked up by workers",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref TASK_ERRORS: IntCounterVec = register_int_counter_vec!(
        "taskgrid_task_errors_total",
        "Total number of task executions that failed",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref TASK_TIMEOUTS: IntCounterVec = register_int_counter_vec!(
        "taskgrid_task_timeouts_total",
        "Total number of task executions aborted by timeout",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref TASK_KILLS: IntCounterVec = register_int_counter_vec!(
        "taskgrid_task_kills_total",
        "Total number of tasks aborted by kill signals",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref TASK_EXECUTION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "taskgrid_task_execution_duration_seconds",
        "Task execution duration in seconds",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref HEARTBEATS_EMITTED: IntCounterVec = register_int_counter_vec!(
        "taskgrid_heartbeats_emitted_total",
        "Total number of heartbeat records emitted",
        &[WORKER_LABEL]
    )
    .unwrap();
}
