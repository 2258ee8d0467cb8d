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

//! The loop running inside each worker.
//!
//! A worker sees exactly three queues and nothing else: tasks in,
//! control signals in, status out. It owns one opaque state value;
//! tasks flagged as state generators replace it with their return
//! value, and every later task on the same worker observes the
//! replacement. Task failures never terminate the loop — they become
//! `Error` status reports.

use std::{collections::HashSet, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use taskgrid_base::{
    ControlQueueMessage, ControlSig, StatusReport, TaskQueueMessage, TaskStatus, TaskUuid,
    WorkerStatus, WorkerUuid, stringify_state,
};
use taskgrid_queue::{BreakRef, Queue};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    metrics::{
        HEARTBEATS_EMITTED, TASK_ERRORS, TASK_EXECUTION_DURATION_SECONDS, TASK_KILLS,
        TASK_TIMEOUTS, TASKS_EXECUTED,
    },
    registry::FuncRegistry,
};

/// Break reference wired to the worker's shutdown tokens so a blocked
/// task-queue wait can be abandoned without poking the queue itself.
struct ShutdownBreak {
    stop: CancellationToken,
    kill: CancellationToken,
}

impl BreakRef for ShutdownBreak {
    fn if_break_now(&self) -> bool { self.stop.is_cancelled() || self.kill.is_cancelled() }
}

enum TaskEnd {
    Finished(std::thread::Result<Result<Option<taskgrid_base::StateValue>, String>>),
    Killed,
    TimedOut(Duration),
    WorkerKilled,
}

pub(crate) struct WorkerRuntime {
    worker_uuid:        WorkerUuid,
    task_queue:         Arc<dyn Queue<TaskQueueMessage>>,
    status_queue:       Arc<dyn Queue<StatusReport>>,
    control_queue:      Arc<dyn Queue<ControlQueueMessage>>,
    registry:           Arc<FuncRegistry>,
    stop_token:         CancellationToken,
    kill_token:         CancellationToken,
    heartbeat_interval: Duration,
    task_poll_interval: Duration,
    state:              Option<taskgrid_base::StateValue>,
    /// Kill signals observed for tasks that have not started yet.
    pending_kills:      HashSet<TaskUuid>,
}

impl WorkerRuntime {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        worker_uuid: WorkerUuid,
        task_queue: Arc<dyn Queue<TaskQueueMessage>>,
        status_queue: Arc<dyn Queue<StatusReport>>,
        control_queue: Arc<dyn Queue<ControlQueueMessage>>,
        registry: Arc<FuncRegistry>,
        stop_token: CancellationToken,
        kill_token: CancellationToken,
        heartbeat_interval: Duration,
        task_poll_interval: Duration,
    ) -> Self {
        Self {
            worker_uuid,
            task_queue,
            status_queue,
            control_queue,
            registry,
            stop_token,
            kill_token,
            heartbeat_interval,
            task_poll_interval,
            state: None,
            pending_kills: HashSet::new(),
        }
    }

    /// Drive the worker until it is stopped or killed.
    pub(crate) async fn run(mut self) {
        let break_ref = ShutdownBreak {
            stop: self.stop_token.clone(),
            kill: self.kill_token.clone(),
        };
        let mut last_heartbeat = Instant::now();
        self.emit_heartbeat().await;

        loop {
            if self.kill_token.is_cancelled() || self.stop_token.is_cancelled() {
                break;
            }

            self.drain_control().await;

            if last_heartbeat.elapsed() >= self.heartbeat_interval {
                last_heartbeat = Instant::now();
                self.emit_heartbeat().await;
            }

            let message = self
                .task_queue
                .watch_and_get(&break_ref, Some(self.task_poll_interval))
                .await
                .unwrap_or(None);
            let Some(message) = message else { continue };

            if !self.execute(message).await {
                break;
            }
        }
        debug!(worker = %self.worker_uuid, "worker runtime exiting");
    }

    /// Consume everything currently queued on the control channel.
    async fn drain_control(&mut self) {
        while let Ok(Some(message)) = self.control_queue.get(Some(Duration::ZERO)).await {
            let ControlSig::Kill(task_uuid) = message.control_sig;
            debug!(worker = %self.worker_uuid, task = %task_uuid, "kill signal queued");
            self.pending_kills.insert(task_uuid);
        }
    }

    /// Run one task to completion, kill, or timeout. Returns false when
    /// the whole worker was killed mid-task.
    async fn execute(&mut self, message: TaskQueueMessage) -> bool {
        let task_uuid = message.task.uuid;
        let worker = self.worker_uuid;

        if self.pending_kills.remove(&task_uuid) {
            TASK_KILLS.with_label_values(&[&worker.to_string()]).inc();
            self.report(
                StatusReport::task(worker, task_uuid, TaskStatus::Error)
                    .with_content("task killed before start"),
            )
            .await;
            return true;
        }

        self.report(StatusReport::task(worker, task_uuid, TaskStatus::Running))
            .await;
        TASKS_EXECUTED
            .with_label_values(&[&worker.to_string()])
            .inc();

        // Load the function body and its declared dependencies. A miss
        // fails this task only, like any other execution error.
        let task_fn = match self.registry.resolve(&message.task.func) {
            Ok(task_fn) => task_fn,
            Err(error) => {
                TASK_ERRORS.with_label_values(&[&worker.to_string()]).inc();
                self.report(
                    StatusReport::task(worker, task_uuid, TaskStatus::Error)
                        .with_content(error.to_string()),
                )
                .await;
                return true;
            }
        };

        let logger = taskgrid_base::TaskLogger::new(worker, task_uuid);
        let invocation = task_fn.call(self.state.clone(), logger, message.argument.clone());
        let mut invocation = AssertUnwindSafe(invocation).catch_unwind();

        let deadline = message.timeout.map(|t| Instant::now() + t);
        let mut expiry = std::pin::pin!(async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        });

        let started = std::time::Instant::now();
        let kill_token = self.kill_token.clone();
        let control_queue = self.control_queue.clone();
        let end = loop {
            tokio::select! {
                result = &mut invocation => break TaskEnd::Finished(result),
                () = kill_token.cancelled() => break TaskEnd::WorkerKilled,
                () = &mut expiry => {
                    break TaskEnd::TimedOut(message.timeout.unwrap_or_default());
                }
                control = control_queue.get(None) => {
                    if let Ok(Some(control)) = control {
                        let ControlSig::Kill(target) = control.control_sig;
                        if target == task_uuid {
                            break TaskEnd::Killed;
                        }
                        self.pending_kills.insert(target);
                    }
                }
            }
        };
        TASK_EXECUTION_DURATION_SECONDS
            .with_label_values(&[&worker.to_string()])
            .observe(started.elapsed().as_secs_f64());

        match end {
            TaskEnd::Finished(Ok(Ok(value))) => {
                let content = if message.task.result_as_state {
                    self.state = value;
                    None
                } else {
                    value.as_ref().map(stringify_state)
                };
                let mut report = StatusReport::task(worker, task_uuid, TaskStatus::Success);
                if let Some(content) = content {
                    report = report.with_content(content);
                }
                self.report(report).await;
            }
            TaskEnd::Finished(Ok(Err(error))) => {
                TASK_ERRORS.with_label_values(&[&worker.to_string()]).inc();
                self.report(
                    StatusReport::task(worker, task_uuid, TaskStatus::Error).with_content(error),
                )
                .await;
            }
            TaskEnd::Finished(Err(panic)) => {
                TASK_ERRORS.with_label_values(&[&worker.to_string()]).inc();
                let message = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(ToString::to_string))
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.report(
                    StatusReport::task(worker, task_uuid, TaskStatus::Error)
                        .with_content(format!("task panicked: {message}")),
                )
                .await;
            }
            TaskEnd::Killed => {
                TASK_KILLS.with_label_values(&[&worker.to_string()]).inc();
                self.report(
                    StatusReport::task(worker, task_uuid, TaskStatus::Error)
                        .with_content("task killed"),
                )
                .await;
            }
            TaskEnd::TimedOut(timeout) => {
                TASK_TIMEOUTS
                    .with_label_values(&[&worker.to_string()])
                    .inc();
                self.report(
                    StatusReport::task(worker, task_uuid, TaskStatus::Error)
                        .with_content(format!("timeout after {}s", timeout.as_secs_f64())),
                )
                .await;
            }
            TaskEnd::WorkerKilled => return false,
        }
        true
    }

    async fn emit_heartbeat(&self) {
        HEARTBEATS_EMITTED
            .with_label_values(&[&self.worker_uuid.to_string()])
            .inc();
        self.report(StatusReport::worker(
            self.worker_uuid,
            WorkerStatus::Heartbeat,
        ))
        .await;
    }

    async fn report(&self, report: StatusReport) {
        if let Err(error) = self.status_queue.put(report).await {
            warn!(worker = %self.worker_uuid, %error, "failed to publish status report");
        }
    }
}
