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

//! Worker lifecycle ownership.
//!
//! The manager spawns workers, owns their queue triples, and terminates
//! them. A worker uuid stays registered forever within one manager
//! lifetime: after kill or stop the entry flips to a terminated
//! lifecycle instead of being removed, so late status reports are never
//! orphaned.

use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use taskgrid_base::{
    ControlQueueMessage, StatusReport, TaskQueueMessage, WorkerStatus, WorkerUuid,
};
use taskgrid_error::{RecordNotFoundSnafu, Result};
use taskgrid_queue::{Queue, QueueFactory};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::WorkerManagerConfig,
    metrics::{WORKER_DIED, WORKER_KILLED, WORKER_SPAWNED, WORKER_STOPPED},
    registry::FuncRegistry,
    runtime::WorkerRuntime,
};

/// Owns worker lifecycles and exposes their queues.
#[async_trait]
pub trait WorkerManager: Send + Sync {
    /// Spawn one worker and return its freshly minted uuid.
    async fn increase_worker(&self) -> Result<WorkerUuid>;

    /// Forceful termination: the worker abandons whatever it is doing
    /// at the next suspension point.
    async fn kill_worker(&self, worker: WorkerUuid) -> Result<()>;

    /// Cooperative termination: the worker drains its current task,
    /// then exits.
    async fn stop_worker(&self, worker: WorkerUuid) -> Result<()>;

    async fn get_task_queue(&self, worker: WorkerUuid)
    -> Result<Arc<dyn Queue<TaskQueueMessage>>>;

    async fn get_control_queue(
        &self,
        worker: WorkerUuid,
    ) -> Result<Arc<dyn Queue<ControlQueueMessage>>>;
}

/// Lifecycle of a managed worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerLifecycle {
    Running,
    Stopping,
    Stopped,
    Died,
}

struct WorkerEntry {
    task_queue:    Arc<dyn Queue<TaskQueueMessage>>,
    control_queue: Arc<dyn Queue<ControlQueueMessage>>,
    stop_token:    CancellationToken,
    kill_token:    CancellationToken,
    shared:        Arc<WorkerShared>,
}

struct WorkerShared {
    lifecycle: std::sync::Mutex<WorkerLifecycle>,
}

impl WorkerShared {
    fn set(&self, next: WorkerLifecycle) {
        *self.lifecycle.lock().expect("lifecycle lock poisoned") = next;
    }

    fn get(&self) -> WorkerLifecycle {
        *self.lifecycle.lock().expect("lifecycle lock poisoned")
    }
}

/// Worker manager backed by in-process workers, one dedicated OS thread
/// and single-thread runtime each. The queue triple is the only channel
/// in or out of a worker.
pub struct LocalWorkerManager {
    config:         WorkerManagerConfig,
    task_queues:    Arc<dyn QueueFactory<TaskQueueMessage>>,
    control_queues: Arc<dyn QueueFactory<ControlQueueMessage>>,
    status_queue:   Arc<dyn Queue<StatusReport>>,
    /// Function registry handed to every worker; bodies resolve on the
    /// worker's own thread.
    registry:       Arc<FuncRegistry>,
    workers:        tokio::sync::RwLock<HashMap<WorkerUuid, WorkerEntry>>,
}

impl LocalWorkerManager {
    #[must_use]
    pub fn new(
        config: WorkerManagerConfig,
        task_queues: Arc<dyn QueueFactory<TaskQueueMessage>>,
        control_queues: Arc<dyn QueueFactory<ControlQueueMessage>>,
        status_queue: Arc<dyn Queue<StatusReport>>,
        registry: Arc<FuncRegistry>,
    ) -> Self {
        Self {
            config,
            task_queues,
            control_queues,
            status_queue,
            registry,
            workers: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Last observed lifecycle of a worker, if it is known to this
    /// manager.
    pub async fn lifecycle(&self, worker: WorkerUuid) -> Option<WorkerLifecycle> {
        self.workers
            .read()
            .await
            .get(&worker)
            .map(|entry| entry.shared.get())
    }
}

#[async_trait]
impl WorkerManager for LocalWorkerManager {
    async fn increase_worker(&self) -> Result<WorkerUuid> {
        let uuid = WorkerUuid::new();
        let task_queue = self.task_queues.queue(&format!("task_queue:{uuid}"));
        let control_queue = self.control_queues.queue(&format!("control_queue:{uuid}"));
        let stop_token = CancellationToken::new();
        let kill_token = CancellationToken::new();
        let shared = Arc::new(WorkerShared {
            lifecycle: std::sync::Mutex::new(WorkerLifecycle::Running),
        });

        let runtime = WorkerRuntime::new(
            uuid,
            task_queue.clone(),
            self.status_queue.clone(),
            control_queue.clone(),
            self.registry.clone(),
            stop_token.clone(),
            kill_token.clone(),
            self.config.heartbeat_interval,
            self.config.task_poll_interval,
        );

        let thread_shared = shared.clone();
        let thread_stop = stop_token.clone();
        let thread_kill = kill_token.clone();
        let thread_status = self.status_queue.clone();
        std::thread::Builder::new()
            .name(format!("worker-{uuid}"))
            .spawn(move || {
                // One single-thread runtime per worker: the state value
                // and queue consumers never leave this thread, so the
                // queues stay the only way in or out.
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .thread_name(format!("worker-{uuid}"))
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        error!(worker = %uuid, error = %err, "failed to build worker runtime");
                        thread_shared.set(WorkerLifecycle::Died);
                        WORKER_DIED.inc();
                        return;
                    }
                };

                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    rt.block_on(runtime.run());
                }));

                let next = if outcome.is_err() || thread_kill.is_cancelled() {
                    WorkerLifecycle::Died
                } else if thread_stop.is_cancelled() {
                    WorkerLifecycle::Stopped
                } else {
                    // The loop only exits through a shutdown token.
                    WorkerLifecycle::Died
                };
                thread_shared.set(next);

                match next {
                    WorkerLifecycle::Died => {
                        WORKER_DIED.inc();
                        let report = StatusReport::worker(uuid, WorkerStatus::Died);
                        let _ = rt.block_on(thread_status.put(report));
                        info!(worker = %uuid, "worker died");
                    }
                    _ => {
                        WORKER_STOPPED.inc();
                        info!(worker = %uuid, "worker stopped");
                    }
                }
            })
            .expect("failed to spawn worker thread");

        self.workers.write().await.insert(uuid, WorkerEntry {
            task_queue,
            control_queue,
            stop_token,
            kill_token,
            shared,
        });
        WORKER_SPAWNED.inc();
        info!(worker = %uuid, "worker spawned");
        Ok(uuid)
    }

    async fn kill_worker(&self, worker: WorkerUuid) -> Result<()> {
        let workers = self.workers.read().await;
        let entry = workers.get(&worker).ok_or_else(|| {
            RecordNotFoundSnafu {
                entity: "worker",
                uuid:   worker.to_string(),
            }
            .build()
        })?;
        WORKER_KILLED.inc();
        entry.kill_token.cancel();
        Ok(())
    }

    async fn stop_worker(&self, worker: WorkerUuid) -> Result<()> {
        let workers = self.workers.read().await;
        let entry = workers.get(&worker).ok_or_else(|| {
            RecordNotFoundSnafu {
                entity: "worker",
                uuid:   worker.to_string(),
            }
            .build()
        })?;
        if entry.shared.get() == WorkerLifecycle::Running {
            entry.shared.set(WorkerLifecycle::Stopping);
        }
        entry.stop_token.cancel();
        Ok(())
    }

    async fn get_task_queue(
        &self,
        worker: WorkerUuid,
    ) -> Result<Arc<dyn Queue<TaskQueueMessage>>> {
        self.workers
            .read()
            .await
            .get(&worker)
            .map(|entry| entry.task_queue.clone())
            .ok_or_else(|| {
                RecordNotFoundSnafu {
                    entity: "worker",
                    uuid:   worker.to_string(),
                }
                .build()
            })
    }

    async fn get_control_queue(
        &self,
        worker: WorkerUuid,
    ) -> Result<Arc<dyn Queue<ControlQueueMessage>>> {
        self.workers
            .read()
            .await
            .get(&worker)
            .map(|entry| entry.control_queue.clone())
            .ok_or_else(|| {
                RecordNotFoundSnafu {
                    entity: "worker",
                    uuid:   worker.to_string(),
                }
                .build()
            })
    }
}
