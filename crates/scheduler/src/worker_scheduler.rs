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

//! Per-node cron-to-task materialisation.
//!
//! Each cron fire runs through the same pipeline: resolve the three
//! strategies to fixed points, select a worker, then — under the
//! distributed lock keyed by that worker's uuid — materialise the
//! argument, persist the task, and decide queue admission. Two nodes
//! may fire for different workers concurrently; they never race on the
//! same worker's admission decision.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::Utc;
use taskgrid_base::{
    ArgumentStrategy, CronTask, CronTaskUuid, QueueFullStrategy, ReportedStatus, StatusReport,
    Task, TaskStatus, TaskUuid, TimePoint, TimeUnit, WorkerChooseStrategy, WorkerStatus,
    WorkerUuid,
};
use taskgrid_error::{Error, Result, StatusChangeSnafu, StaleHeartbeatSnafu, StrategySnafu};
use taskgrid_queue::{Queue as _, QueueFactory};
use tracing::{debug, info, warn};

use crate::{
    interface::{Cron, CronCallback, DistributeLock, Repository, RpcFunTaskManager, TaskPatch},
    strategy::UdfRegistry,
};

fn cron_entry_name(cron_task: &CronTask, time_point: &TimePoint) -> String {
    format!("{}/{}", cron_task.uuid, time_point)
}

fn cron_uuid_from_name(name: &str) -> Option<CronTaskUuid> {
    name.split('/').next()?.parse().ok()
}

fn timeout_duration(timeout: Option<f64>) -> Option<Duration> {
    timeout
        .filter(|t| t.is_finite() && *t > 0.0)
        .map(Duration::from_secs_f64)
}

/// The per-node scheduler: registers cron triggers for owned cron tasks
/// and turns their fires into persisted, dispatched tasks.
///
/// Cheap to clone; cron callbacks capture a clone.
#[derive(Clone)]
pub struct WorkerScheduler {
    funtask_manager: Arc<dyn RpcFunTaskManager>,
    repository:      Arc<dyn Repository>,
    cron:            Arc<dyn Cron>,
    argument_queues: Arc<dyn QueueFactory<Bytes>>,
    lock:            Arc<dyn DistributeLock>,
    udfs:            Arc<UdfRegistry>,
}

impl WorkerScheduler {
    #[must_use]
    pub fn new(
        funtask_manager: Arc<dyn RpcFunTaskManager>,
        repository: Arc<dyn Repository>,
        cron: Arc<dyn Cron>,
        argument_queues: Arc<dyn QueueFactory<Bytes>>,
        lock: Arc<dyn DistributeLock>,
        udfs: Arc<UdfRegistry>,
    ) -> Self {
        Self {
            funtask_manager,
            repository,
            cron,
            argument_queues,
            lock,
            udfs,
        }
    }

    /// Apply one status report to the repository.
    ///
    /// Task reports are validated against the status lattice: terminal
    /// tasks never move again. Worker heartbeats must come from workers
    /// the repository still believes are running.
    pub async fn process_new_status(&self, report: &StatusReport) -> Result<()> {
        match report.status {
            ReportedStatus::Task(status) => {
                let task_uuid = report.task_uuid.ok_or_else(|| {
                    StrategySnafu {
                        message: "task status report without task uuid".to_string(),
                    }
                    .build()
                })?;
                let task = self.repository.get_task_from_uuid(task_uuid).await?;
                if !task.status.can_transition_to(status) {
                    return StatusChangeSnafu {
                        uuid:      task_uuid.to_string(),
                        current:   task.status.to_string(),
                        attempted: status.to_string(),
                    }
                    .fail();
                }
                if report.content.is_some() {
                    self.repository
                        .update_task(task_uuid, TaskPatch {
                            status: Some(status),
                            result: report.content.clone(),
                            ..TaskPatch::default()
                        })
                        .await
                } else {
                    self.repository.change_task_status(task_uuid, status).await
                }
            }
            ReportedStatus::Worker(WorkerStatus::Died) => {
                warn!(worker = %report.worker_uuid, "worker died");
                self.repository
                    .update_worker_status(report.worker_uuid, WorkerStatus::Died)
                    .await?;
                // Everything in flight on that worker died with it.
                for task in self
                    .repository
                    .get_tasks_on_worker(report.worker_uuid)
                    .await?
                {
                    if matches!(task.status, TaskStatus::Queued | TaskStatus::Running) {
                        self.repository
                            .change_task_status(task.uuid, TaskStatus::Died)
                            .await?;
                    }
                }
                Ok(())
            }
            ReportedStatus::Worker(_) => {
                let worker = self
                    .repository
                    .get_worker_from_uuid(report.worker_uuid)
                    .await?;
                if worker.status != WorkerStatus::Running {
                    return StaleHeartbeatSnafu {
                        worker: worker.uuid.to_string(),
                        status: worker.status.to_string(),
                    }
                    .fail();
                }
                self.repository
                    .update_worker_last_heart_beat_time(report.worker_uuid, Utc::now())
                    .await
            }
        }
    }

    /// Dispatch a persisted task to its worker and record the runtime
    /// handle.
    pub async fn assign_task(&self, task_uuid: TaskUuid) -> Result<()> {
        let task = self.repository.get_task_from_uuid(task_uuid).await?;
        let worker_uuid = task.worker_uuid.ok_or_else(|| {
            StrategySnafu {
                message: format!("task {task_uuid} has no worker assigned"),
            }
            .build()
        })?;
        let uuid_in_manager = self
            .funtask_manager
            .dispatch_fun_task(
                worker_uuid,
                &task.func,
                task.result_as_state,
                timeout_duration(task.timeout),
                task.argument.clone(),
            )
            .await?;
        self.repository
            .update_task(task_uuid, TaskPatch {
                status: Some(TaskStatus::Queued),
                uuid_in_manager: Some(uuid_in_manager),
                ..TaskPatch::default()
            })
            .await
    }

    /// Register one cron entry per time point of the cron task.
    /// Disabled cron tasks register nothing.
    pub async fn assign_cron_task(&self, task_uuid: CronTaskUuid) -> Result<()> {
        let cron_task = self.repository.get_cron_task_from_uuid(task_uuid).await?;
        if cron_task.disabled {
            info!(cron_task = %task_uuid, "cron task is disabled, skipping registration");
            return Ok(());
        }

        for time_point in &cron_task.timepoints {
            let name = cron_entry_name(&cron_task, time_point);
            let callback = self.fire_callback(&cron_task);
            let at = time_point.at.as_deref();
            match time_point.unit {
                TimeUnit::Millisecond => {
                    self.cron
                        .every_n_milliseconds(&name, time_point.n, callback)
                        .await?;
                }
                TimeUnit::Second => {
                    self.cron
                        .every_n_seconds(&name, time_point.n, callback, at)
                        .await?;
                }
                TimeUnit::Minute => {
                    self.cron
                        .every_n_minutes(&name, time_point.n, callback, at)
                        .await?;
                }
                TimeUnit::Hour => {
                    self.cron
                        .every_n_hours(&name, time_point.n, callback, at)
                        .await?;
                }
                TimeUnit::Day => {
                    self.cron
                        .every_n_days(&name, time_point.n, callback, at)
                        .await?;
                }
                TimeUnit::Week => {
                    self.cron
                        .every_n_weeks(&name, time_point.n, callback, at)
                        .await?;
                }
            }
            debug!(cron_task = %task_uuid, entry = %name, "cron entry registered");
        }
        Ok(())
    }

    /// Cancel every cron entry registered for this cron task.
    /// Idempotent.
    pub async fn remove_cron_task(&self, task_uuid: CronTaskUuid) -> Result<bool> {
        let names = self.cron.get_all().await?;
        let prefix = task_uuid.to_string();
        for name in names.iter().filter(|name| name.starts_with(&prefix)) {
            self.cron.cancel(name).await?;
        }
        Ok(true)
    }

    /// The cron tasks this node currently holds registrations for.
    pub async fn get_all_cron_task(&self) -> Result<Vec<CronTaskUuid>> {
        let names = self.cron.get_all().await?;
        let mut uuids: Vec<CronTaskUuid> =
            names.iter().filter_map(|name| cron_uuid_from_name(name)).collect();
        uuids.sort_unstable();
        uuids.dedup();
        Ok(uuids)
    }

    fn fire_callback(&self, cron_task: &CronTask) -> CronCallback {
        let scheduler = self.clone();
        let cron_task = cron_task.clone();
        Arc::new(move || {
            let scheduler = scheduler.clone();
            let cron_task = cron_task.clone();
            Box::pin(async move {
                // Errors abandon this fire only; the registration
                // survives for the next one.
                if let Err(error) = scheduler.create_cron_sub_task(&cron_task).await {
                    warn!(cron_task = %cron_task.uuid, %error, "cron fire abandoned");
                }
            })
        })
    }

    /// One cron fire: resolve strategies, pick a worker, and admit the
    /// materialised task to its queue under the per-worker lock.
    pub async fn create_cron_sub_task(&self, cron_task: &CronTask) -> Result<()> {
        let info = cron_task.strategy_info();
        let argument_strategy = self
            .udfs
            .resolve_argument(cron_task.argument_generate_strategy.clone(), &info)
            .await?;
        let worker_strategy = self
            .udfs
            .resolve_worker_choose(cron_task.worker_choose_strategy.clone(), &info)
            .await?;

        let Some(worker) = self.choose_worker(cron_task, &worker_strategy).await? else {
            return Ok(());
        };

        let _guard = self.lock.lock(&worker.to_string(), None).await?;

        let queue_strategy = self
            .udfs
            .resolve_queue_full(cron_task.task_queue_strategy.clone(), &info)
            .await?;
        let Some(new_task_uuid) = self
            .materialise_argument(cron_task, &argument_strategy, worker)
            .await?
        else {
            return Ok(());
        };

        let queue_size = self.funtask_manager.get_task_queue_size(worker).await? as u64;
        if queue_size < cron_task.task_queue_max_size {
            self.assign_task(new_task_uuid).await?;
        } else {
            match queue_strategy {
                QueueFullStrategy::Drop => {}
                QueueFullStrategy::Skip => {
                    self.repository
                        .change_task_status(new_task_uuid, TaskStatus::Skip)
                        .await?;
                }
                QueueFullStrategy::Seize => self.assign_task(new_task_uuid).await?,
                QueueFullStrategy::Udf(_) => {
                    return StrategySnafu {
                        message: "task queue strategy did not resolve".to_string(),
                    }
                    .fail();
                }
            }
        }
        Ok(())
    }

    async fn choose_worker(
        &self,
        cron_task: &CronTask,
        strategy: &WorkerChooseStrategy,
    ) -> Result<Option<WorkerUuid>> {
        use rand::seq::IndexedRandom;

        match strategy {
            WorkerChooseStrategy::Static { worker } => Ok(Some(*worker)),
            WorkerChooseStrategy::RandomFromList { workers } => {
                let chosen = workers.choose(&mut rand::rng()).ok_or_else(|| {
                    StrategySnafu {
                        message: format!("cron task {} has an empty worker list", cron_task.uuid),
                    }
                    .build()
                })?;
                Ok(Some(*chosen))
            }
            WorkerChooseStrategy::RandomFromWorkerTags { tags } => {
                let workers = self.repository.get_workers_from_tags(tags).await?;
                if let Some(worker) = workers.choose(&mut rand::rng()) {
                    Ok(Some(worker.uuid))
                } else {
                    // No dispatch: record the fire as a skipped task so
                    // the miss stays visible.
                    self.repository
                        .add_task(self.sub_task(
                            cron_task,
                            TaskStatus::Skip,
                            None,
                            None,
                            format!("no worker of tag {tags:?}"),
                        ))
                        .await?;
                    Ok(None)
                }
            }
            WorkerChooseStrategy::Udf(_) => StrategySnafu {
                message: "worker choose strategy did not resolve".to_string(),
            }
            .fail(),
        }
    }

    /// Persist the task this fire materialises. Returns the new task's
    /// uuid when it should be assigned; `None` means the fire ended
    /// here (dropped, skipped, or failed into a terminal task).
    async fn materialise_argument(
        &self,
        cron_task: &CronTask,
        strategy: &ArgumentStrategy,
        worker: WorkerUuid,
    ) -> Result<Option<TaskUuid>> {
        match strategy {
            ArgumentStrategy::Drop => Ok(None),
            ArgumentStrategy::Skip => {
                self.repository
                    .add_task(self.sub_task(
                        cron_task,
                        TaskStatus::Skip,
                        None,
                        Some(worker),
                        String::new(),
                    ))
                    .await?;
                Ok(None)
            }
            ArgumentStrategy::Static { value } => {
                let uuid = self
                    .repository
                    .add_task(self.sub_task(
                        cron_task,
                        TaskStatus::Scheduled,
                        Some(value.clone()),
                        Some(worker),
                        String::new(),
                    ))
                    .await?;
                Ok(Some(uuid))
            }
            ArgumentStrategy::FromQueueEndDrop { queue }
            | ArgumentStrategy::FromQueueEndSkip { queue }
            | ArgumentStrategy::FromQueueEndRepeatLatest { queue } => {
                self.materialise_from_queue(cron_task, strategy, queue, worker)
                    .await
            }
            ArgumentStrategy::Udf(_) => StrategySnafu {
                message: "argument strategy did not resolve".to_string(),
            }
            .fail(),
        }
    }

    async fn materialise_from_queue(
        &self,
        cron_task: &CronTask,
        strategy: &ArgumentStrategy,
        queue: &str,
        worker: WorkerUuid,
    ) -> Result<Option<TaskUuid>> {
        let argument_queue = self.argument_queues.queue(queue);

        if let Some(argument) = argument_queue.get(Some(Duration::ZERO)).await? {
            let uuid = self
                .repository
                .add_task(self.sub_task(
                    cron_task,
                    TaskStatus::Scheduled,
                    Some(argument),
                    Some(worker),
                    String::new(),
                ))
                .await?;
            return Ok(Some(uuid));
        }

        // The argument queue is empty: the strategy's suffix decides.
        match strategy {
            ArgumentStrategy::FromQueueEndDrop { .. } => Ok(None),
            ArgumentStrategy::FromQueueEndSkip { .. } => {
                self.repository
                    .add_task(self.sub_task(
                        cron_task,
                        TaskStatus::Skip,
                        None,
                        Some(worker),
                        String::new(),
                    ))
                    .await?;
                Ok(None)
            }
            ArgumentStrategy::FromQueueEndRepeatLatest { .. } => {
                match argument_queue.get_front().await {
                    Ok(argument) => {
                        let uuid = self
                            .repository
                            .add_task(self.sub_task(
                                cron_task,
                                TaskStatus::Scheduled,
                                Some(argument),
                                Some(worker),
                                String::new(),
                            ))
                            .await?;
                        Ok(Some(uuid))
                    }
                    Err(Error::EmptyQueue { .. }) => {
                        self.repository
                            .add_task(self.sub_task(
                                cron_task,
                                TaskStatus::Error,
                                None,
                                Some(worker),
                                "empty argument queue on from_queue_end_repeat_latest mode"
                                    .to_string(),
                            ))
                            .await?;
                        Ok(None)
                    }
                    Err(error) => Err(error),
                }
            }
            _ => unreachable!("caller only passes from-queue strategies"),
        }
    }

    fn sub_task(
        &self,
        cron_task: &CronTask,
        status: TaskStatus,
        argument: Option<Bytes>,
        worker: Option<WorkerUuid>,
        result: String,
    ) -> Task {
        Task {
            uuid: TaskUuid::new(),
            parent_task: Some(cron_task.uuid),
            uuid_in_manager: None,
            worker_uuid: worker,
            status,
            func: cron_task.func.clone(),
            argument,
            result_as_state: cron_task.result_as_state,
            timeout: cron_task.timeout,
            description: cron_task.description.clone(),
            result,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_entry_names_embed_uuid_and_timepoint() {
        let uuid: CronTaskUuid = CronTaskUuid::new();
        let name = format!("{uuid}/second:1");
        assert_eq!(cron_uuid_from_name(&name), Some(uuid));
        assert_eq!(cron_uuid_from_name("not-a-uuid/second:1"), None);
    }

    #[test]
    fn timeout_conversion_rejects_nonsense() {
        assert_eq!(timeout_duration(None), None);
        assert_eq!(timeout_duration(Some(-1.0)), None);
        assert_eq!(timeout_duration(Some(f64::NAN)), None);
        assert_eq!(
            timeout_duration(Some(1.5)),
            Some(Duration::from_millis(1500))
        );
    }
}
