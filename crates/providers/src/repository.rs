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

//! In-memory system of record.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskgrid_base::{
    CronTask, CronTaskUuid, Func, FuncGroup, FuncGroupUuid, FuncParameterSchema, FuncUuid,
    ParameterSchemaUuid, Task, TaskStatus, TaskUuid, Worker, WorkerStatus, WorkerUuid,
};
use taskgrid_error::{RecordNotFoundSnafu, Result};
use taskgrid_scheduler::interface::{Repository, TaskPatch};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    tasks:      HashMap<TaskUuid, Task>,
    cron_tasks: HashMap<CronTaskUuid, CronTask>,
    workers:    HashMap<WorkerUuid, Worker>,
    funcs:      HashMap<FuncUuid, Func>,
    groups:     HashMap<FuncGroupUuid, FuncGroup>,
    schemas:    HashMap<ParameterSchemaUuid, FuncParameterSchema>,
}

impl Tables {
    /// Status reports address tasks by their runtime handle; task
    /// lookups resolve `uuid_in_manager` alongside the primary uuid.
    fn resolve_task_uuid(&self, uuid: TaskUuid) -> Option<TaskUuid> {
        if self.tasks.contains_key(&uuid) {
            return Some(uuid);
        }
        self.tasks
            .values()
            .find(|task| task.uuid_in_manager == Some(uuid))
            .map(|task| task.uuid)
    }
}

/// Repository over in-process hash tables; the single-node and test
/// backing store.
#[derive(Default)]
pub struct MemRepository {
    tables: RwLock<Tables>,
}

impl MemRepository {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Seed a worker row; workers register out-of-band in production.
    pub async fn put_worker(&self, worker: Worker) {
        self.tables.write().await.workers.insert(worker.uuid, worker);
    }

    /// All tasks materialised from one cron task, in creation order.
    pub async fn tasks_with_parent(&self, parent: CronTaskUuid) -> Vec<Task> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|task| task.parent_task == Some(parent))
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.created_at);
        tasks
    }

    pub async fn all_tasks(&self) -> Vec<Task> {
        self.tables.read().await.tasks.values().cloned().collect()
    }
}

#[async_trait]
impl Repository for MemRepository {
    async fn get_task_from_uuid(&self, uuid: TaskUuid) -> Result<Task> {
        let tables = self.tables.read().await;
        tables
            .resolve_task_uuid(uuid)
            .and_then(|uuid| tables.tasks.get(&uuid).cloned())
            .ok_or_else(|| {
                RecordNotFoundSnafu {
                    entity: "task",
                    uuid:   uuid.to_string(),
                }
                .build()
            })
    }

    async fn get_cron_task_from_uuid(&self, uuid: CronTaskUuid) -> Result<CronTask> {
        self.tables
            .read()
            .await
            .cron_tasks
            .get(&uuid)
            .cloned()
            .ok_or_else(|| {
                RecordNotFoundSnafu {
                    entity: "cron_task",
                    uuid:   uuid.to_string(),
                }
                .build()
            })
    }

    async fn get_worker_from_uuid(&self, uuid: WorkerUuid) -> Result<Worker> {
        self.tables
            .read()
            .await
            .workers
            .get(&uuid)
            .cloned()
            .ok_or_else(|| {
                RecordNotFoundSnafu {
                    entity: "worker",
                    uuid:   uuid.to_string(),
                }
                .build()
            })
    }

    async fn get_workers_from_tags(&self, tags: &[String]) -> Result<Vec<Worker>> {
        Ok(self
            .tables
            .read()
            .await
            .workers
            .values()
            .filter(|worker| tags.iter().any(|tag| worker.tags.contains(tag)))
            .cloned()
            .collect())
    }

    async fn get_tasks_on_worker(&self, worker: WorkerUuid) -> Result<Vec<Task>> {
        Ok(self
            .tables
            .read()
            .await
            .tasks
            .values()
            .filter(|task| task.worker_uuid == Some(worker))
            .cloned()
            .collect())
    }

    async fn get_all_cron_task(&self) -> Result<Vec<CronTask>> {
        Ok(self.tables.read().await.cron_tasks.values().cloned().collect())
    }

    async fn add_task(&self, task: Task) -> Result<TaskUuid> {
        let uuid = task.uuid;
        self.tables.write().await.tasks.insert(uuid, task);
        Ok(uuid)
    }

    async fn add_cron_task(&self, cron_task: CronTask) -> Result<CronTaskUuid> {
        let uuid = cron_task.uuid;
        self.tables.write().await.cron_tasks.insert(uuid, cron_task);
        Ok(uuid)
    }

    async fn add_func(&self, func: Func) -> Result<FuncUuid> {
        let uuid = func.uuid;
        self.tables.write().await.funcs.insert(uuid, func);
        Ok(uuid)
    }

    async fn add_func_group(&self, group: FuncGroup) -> Result<FuncGroupUuid> {
        let uuid = group.uuid;
        self.tables.write().await.groups.insert(uuid, group);
        Ok(uuid)
    }

    async fn add_func_parameter_schema(
        &self,
        schema: FuncParameterSchema,
    ) -> Result<ParameterSchemaUuid> {
        let uuid = schema.uuid;
        self.tables.write().await.schemas.insert(uuid, schema);
        Ok(uuid)
    }

    async fn change_task_status(&self, uuid: TaskUuid, status: TaskStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let primary = tables.resolve_task_uuid(uuid);
        let task = primary
            .and_then(|uuid| tables.tasks.get_mut(&uuid))
            .ok_or_else(|| {
                RecordNotFoundSnafu {
                    entity: "task",
                    uuid:   uuid.to_string(),
                }
                .build()
            })?;
        task.status = status;
        Ok(())
    }

    async fn update_task(&self, uuid: TaskUuid, patch: TaskPatch) -> Result<()> {
        let mut tables = self.tables.write().await;
        let primary = tables.resolve_task_uuid(uuid);
        let task = primary
            .and_then(|uuid| tables.tasks.get_mut(&uuid))
            .ok_or_else(|| {
                RecordNotFoundSnafu {
                    entity: "task",
                    uuid:   uuid.to_string(),
                }
                .build()
            })?;
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(uuid_in_manager) = patch.uuid_in_manager {
            task.uuid_in_manager = Some(uuid_in_manager);
        }
        if let Some(worker_uuid) = patch.worker_uuid {
            task.worker_uuid = Some(worker_uuid);
        }
        if let Some(result) = patch.result {
            task.result = result;
        }
        Ok(())
    }

    async fn update_task_uuid_in_manager(
        &self,
        uuid: TaskUuid,
        uuid_in_manager: TaskUuid,
    ) -> Result<()> {
        self.update_task(uuid, TaskPatch {
            uuid_in_manager: Some(uuid_in_manager),
            ..TaskPatch::default()
        })
        .await
    }

    async fn update_worker_last_heart_beat_time(
        &self,
        uuid: WorkerUuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let worker = tables.workers.get_mut(&uuid).ok_or_else(|| {
            RecordNotFoundSnafu {
                entity: "worker",
                uuid:   uuid.to_string(),
            }
            .build()
        })?;
        // Heartbeat freshness only ever moves forward.
        if at > worker.last_heart_beat {
            worker.last_heart_beat = at;
        }
        Ok(())
    }

    async fn update_worker_status(&self, uuid: WorkerUuid, status: WorkerStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let worker = tables.workers.get_mut(&uuid).ok_or_else(|| {
            RecordNotFoundSnafu {
                entity: "worker",
                uuid:   uuid.to_string(),
            }
            .build()
        })?;
        worker.status = status;
        Ok(())
    }
}
