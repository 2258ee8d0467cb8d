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

//! Cluster-level placement of cron tasks across scheduler nodes.
//!
//! Only the elected leader drives this. Placement is deliberately
//! simple: orphaned cron tasks go to a random live node, and rebalance
//! re-rolls every placement with an effective-at instant so the
//! receiving schedulers switch ownership atomically at that time.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use taskgrid_base::{CronTaskUuid, SchedulerNode};
use taskgrid_error::Result;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::interface::{LeaderSchedulerRpc, Repository};

/// The leader-side view of which node owns which cron tasks.
pub struct LeaderScheduler {
    scheduler_rpc:          Arc<dyn LeaderSchedulerRpc>,
    repository:             Arc<dyn Repository>,
    nodes:                  RwLock<Vec<SchedulerNode>>,
    node_responsible_tasks: RwLock<HashMap<SchedulerNode, Vec<CronTaskUuid>>>,
}

impl LeaderScheduler {
    #[must_use]
    pub fn new(scheduler_rpc: Arc<dyn LeaderSchedulerRpc>, repository: Arc<dyn Repository>) -> Self {
        Self {
            scheduler_rpc,
            repository,
            nodes: RwLock::new(Vec::new()),
            node_responsible_tasks: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch_responsibilities(
        &self,
        nodes: &[SchedulerNode],
    ) -> Result<HashMap<SchedulerNode, Vec<CronTaskUuid>>> {
        let mut map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let tasks = self.scheduler_rpc.get_node_task_list(node).await?;
            map.insert(node.clone(), tasks);
        }
        Ok(map)
    }

    /// React to cluster membership: refresh the ownership view and hand
    /// every cron task nobody covers to a random live node.
    pub async fn scheduler_node_change(&self, scheduler_nodes: Vec<SchedulerNode>) -> Result<()> {
        let current = self.fetch_responsibilities(&scheduler_nodes).await?;

        let all: Vec<CronTaskUuid> = self
            .repository
            .get_all_cron_task()
            .await?
            .into_iter()
            .map(|cron_task| cron_task.uuid)
            .collect();
        let covered: std::collections::HashSet<CronTaskUuid> =
            current.values().flatten().copied().collect();

        for task_uuid in all.into_iter().filter(|uuid| !covered.contains(uuid)) {
            let Some(node) = scheduler_nodes.choose(&mut rand::rng()).cloned() else {
                break;
            };
            info!(cron_task = %task_uuid, node = %node.uuid, "assigning orphaned cron task");
            self.scheduler_rpc
                .assign_task_to_node(&node, task_uuid, None)
                .await?;
        }

        *self.nodes.write().await = scheduler_nodes;
        *self.node_responsible_tasks.write().await = current;
        Ok(())
    }

    /// Re-roll every recorded placement. `rebalance_at` is handed to
    /// both sides so ownership flips at one instant instead of
    /// mid-flight.
    pub async fn rebalance(&self, rebalance_at: DateTime<Utc>) -> Result<()> {
        let nodes = self.nodes.read().await.clone();
        if nodes.is_empty() {
            return Ok(());
        }
        let placements = self.node_responsible_tasks.read().await.clone();

        for (node, tasks) in placements {
            for task_uuid in tasks {
                let target = nodes
                    .choose(&mut rand::rng())
                    .cloned()
                    .unwrap_or_else(|| node.clone());
                debug!(
                    cron_task = %task_uuid,
                    from = %node.uuid,
                    to = %target.uuid,
                    "rebalancing cron task"
                );
                self.scheduler_rpc
                    .remove_task_from_node(&node, task_uuid, Some(rebalance_at))
                    .await?;
                self.scheduler_rpc
                    .assign_task_to_node(&target, task_uuid, Some(rebalance_at))
                    .await?;
            }
        }
        Ok(())
    }
}
