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

//! The top-level run loop of a scheduler node.
//!
//! Every tick the node drains worker status reports into the
//! repository. The elected leader additionally refreshes cluster
//! placement and rebalances on the configured cadence; everyone else
//! keeps a candidacy standing so a vacant leadership is filled within a
//! tick.

use std::{sync::Arc, time::Duration};

use bon::Builder;
use chrono::{TimeDelta, Utc};
use smart_default::SmartDefault;
use taskgrid_base::SchedulerNode;
use taskgrid_error::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    interface::{LeaderControl, RpcFunTaskManager},
    leader::LeaderScheduler,
    worker_scheduler::WorkerScheduler,
};

/// Immutable configuration of a scheduler node.
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct SchedulerConfig {
    /// Cadence of the run loop.
    #[default(Duration::from_millis(100))]
    #[builder(default = Duration::from_millis(100))]
    pub tick_interval: Duration,

    /// How often the leader re-rolls cron-task placement.
    #[default(Duration::from_secs(60))]
    #[builder(default = Duration::from_secs(60))]
    pub rebalance_frequency: Duration,

    /// Cap on status reports drained per tick so a busy status queue
    /// cannot starve the loop.
    #[default = 256]
    #[builder(default = 256)]
    pub max_status_per_tick: usize,
}

/// A scheduler node: worker-scheduler always, leader when elected.
pub struct Scheduler {
    config:           SchedulerConfig,
    self_node:        SchedulerNode,
    leader_control:   Arc<dyn LeaderControl>,
    leader_scheduler: LeaderScheduler,
    worker_scheduler: Arc<WorkerScheduler>,
    task_manager_rpc: Arc<dyn RpcFunTaskManager>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        self_node: SchedulerNode,
        leader_control: Arc<dyn LeaderControl>,
        leader_scheduler: LeaderScheduler,
        worker_scheduler: Arc<WorkerScheduler>,
        task_manager_rpc: Arc<dyn RpcFunTaskManager>,
    ) -> Self {
        Self {
            config,
            self_node,
            leader_control,
            leader_scheduler,
            worker_scheduler,
            task_manager_rpc,
        }
    }

    #[must_use]
    pub const fn worker_scheduler(&self) -> &Arc<WorkerScheduler> { &self.worker_scheduler }

    /// Drive the node until the token fires. Errors inside a tick are
    /// logged and abort that tick only.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut last_rebalance = Utc::now();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(error) = self.tick(&mut last_rebalance).await {
                warn!(node = %self.self_node.uuid, %error, "scheduler tick failed");
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.tick_interval) => {}
            }
        }
    }

    async fn tick(&self, last_rebalance: &mut chrono::DateTime<Utc>) -> Result<()> {
        let leader = self.leader_control.get_leader().await?;
        match leader {
            Some(leader) if leader.uuid == self.self_node.uuid => {
                let rebalance_after = TimeDelta::from_std(self.config.rebalance_frequency)
                    .unwrap_or(TimeDelta::MAX);
                if Utc::now() - *last_rebalance > rebalance_after {
                    *last_rebalance = Utc::now();
                    // Refresh membership first: rebalance works off the
                    // recorded placement view.
                    let nodes = self.leader_control.get_all_nodes().await?;
                    self.leader_scheduler.scheduler_node_change(nodes).await?;
                    let effective_at = *last_rebalance + rebalance_after / 2;
                    self.leader_scheduler.rebalance(effective_at).await?;
                }
            }
            _ => {
                // Keep a candidacy standing whenever we are not the
                // leader; the winner is whoever the control plane says.
                let elected = self.leader_control.elect_leader(self.self_node.uuid).await?;
                if elected {
                    debug!(node = %self.self_node.uuid, "elected as leader");
                }
            }
        }

        // Both roles drain their workers' status reports every tick.
        self.drain_status().await;
        Ok(())
    }

    async fn drain_status(&self) {
        for _ in 0..self.config.max_status_per_tick {
            let report = match self
                .task_manager_rpc
                .get_queued_status(Some(Duration::ZERO))
                .await
            {
                Ok(Some(report)) => report,
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, "failed to poll status queue");
                    break;
                }
            };
            if let Err(error) = self.worker_scheduler.process_new_status(&report).await {
                if error.is_status_change() {
                    // Logged, never retried: the report was stale.
                    warn!(%error, "rejected status change");
                } else if error.is_not_found() {
                    debug!(%error, "status report for unknown record");
                } else {
                    warn!(%error, "failed to process status report");
                }
            }
        }
    }
}
