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

//! Single-process taskgrid node.
//!
//! Wires the whole stack together with the in-process providers: queue
//! factories, worker manager, function registry, repository, cron
//! timer, lock, leader control and the scheduler run loop. A handle
//! controls graceful shutdown.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bon::Builder;
use bytes::Bytes;
use smart_default::SmartDefault;
use snafu::{ResultExt, Whatever};
use taskgrid_base::{
    SchedulerNode, SchedulerNodeUuid, StatusReport, Worker, WorkerStatus, WorkerUuid,
};
use taskgrid_executor::{
    FunTaskManager, FuncRegistry, LocalWorkerManager, WorkerManagerConfig,
};
use taskgrid_providers::{
    LocalFunTaskManager, LocalLeaderControl, LocalLock, LocalSchedulerRpc, MemRepository, TokioCron,
};
use taskgrid_queue::{MemoryQueue, MemoryQueueFactory, Queue, QueueFactory};
use taskgrid_scheduler::{
    LeaderScheduler, Scheduler, SchedulerConfig, UdfRegistry, WorkerScheduler,
    interface::{Cron, DistributeLock, LeaderSchedulerRpc, Repository, RpcFunTaskManager},
};
use taskgrid_telemetry::{self as telemetry, LoggingOptions};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// Configuration for a single-process node.
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct NodeConfig {
    #[builder(default)]
    pub scheduler: SchedulerConfig,

    #[builder(default)]
    pub worker_manager: WorkerManagerConfig,

    #[builder(default)]
    pub logging: LoggingOptions,

    /// Workers spawned (and registered in the repository) at startup.
    #[default = 1]
    #[builder(default = 1)]
    pub initial_workers: usize,

    /// Tags the initial workers advertise.
    #[default(_code = "Vec::new()")]
    #[builder(default)]
    pub worker_tags: Vec<String>,
}

impl NodeConfig {
    /// Start a node with this configuration.
    pub async fn open(self) -> Result<NodeHandle, Whatever> { Node::start(self).await }
}

/// Handle for a running node.
pub struct NodeHandle {
    running:      Arc<AtomicBool>,
    cancel:       CancellationToken,
    run:          Option<tokio::task::JoinHandle<()>>,
    _log_guards:  Vec<WorkerGuard>,
    /// The node's shared pieces, exposed so embedders (and the CLI) can
    /// register functions and submit cron tasks.
    pub repository: Arc<MemRepository>,
    pub registry:   Arc<FuncRegistry>,
    pub udfs:       Arc<UdfRegistry>,
    pub worker_scheduler: Arc<WorkerScheduler>,
    pub task_manager: Arc<dyn RpcFunTaskManager>,
    pub workers: Vec<WorkerUuid>,
}

impl NodeHandle {
    /// Initiate graceful shutdown.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown");
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    /// Wait until the run loop has exited.
    pub async fn wait_for_shutdown(&mut self) {
        self.cancel.cancelled().await;
        if let Some(run) = self.run.take() {
            let _ = run.await;
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

struct Node;

impl Node {
    async fn start(config: NodeConfig) -> Result<NodeHandle, Whatever> {
        let log_guards = telemetry::logging::init_global_logging("taskgrid", &config.logging);
        telemetry::set_panic_hook();

        info!("Starting taskgrid node");

        // Data plane. Workers resolve function bodies through the
        // shared registry on their own threads.
        let registry = Arc::new(FuncRegistry::new());
        let status_queue: Arc<dyn Queue<StatusReport>> =
            Arc::new(MemoryQueue::new("status_queue"));
        let worker_manager = Arc::new(LocalWorkerManager::new(
            config.worker_manager.clone(),
            Arc::new(MemoryQueueFactory::new()),
            Arc::new(MemoryQueueFactory::new()),
            status_queue.clone(),
            registry.clone(),
        ));
        let funtask = Arc::new(FunTaskManager::new(worker_manager, status_queue));
        let task_manager: Arc<dyn RpcFunTaskManager> =
            Arc::new(LocalFunTaskManager::new(funtask));

        // Control plane collaborators.
        let repository = Arc::new(MemRepository::new());
        let cron = Arc::new(TokioCron::new());
        let udfs = Arc::new(UdfRegistry::new());
        let argument_queues = Arc::new(MemoryQueueFactory::<Bytes>::new());
        let lock = Arc::new(LocalLock::new());

        let worker_scheduler = Arc::new(WorkerScheduler::new(
            task_manager.clone(),
            repository.clone() as Arc<dyn Repository>,
            cron as Arc<dyn Cron>,
            argument_queues as Arc<dyn QueueFactory<Bytes>>,
            lock as Arc<dyn DistributeLock>,
            udfs.clone(),
        ));

        let self_node = SchedulerNode {
            uuid: SchedulerNodeUuid::new(),
            ip:   "127.0.0.1".to_string(),
            port: 0,
        };
        let leader_control = Arc::new(LocalLeaderControl::new());
        leader_control.register_node(self_node.clone());
        let leader_scheduler = LeaderScheduler::new(
            Arc::new(LocalSchedulerRpc::new()) as Arc<dyn LeaderSchedulerRpc>,
            repository.clone() as Arc<dyn Repository>,
        );

        let mut workers = Vec::with_capacity(config.initial_workers);
        for index in 0..config.initial_workers {
            let uuid = task_manager
                .increase_worker()
                .await
                .whatever_context("Failed to spawn initial worker")?;
            repository
                .put_worker(Worker {
                    uuid,
                    status: WorkerStatus::Running,
                    name: Some(format!("worker-{index}")),
                    last_heart_beat: chrono::Utc::now(),
                    tags: config.worker_tags.clone(),
                })
                .await;
            workers.push(uuid);
        }

        let scheduler = Scheduler::new(
            config.scheduler,
            self_node,
            leader_control,
            leader_scheduler,
            worker_scheduler.clone(),
            task_manager.clone(),
        );

        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let run = tokio::spawn(async move { scheduler.run(run_cancel).await });

        info!(workers = workers.len(), "taskgrid node started");

        Ok(NodeHandle {
            running,
            cancel,
            run: Some(run),
            _log_guards: log_guards,
            repository,
            registry,
            udfs,
            worker_scheduler,
            task_manager,
            workers,
        })
    }
}

/// Block until ctrl-c or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn node_starts_and_shuts_down() {
        let config = NodeConfig::builder()
            .logging(LoggingOptions::builder().append_stdout(false).build())
            .initial_workers(2)
            .build();
        let mut handle = config.open().await.unwrap();
        assert!(handle.is_running());
        assert_eq!(handle.workers.len(), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;

        handle.shutdown();
        handle.wait_for_shutdown().await;
        assert!(!handle.is_running());
    }
}
