use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use taskgrid_base::{
    Func, FuncUuid, ReportedStatus, StateValue, StatusReport, TaskStatus, TaskUuid, WorkerStatus,
    task_fn,
};
use taskgrid_executor::{
    FunTaskManager, FuncRegistry, LocalWorkerManager, WorkerLifecycle, WorkerManagerConfig,
};
use taskgrid_queue::{MemoryQueue, MemoryQueueFactory, Queue};
use tokio::time::sleep;

fn setup_with_heartbeat(
    heartbeat: Duration,
) -> (Arc<LocalWorkerManager>, FunTaskManager, Arc<FuncRegistry>) {
    let status_queue: Arc<dyn Queue<StatusReport>> = Arc::new(MemoryQueue::new("status_queue"));
    let registry = Arc::new(FuncRegistry::new());
    let manager = Arc::new(LocalWorkerManager::new(
        WorkerManagerConfig::builder()
            .heartbeat_interval(heartbeat)
            .task_poll_interval(Duration::from_millis(20))
            .build(),
        Arc::new(MemoryQueueFactory::new()),
        Arc::new(MemoryQueueFactory::new()),
        status_queue.clone(),
        registry.clone(),
    ));
    let funtask = FunTaskManager::new(manager.clone(), status_queue);
    (manager, funtask, registry)
}

// A long heartbeat keeps liveness records out of the task-status
// assertions below.
fn setup() -> (Arc<LocalWorkerManager>, FunTaskManager, Arc<FuncRegistry>) {
    setup_with_heartbeat(Duration::from_secs(30))
}

/// A persisted function entity whose payload names a registry entry.
fn named_func(name: &str) -> Func {
    Func {
        uuid:             FuncUuid::new(),
        payload:          Bytes::copy_from_slice(name.as_bytes()),
        dependencies:     vec![],
        parameter_schema: None,
        name:             Some(name.to_string()),
    }
}

/// Drain the status queue into a task → last-status map, mirroring how
/// the scheduler consumes reports.
async fn drain_statuses(
    funtask: &FunTaskManager,
    statuses: &mut HashMap<TaskUuid, (TaskStatus, Option<String>)>,
) {
    while let Some(report) = funtask
        .get_queued_status(Some(Duration::from_millis(100)))
        .await
        .unwrap()
    {
        if let (Some(task), ReportedStatus::Task(status)) = (report.task_uuid, report.status) {
            statuses.insert(task, (status, report.content));
        }
    }
}

#[tokio::test]
async fn workers_spawn_and_stop() {
    let (manager, funtask, _registry) = setup();
    let workers = funtask.increase_workers(5).await.unwrap();
    assert_eq!(workers.len(), 5);

    for worker in &workers {
        funtask.stop_worker(*worker).await.unwrap();
    }
    sleep(Duration::from_millis(300)).await;

    for worker in workers {
        assert_eq!(
            manager.lifecycle(worker).await,
            Some(WorkerLifecycle::Stopped)
        );
    }
}

#[tokio::test]
async fn killed_worker_reports_died() {
    let (manager, funtask, _registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    funtask.kill_worker(worker).await.unwrap();
    sleep(Duration::from_millis(300)).await;

    assert_eq!(manager.lifecycle(worker).await, Some(WorkerLifecycle::Died));

    let mut died = false;
    while let Some(report) = funtask
        .get_queued_status(Some(Duration::from_millis(100)))
        .await
        .unwrap()
    {
        if report.status == ReportedStatus::Worker(WorkerStatus::Died) {
            died = true;
        }
    }
    assert!(died, "expected a died report on the status queue");
}

#[tokio::test]
async fn dispatched_task_executes() {
    let (_manager, funtask, registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    let flag = Arc::new(AtomicBool::new(false));
    let task_flag = flag.clone();
    registry.register(
        "side-effect",
        task_fn(move |_, logger, _| {
            let flag = task_flag.clone();
            async move {
                logger.info("side effect");
                flag.store(true, Ordering::Release);
                Ok(None)
            }
        }),
    );

    funtask
        .dispatch_fun_task(worker, named_func("side-effect"), false, None, None)
        .await
        .unwrap();
    sleep(Duration::from_millis(300)).await;

    assert!(flag.load(Ordering::Acquire));
    funtask.kill_worker(worker).await.unwrap();
}

// Function bodies resolve on the worker; a miss fails that task with an
// error report and leaves the worker running.
#[tokio::test]
async fn unresolvable_function_reports_error() {
    let (manager, funtask, registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    let unknown = funtask
        .dispatch_fun_task(worker, named_func("ghost"), false, None, None)
        .await
        .unwrap();

    registry.register("present", task_fn(|_, _, _| async { Ok(None) }));
    let mut broken = named_func("present");
    broken.dependencies = vec!["vanished".to_string()];
    let missing_dep = funtask
        .dispatch_fun_task(worker, broken, false, None, None)
        .await
        .unwrap();

    sleep(Duration::from_millis(300)).await;
    let mut statuses = HashMap::new();
    drain_statuses(&funtask, &mut statuses).await;

    assert_eq!(statuses[&unknown].0, TaskStatus::Error);
    assert!(
        statuses[&unknown]
            .1
            .as_deref()
            .unwrap_or_default()
            .contains("unknown function ghost"),
        "resolution failure should be recorded: {:?}",
        statuses[&unknown].1
    );
    assert_eq!(statuses[&missing_dep].0, TaskStatus::Error);
    assert!(
        statuses[&missing_dep]
            .1
            .as_deref()
            .unwrap_or_default()
            .contains("missing dependency vanished"),
        "dependency failure should be recorded: {:?}",
        statuses[&missing_dep].1
    );
    assert_eq!(
        manager.lifecycle(worker).await,
        Some(WorkerLifecycle::Running)
    );

    funtask.kill_worker(worker).await.unwrap();
}

#[tokio::test]
async fn statuses_flow_in_fifo_order() {
    let (_manager, funtask, registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    registry.register(
        "sleepy",
        task_fn(|_, _, _| async {
            sleep(Duration::from_millis(600)).await;
            Ok(None)
        }),
    );
    registry.register(
        "failing",
        task_fn(|_, _, _| async { Err("just err".to_string()) }),
    );

    let t1 = funtask
        .dispatch_fun_task(worker, named_func("sleepy"), false, None, None)
        .await
        .unwrap();
    let t2 = funtask
        .dispatch_fun_task(worker, named_func("sleepy"), false, None, None)
        .await
        .unwrap();
    let t_err = funtask
        .dispatch_fun_task(worker, named_func("failing"), false, None, None)
        .await
        .unwrap();

    let mut statuses = HashMap::new();
    sleep(Duration::from_millis(200)).await;
    drain_statuses(&funtask, &mut statuses).await;
    assert_eq!(statuses[&t1].0, TaskStatus::Running);
    assert_eq!(statuses[&t2].0, TaskStatus::Queued);

    sleep(Duration::from_millis(400)).await;
    drain_statuses(&funtask, &mut statuses).await;
    assert_eq!(statuses[&t1].0, TaskStatus::Success);
    assert_eq!(statuses[&t2].0, TaskStatus::Running);

    sleep(Duration::from_millis(600)).await;
    drain_statuses(&funtask, &mut statuses).await;
    assert_eq!(statuses[&t2].0, TaskStatus::Success);
    assert_eq!(statuses[&t_err].0, TaskStatus::Error);
    assert_eq!(statuses[&t_err].1.as_deref(), Some("just err"));

    funtask.kill_worker(worker).await.unwrap();
}

#[tokio::test]
async fn state_regeneration_chains_across_tasks() {
    let (_manager, funtask, registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    registry.register(
        "seed",
        task_fn(|_, _, _| async { Ok(Some(Arc::new(2_i64) as StateValue)) }),
    );
    registry.register(
        "increment",
        task_fn(|state, _, _| async move {
            let current = state
                .as_ref()
                .and_then(|s| s.downcast_ref::<i64>().copied())
                .ok_or_else(|| "state missing".to_string())?;
            Ok(Some(Arc::new(current + 1) as StateValue))
        }),
    );

    let written = Arc::new(Mutex::new(None::<i64>));
    let sink = written.clone();
    registry.register(
        "writer",
        task_fn(move |state, _, _| {
            let sink = sink.clone();
            async move {
                let current = state.as_ref().and_then(|s| s.downcast_ref::<i64>().copied());
                *sink.lock().unwrap() = current;
                Ok(None)
            }
        }),
    );

    funtask
        .generate_worker_state(worker, named_func("seed"), None, None)
        .await
        .unwrap();
    funtask
        .generate_worker_state(worker, named_func("increment"), None, None)
        .await
        .unwrap();
    funtask
        .dispatch_fun_task(worker, named_func("writer"), false, None, None)
        .await
        .unwrap();

    sleep(Duration::from_millis(400)).await;
    assert_eq!(*written.lock().unwrap(), Some(3));

    funtask.kill_worker(worker).await.unwrap();
}

#[tokio::test]
async fn kill_targets_one_task_only() {
    let (_manager, funtask, registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    registry.register(
        "slow",
        task_fn(|_, _, _| async {
            sleep(Duration::from_secs(1)).await;
            Ok(None)
        }),
    );
    registry.register(
        "quick",
        task_fn(|_, _, _| async {
            sleep(Duration::from_millis(50)).await;
            Ok(None)
        }),
    );

    let t1 = funtask
        .dispatch_fun_task(worker, named_func("slow"), false, None, None)
        .await
        .unwrap();
    let t2 = funtask
        .dispatch_fun_task(worker, named_func("quick"), false, None, None)
        .await
        .unwrap();

    sleep(Duration::from_millis(300)).await;
    funtask.stop_task(worker, t1).await.unwrap();
    sleep(Duration::from_millis(500)).await;

    let mut statuses = HashMap::new();
    drain_statuses(&funtask, &mut statuses).await;

    assert_eq!(statuses[&t1].0, TaskStatus::Error);
    assert!(
        statuses[&t1].1.as_deref().unwrap_or_default().contains("killed"),
        "kill reason should be recorded: {:?}",
        statuses[&t1].1
    );
    assert_eq!(statuses[&t2].0, TaskStatus::Success);

    funtask.kill_worker(worker).await.unwrap();
}

#[tokio::test]
async fn overrunning_task_times_out() {
    let (_manager, funtask, registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    registry.register(
        "slow",
        task_fn(|_, _, _| async {
            sleep(Duration::from_millis(800)).await;
            Ok(None)
        }),
    );
    let task = funtask
        .dispatch_fun_task(
            worker,
            named_func("slow"),
            false,
            Some(Duration::from_millis(100)),
            None,
        )
        .await
        .unwrap();

    sleep(Duration::from_millis(400)).await;
    let mut statuses = HashMap::new();
    drain_statuses(&funtask, &mut statuses).await;

    assert_eq!(statuses[&task].0, TaskStatus::Error);
    assert!(
        statuses[&task]
            .1
            .as_deref()
            .unwrap_or_default()
            .contains("timeout"),
        "timeout reason should be recorded: {:?}",
        statuses[&task].1
    );

    funtask.kill_worker(worker).await.unwrap();
}

#[tokio::test]
async fn panicking_task_reports_error_and_worker_survives() {
    let (manager, funtask, registry) = setup();
    let worker = funtask.increase_worker().await.unwrap();

    registry.register(
        "bomb",
        task_fn(|_, _, _| async {
            panic!("boom");
            #[allow(unreachable_code)]
            Ok(None)
        }),
    );
    let flag = Arc::new(AtomicBool::new(false));
    let task_flag = flag.clone();
    registry.register(
        "after",
        task_fn(move |_, _, _| {
            let flag = task_flag.clone();
            async move {
                flag.store(true, Ordering::Release);
                Ok(None)
            }
        }),
    );

    let task = funtask
        .dispatch_fun_task(worker, named_func("bomb"), false, None, None)
        .await
        .unwrap();
    funtask
        .dispatch_fun_task(worker, named_func("after"), false, None, None)
        .await
        .unwrap();

    sleep(Duration::from_millis(400)).await;
    let mut statuses = HashMap::new();
    drain_statuses(&funtask, &mut statuses).await;

    assert_eq!(statuses[&task].0, TaskStatus::Error);
    assert!(flag.load(Ordering::Acquire), "worker should keep running");
    assert_eq!(
        manager.lifecycle(worker).await,
        Some(WorkerLifecycle::Running)
    );

    funtask.kill_worker(worker).await.unwrap();
}

#[tokio::test]
async fn workers_emit_heartbeats() {
    let (_manager, funtask, _registry) = setup_with_heartbeat(Duration::from_millis(100));
    let worker = funtask.increase_worker().await.unwrap();

    sleep(Duration::from_millis(350)).await;
    funtask.kill_worker(worker).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    let mut heartbeats = 0;
    while let Some(report) = funtask
        .get_queued_status(Some(Duration::from_millis(100)))
        .await
        .unwrap()
    {
        if report.worker_uuid == worker
            && report.status == ReportedStatus::Worker(WorkerStatus::Heartbeat)
        {
            heartbeats += 1;
        }
    }
    assert!(heartbeats >= 2, "expected repeated heartbeats, got {heartbeats}");
}
