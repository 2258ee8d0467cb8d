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

//! The taskgrid data plane.
//!
//! - [`WorkerRuntime`](runtime::WorkerRuntime) — the loop running inside
//!   each worker: consume task queue, execute function bodies with
//!   injected state and logger, report status.
//! - [`LocalWorkerManager`] — owns worker lifecycles and the per-worker
//!   queue triple. Each worker is isolated on a dedicated OS thread with
//!   its own single-thread runtime; the queues are the only boundary.
//! - [`FunTaskManager`] — the dispatch façade the scheduler talks to.
//! - [`FuncRegistry`] — resolves persisted function payloads into
//!   runnable callables.

mod config;
mod funtask;
mod manager;
mod metrics;
mod registry;
mod runtime;

pub use config::WorkerManagerConfig;
pub use funtask::FunTaskManager;
pub use manager::{LocalWorkerManager, WorkerLifecycle, WorkerManager};
pub use registry::FuncRegistry;
