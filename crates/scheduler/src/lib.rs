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

//! The taskgrid control plane.
//!
//! Every scheduler node runs a [`WorkerScheduler`] that turns cron-task
//! fires into concrete tasks: strategies are resolved to fixed points,
//! a worker is selected, and queue admission happens under a per-worker
//! distributed lock. The elected leader additionally runs the
//! [`LeaderScheduler`], which partitions cron-task ownership across
//! nodes and rebalances it. [`Scheduler`] is the top-level run loop
//! tying the two roles together.
//!
//! Persistence, cron timers, distributed locks and leader election are
//! collaborators behind the traits in [`interface`]; this crate commits
//! to their contracts, not their implementations.

pub mod interface;
mod leader;
mod scheduler;
mod strategy;
mod worker_scheduler;

pub use leader::LeaderScheduler;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use strategy::{ArgumentUdf, MAX_RESOLVE_DEPTH, QueueFullUdf, UdfRegistry, WorkerChooseUdf};
pub use worker_scheduler::WorkerScheduler;
