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

//! In-process implementations of the scheduler's collaborator traits.
//!
//! These back a single-process node and the integration suites: a tokio
//! cron timer, a process-local distributed lock, an in-memory
//! repository, a trivial leader control, and local adapters bridging
//! the RPC façades straight onto the executor crate.

mod cron;
mod leader_control;
mod lock;
mod repository;
mod rpc;

pub use cron::TokioCron;
pub use leader_control::LocalLeaderControl;
pub use lock::LocalLock;
pub use repository::MemRepository;
pub use rpc::{LocalFunTaskManager, LocalSchedulerRpc};
