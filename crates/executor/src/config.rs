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

use std::time::Duration;

use bon::Builder;
use smart_default::SmartDefault;

/// Configuration of the worker manager and the runtimes it spawns.
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct WorkerManagerConfig {
    /// Interval between liveness records a worker emits on the status
    /// queue.
    #[default(Duration::from_secs(1))]
    #[builder(default = Duration::from_secs(1))]
    pub heartbeat_interval: Duration,

    /// Upper bound a worker waits on its task queue per loop turn
    /// before re-checking control messages and heartbeat cadence.
    #[default(Duration::from_millis(100))]
    #[builder(default = Duration::from_millis(100))]
    pub task_poll_interval: Duration,
}
