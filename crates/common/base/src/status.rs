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

use serde::{Deserialize, Serialize};

/// Lifecycle status of a one-shot task.
///
/// The status space is a forward-only lattice: a task is created
/// `Unscheduled`/`Scheduled` (or straight into `Skip`), becomes `Queued`
/// when dispatched to a worker, `Running` on pickup, and ends in one of
/// the terminal sinks. Once terminal, a task never changes again.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Unscheduled,
    Scheduled,
    Skip,
    Queued,
    Running,
    Success,
    Error,
    Died,
}

impl TaskStatus {
    /// Terminal sinks: no transition leaves these states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Skip | Self::Success | Self::Error | Self::Died)
    }

    /// Whether a transition to `next` is permitted. Re-asserting the
    /// current status is always a no-op and allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool { !self.is_terminal() || next == self }
}

/// Lifecycle status of a worker.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Stopping,
    Stopped,
    Died,
    /// Periodic liveness record emitted by the worker runtime.
    Heartbeat,
}

/// A status carried by a report can belong to either plane: task
/// execution progress or worker liveness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    Task(TaskStatus),
    Worker(WorkerStatus),
}
