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

//! Pluggable scheduling policies attached to a cron task.
//!
//! Each of the three policies (argument sourcing, worker selection,
//! queue-full handling) is a closed sum type with a `Udf` escape hatch:
//! a reference to a registered function that, given the flattened cron
//! task fields, returns another strategy. Udf resolution is a bounded
//! fixed-point performed by the scheduler.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::id::{FuncUuid, WorkerUuid};

/// Context handed to strategy UDFs: the flattened fields of the firing
/// cron task, merged with the UDF's `extra` map.
pub type StrategyInfo = serde_json::Map<String, serde_json::Value>;

/// Reference to a user-defined strategy function plus its static extras.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UdfSpec {
    pub func:  FuncUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<StrategyInfo>,
}

/// How the argument of a materialised task is produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ArgumentStrategy {
    /// Produce nothing: the fire is abandoned and no task is persisted.
    Drop,
    /// Persist a task in `Skip` state with no argument.
    Skip,
    /// Persist a scheduled task carrying a fixed argument.
    Static { value: Bytes },
    /// Consume the front of a named argument queue; on empty, drop.
    FromQueueEndDrop { queue: String },
    /// Consume the front of a named argument queue; on empty, skip.
    FromQueueEndSkip { queue: String },
    /// Consume the front of a named argument queue; on empty, repeat the
    /// latest value without consuming it.
    FromQueueEndRepeatLatest { queue: String },
    Udf(UdfSpec),
}

impl ArgumentStrategy {
    #[must_use]
    pub const fn is_udf(&self) -> bool { matches!(self, Self::Udf(_)) }
}

/// How the target worker of a materialised task is selected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WorkerChooseStrategy {
    Static { worker: WorkerUuid },
    RandomFromList { workers: Vec<WorkerUuid> },
    RandomFromWorkerTags { tags: Vec<String> },
    Udf(UdfSpec),
}

impl WorkerChooseStrategy {
    #[must_use]
    pub const fn is_udf(&self) -> bool { matches!(self, Self::Udf(_)) }
}

/// What to do when the chosen worker's task queue has no room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QueueFullStrategy {
    /// Abandon the fire; the persisted task stays `Scheduled`.
    Drop,
    /// Mark the persisted task `Skip`.
    Skip,
    /// Enqueue regardless of backpressure.
    Seize,
    Udf(UdfSpec),
}

impl QueueFullStrategy {
    #[must_use]
    pub const fn is_udf(&self) -> bool { matches!(self, Self::Udf(_)) }
}
