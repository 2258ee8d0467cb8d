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

//! Persisted entities.
//!
//! The repository is the system of record for all of these. Cross-entity
//! references are by uuid, never by object graph; the repository
//! resolves them on demand.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    id::{
        CronTaskUuid, FuncGroupUuid, FuncUuid, ParameterSchemaUuid, SchedulerNodeUuid, TaskUuid,
        WorkerUuid,
    },
    status::{TaskStatus, WorkerStatus},
    strategy::{ArgumentStrategy, QueueFullStrategy, StrategyInfo, WorkerChooseStrategy},
};

/// A registered function body: an opaque serialised payload plus the
/// ordered names of the registry entries it depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Func {
    pub uuid:             FuncUuid,
    /// Serialised function body, resolved by the data plane's registry.
    pub payload:          Bytes,
    /// Registry names this function needs loaded before it runs.
    #[serde(default)]
    pub dependencies:     Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_schema: Option<ParameterSchemaUuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:             Option<String>,
}

/// A named collection of functions, persisted for API parity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncGroup {
    pub uuid:  FuncGroupUuid,
    pub funcs: Vec<FuncUuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:  Option<String>,
}

/// JSON schema describing the parameters a function accepts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncParameterSchema {
    pub uuid:        ParameterSchemaUuid,
    pub json_schema: String,
}

/// Granularity of a cron time point.
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
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

/// A single recurrence: every `n` `unit`s, optionally aligned `at` a
/// unit-specific instant (e.g. minute-of-hour).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePoint {
    pub unit: TimeUnit,
    pub n:    u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at:   Option<String>,
}

impl TimePoint {
    #[must_use]
    pub const fn new(unit: TimeUnit, n: u32) -> Self { Self { unit, n, at: None } }
}

impl std::fmt::Display for TimePoint {
    /// Deterministic rendering; cron entry names embed this, so the
    /// format is part of the registration contract.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.at {
            Some(at) => write!(f, "{}:{}@{}", self.unit, self.n, at),
            None => write!(f, "{}:{}", self.unit, self.n),
        }
    }
}

/// A one-shot task instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub uuid:            TaskUuid,
    /// The cron task this instance was materialised from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task:     Option<CronTaskUuid>,
    /// Runtime handle minted by the worker manager at dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid_in_manager: Option<TaskUuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_uuid:     Option<WorkerUuid>,
    pub status:          TaskStatus,
    pub func:            Func,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument:        Option<Bytes>,
    pub result_as_state: bool,
    /// Wall-clock execution bound in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout:         Option<f64>,
    pub description:     String,
    pub result:          String,
    pub created_at:      DateTime<Utc>,
}

/// A recurring definition producing tasks at one or more time points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CronTask {
    pub uuid:                       CronTaskUuid,
    pub name:                       String,
    pub timepoints:                 Vec<TimePoint>,
    pub func:                       Func,
    pub argument_generate_strategy: ArgumentStrategy,
    pub worker_choose_strategy:     WorkerChooseStrategy,
    pub task_queue_strategy:        QueueFullStrategy,
    /// Admission bound checked against the worker's task queue depth.
    pub task_queue_max_size:        u64,
    pub result_as_state:            bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout:                    Option<f64>,
    pub description:                String,
    pub disabled:                   bool,
    pub created_at:                 DateTime<Utc>,
}

impl CronTask {
    /// Flattened fields handed to strategy UDFs.
    #[must_use]
    pub fn strategy_info(&self) -> StrategyInfo {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => StrategyInfo::new(),
        }
    }
}

/// A worker process as seen by the control plane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub uuid:            WorkerUuid,
    pub status:          WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:            Option<String>,
    pub last_heart_beat: DateTime<Utc>,
    #[serde(default)]
    pub tags:            Vec<String>,
}

/// A scheduler node participating in the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchedulerNode {
    pub uuid: SchedulerNodeUuid,
    pub ip:   String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timepoint_display_is_deterministic() {
        let tp = TimePoint::new(TimeUnit::Second, 1);
        assert_eq!(tp.to_string(), "second:1");

        let aligned = TimePoint {
            unit: TimeUnit::Hour,
            n:    2,
            at:   Some("30".into()),
        };
        assert_eq!(aligned.to_string(), "hour:2@30");
    }

    #[test]
    fn strategy_info_flattens_cron_task_fields() {
        let cron = CronTask {
            uuid:                       CronTaskUuid::new(),
            name:                       "nightly".into(),
            timepoints:                 vec![TimePoint::new(TimeUnit::Day, 1)],
            func:                       Func {
                uuid:             FuncUuid::new(),
                payload:          Bytes::from_static(b"noop"),
                dependencies:     vec![],
                parameter_schema: None,
                name:             None,
            },
            argument_generate_strategy: ArgumentStrategy::Skip,
            worker_choose_strategy:     WorkerChooseStrategy::RandomFromWorkerTags {
                tags: vec!["batch".into()],
            },
            task_queue_strategy:        QueueFullStrategy::Drop,
            task_queue_max_size:        16,
            result_as_state:            false,
            timeout:                    None,
            description:                String::new(),
            disabled:                   false,
            created_at:                 Utc::now(),
        };

        let info = cron.strategy_info();
        assert_eq!(info["name"], "nightly");
        assert_eq!(info["task_queue_max_size"], 16);
        assert!(info.contains_key("worker_choose_strategy"));
    }
}
