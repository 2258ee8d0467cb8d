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

//! Typed identifiers.
//!
//! Every entity in the system is addressed by an opaque 128-bit uuid,
//! string-formatted on the wire. The newtypes exist so a `TaskUuid` can
//! never be handed to an API expecting a `WorkerUuid`. Equality is byte
//! equality.

use derive_more::{Debug, Display};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Debug, Display, Serialize, Deserialize,
        )]
        #[debug("{}({})", stringify!($name), _0)]
        #[display("{_0}")]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self { Self(Uuid::new_v4()) }

            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self { Self(uuid) }

            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid { &self.0 }
        }

        impl Default for $name {
            fn default() -> Self { Self::new() }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self(Uuid::parse_str(s)?)) }
        }
    };
}

uuid_type!(
    /// Identity of a worker as seen by the scheduler.
    WorkerUuid
);
uuid_type!(
    /// Identity of a one-shot task instance.
    TaskUuid
);
uuid_type!(
    /// Identity of a recurring cron-task definition.
    CronTaskUuid
);
uuid_type!(
    /// Identity of a registered function body.
    FuncUuid
);
uuid_type!(FuncGroupUuid);
uuid_type!(ParameterSchemaUuid);
uuid_type!(
    /// Identity of a scheduler node within the cluster.
    SchedulerNodeUuid
);
uuid_type!(ClusterUuid);
uuid_type!(QueueUuid);
