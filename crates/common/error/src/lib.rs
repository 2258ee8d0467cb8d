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

//! Shared error vocabulary for the scheduler and executor planes.
//!
//! Each variant maps to one of the platform's documented failure kinds.
//! Collaborator implementations (repositories, locks, crons) return
//! these directly so callers can branch on the kind instead of string
//! matching.

use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A repository lookup missed.
    #[snafu(display("{entity} record {uuid} not found"))]
    RecordNotFound {
        entity: &'static str,
        uuid:   String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// `get_front` on a queue with no elements.
    #[snafu(display("queue {queue} is empty"))]
    EmptyQueue {
        queue: String,
        #[snafu(implicit)]
        loc:   snafu::Location,
    },

    /// The queue was closed while a producer or consumer was using it.
    #[snafu(display("queue {queue} is closed"))]
    QueueClosed {
        queue: String,
        #[snafu(implicit)]
        loc:   snafu::Location,
    },

    /// A lock or RPC wait expired.
    #[snafu(display("{operation} timed out"))]
    Timeout {
        operation: String,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    /// A task status transition out of a terminal state was attempted.
    #[snafu(display("can't change status of task {uuid} from {current} to {attempted}"))]
    StatusChange {
        uuid:      String,
        current:   String,
        attempted: String,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    /// A heartbeat arrived for a worker that is no longer running.
    #[snafu(display("worker {worker} status is {status}, but still heart beat"))]
    StaleHeartbeat {
        worker: String,
        status: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// Strategy UDF resolution did not reach a fixed point.
    #[snafu(display("max depth {max_depth} exceeded resolving {what} strategy"))]
    RecursionLimit {
        what:      &'static str,
        max_depth: usize,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    /// A strategy is malformed (empty worker list, unknown UDF, or a UDF
    /// that resolved to another UDF at the end of resolution).
    #[snafu(display("invalid strategy: {message}"))]
    Strategy {
        message: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    /// A function body could not be resolved or failed inside a worker.
    /// Captured by the runtime and reported as a status, never
    /// propagated out of the worker loop.
    #[snafu(display("task execution failed: {message}"))]
    TaskExecution {
        message: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },
}

impl Error {
    /// Whether this error is a repository miss.
    #[must_use]
    pub const fn is_not_found(&self) -> bool { matches!(self, Self::RecordNotFound { .. }) }

    /// Whether this error is a status-lattice violation (including the
    /// stale-heartbeat case).
    #[must_use]
    pub const fn is_status_change(&self) -> bool {
        matches!(
            self,
            Self::StatusChange { .. } | Self::StaleHeartbeat { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_attempted_status() {
        let err = StatusChangeSnafu {
            uuid:      "t-1".to_string(),
            current:   "success".to_string(),
            attempted: "running".to_string(),
        }
        .build();
        let msg = err.to_string();
        assert!(msg.contains("from success to running"), "{msg}");
        assert!(err.is_status_change());
    }
}
