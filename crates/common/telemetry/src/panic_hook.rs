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

//! Panic handling.
//!
//! Task panics are caught inside the worker runtime and surface as
//! error status reports; a panic that reaches this hook means a worker
//! loop itself or a control-plane thread died. The record is tagged
//! with the plane it came from so a crashed worker thread is
//! distinguishable from a crashed scheduler node.

use std::{panic, sync::LazyLock};

use backtrace::Backtrace;
use prometheus::{IntCounterVec, register_int_counter_vec};

/// Panics by plane (`data` = worker threads, `control` = everything
/// else).
pub static PANIC_COUNTER: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "taskgrid_panic_total",
        "Unrecovered panics by plane",
        &["plane"]
    )
    .unwrap()
});

/// Which plane a thread belongs to. The worker manager names every
/// worker thread `worker-{uuid}`.
fn plane_of(thread_name: &str) -> &'static str {
    if thread_name.starts_with("worker-") {
        "data"
    } else {
        "control"
    }
}

/// Replace the default panic handler with one that logs the panic as a
/// structured tracing event with its backtrace and originating plane,
/// counts it, then delegates to the previous hook.
pub fn set_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed").to_string();
        let plane = plane_of(&thread_name);
        let backtrace = format!("{:?}", Backtrace::new());
        if let Some(location) = panic.location() {
            tracing::error!(
                thread = %thread_name,
                plane,
                message = %panic,
                backtrace = %backtrace,
                panic.file = location.file(),
                panic.line = location.line(),
                panic.column = location.column(),
            );
        } else {
            tracing::error!(
                thread = %thread_name,
                plane,
                message = %panic,
                backtrace = %backtrace,
            );
        }
        PANIC_COUNTER.with_label_values(&[plane]).inc();
        default_hook(panic);
    }));
}
