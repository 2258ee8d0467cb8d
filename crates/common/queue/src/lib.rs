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

//! The FIFO channel both planes communicate over.
//!
//! A queue is addressed by name through a [`QueueFactory`]; the worker
//! manager namespaces the per-worker task and control queues by worker
//! uuid, and argument queues are shared between producers and the
//! scheduler. `watch_and_get` exists so a blocked consumer can abandon
//! the wait when its owner shuts down, without kill signals being
//! injected into blocking primitives.

mod factory;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
pub use factory::{MemoryQueueFactory, QueueFactory};
pub use memory::MemoryQueue;
pub use taskgrid_error::{Error, Result};

/// Cooperative break flag polled by [`Queue::watch_and_get`].
pub trait BreakRef: Send + Sync {
    fn if_break_now(&self) -> bool;
}

/// A break reference that never fires; turns `watch_and_get` into a
/// plain timed get.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverBreak;

impl BreakRef for NeverBreak {
    fn if_break_now(&self) -> bool { false }
}

impl BreakRef for std::sync::atomic::AtomicBool {
    fn if_break_now(&self) -> bool { self.load(std::sync::atomic::Ordering::Acquire) }
}

/// FIFO channel over elements of `T`, safe for concurrent producers and
/// consumers.
///
/// Timeouts are signalled as `Ok(None)`, never as errors. Size
/// observations may be stale under concurrency but stay consistent with
/// the puts and gets the caller itself has observed.
#[async_trait]
pub trait Queue<T>: Send + Sync
where
    T: Clone + Send + 'static,
{
    /// The factory-scoped name of this queue.
    fn name(&self) -> &str;

    /// Append an element. Fails only when the queue is closed.
    async fn put(&self, value: T) -> Result<()>;

    /// Pop the head element, waiting up to `timeout` (forever when
    /// `None`). Returns `Ok(None)` on expiry.
    async fn get(&self, timeout: Option<Duration>) -> Result<Option<T>>;

    /// Non-destructive peek of the head element. Fails with
    /// `EmptyQueue` when the queue has no elements.
    async fn get_front(&self) -> Result<T>;

    /// Like [`Queue::get`], but polls `break_ref` at a bounded interval
    /// and returns `Ok(None)` as soon as it fires.
    async fn watch_and_get(
        &self,
        break_ref: &dyn BreakRef,
        timeout: Option<Duration>,
    ) -> Result<Option<T>>;

    async fn qsize(&self) -> usize;

    async fn empty(&self) -> bool;
}
