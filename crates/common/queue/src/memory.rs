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

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use taskgrid_error::{EmptyQueueSnafu, QueueClosedSnafu, Result};
use tokio::{sync::Notify, time::Instant};

use crate::{BreakRef, Queue};

/// Interval at which `watch_and_get` re-checks its break flag.
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// In-process queue over a locked ring buffer.
///
/// Producers never block; consumers park on a notifier. The lock is
/// only ever held for a push or pop, never across an await.
pub struct MemoryQueue<T> {
    name:   String,
    items:  Mutex<VecDeque<T>>,
    notify: Notify,
    closed: AtomicBool,
}

impl<T> MemoryQueue<T> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:   name.into(),
            items:  Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Close the queue: further puts fail, queued elements stay
    /// consumable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

    fn pop(&self) -> Option<T> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let value = items.pop_front();
        // A waiter may have consumed a permit for an element another
        // consumer took; pass the wakeup along while work remains.
        if value.is_some() && !items.is_empty() {
            self.notify.notify_one();
        }
        value
    }
}

#[async_trait]
impl<T> Queue<T> for MemoryQueue<T>
where
    T: Clone + Send + 'static,
{
    fn name(&self) -> &str { &self.name }

    async fn put(&self, value: T) -> Result<()> {
        if self.is_closed() {
            return QueueClosedSnafu { queue: self.name.clone() }.fail();
        }
        self.items
            .lock()
            .expect("queue lock poisoned")
            .push_back(value);
        self.notify.notify_one();
        Ok(())
    }

    async fn get(&self, timeout: Option<Duration>) -> Result<Option<T>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(value) = self.pop() {
                return Ok(Some(value));
            }
            if self.is_closed() {
                return Ok(None);
            }
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, self.notify.notified())
                        .await
                        .is_err()
                    {
                        // One last chance: a put may have raced the
                        // timer.
                        return Ok(self.pop());
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    async fn get_front(&self) -> Result<T> {
        self.items
            .lock()
            .expect("queue lock poisoned")
            .front()
            .cloned()
            .ok_or_else(|| EmptyQueueSnafu { queue: self.name.clone() }.build())
    }

    async fn watch_and_get(
        &self,
        break_ref: &dyn BreakRef,
        timeout: Option<Duration>,
    ) -> Result<Option<T>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(value) = self.pop() {
                return Ok(Some(value));
            }
            if break_ref.if_break_now() || self.is_closed() {
                return Ok(None);
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                return Ok(None);
            }
            tokio::select! {
                () = self.notify.notified() => {}
                () = tokio::time::sleep(WATCH_POLL_INTERVAL) => {}
            }
        }
    }

    async fn qsize(&self) -> usize { self.items.lock().expect("queue lock poisoned").len() }

    async fn empty(&self) -> bool { self.qsize().await == 0 }
}
