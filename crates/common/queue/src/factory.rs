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
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{MemoryQueue, Queue};

/// Opens queues by name. The same name always yields the same queue for
/// one factory instance; names are the namespacing mechanism (worker
/// queues embed the worker uuid, argument queues are user-chosen).
pub trait QueueFactory<T>: Send + Sync
where
    T: Clone + Send + 'static,
{
    fn queue(&self, name: &str) -> Arc<dyn Queue<T>>;
}

/// Factory handing out shared in-process [`MemoryQueue`]s.
pub struct MemoryQueueFactory<T> {
    queues: Mutex<HashMap<String, Arc<MemoryQueue<T>>>>,
}

impl<T> MemoryQueueFactory<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryQueueFactory<T> {
    fn default() -> Self { Self::new() }
}

impl<T> QueueFactory<T> for MemoryQueueFactory<T>
where
    T: Clone + Send + 'static,
{
    fn queue(&self, name: &str) -> Arc<dyn Queue<T>> {
        let mut queues = self.queues.lock().expect("factory lock poisoned");
        queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryQueue::new(name)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_name_yields_same_queue() {
        let factory: MemoryQueueFactory<u8> = MemoryQueueFactory::new();
        let a = factory.queue("args");
        let b = factory.queue("args");

        a.put(1).await.unwrap();
        assert_eq!(b.qsize().await, 1);

        let other = factory.queue("other");
        assert_eq!(other.qsize().await, 0);
    }
}
