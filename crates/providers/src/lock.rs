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
    time::Duration,
};

use async_trait::async_trait;
use taskgrid_error::{Result, TimeoutSnafu};
use taskgrid_scheduler::interface::{DistributeLock, LockGuard};

/// Process-local rendition of the distributed lock: one async mutex per
/// name. Guards release on drop, on every exit path.
pub struct LocalLock {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn mutex(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .expect("lock table poisoned")
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl Default for LocalLock {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl DistributeLock for LocalLock {
    async fn lock(&self, name: &str, timeout: Option<Duration>) -> Result<LockGuard> {
        let mutex = self.mutex(name);
        let guard = match timeout {
            None => mutex.lock_owned().await,
            Some(timeout) => tokio::time::timeout(timeout, mutex.lock_owned())
                .await
                .map_err(|_| {
                    TimeoutSnafu {
                        operation: format!("lock {name}"),
                    }
                    .build()
                })?,
        };
        Ok(LockGuard::new(guard))
    }

    async fn try_lock(&self, name: &str) -> Result<Option<LockGuard>> {
        let mutex = self.mutex(name);
        Ok(mutex.try_lock_owned().ok().map(LockGuard::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_excludes_and_releases_on_drop() {
        let lock = LocalLock::new();

        let guard = lock.lock("w1", None).await.unwrap();
        assert!(lock.try_lock("w1").await.unwrap().is_none());
        // Independent names never contend.
        assert!(lock.try_lock("w2").await.unwrap().is_some());

        drop(guard);
        assert!(lock.try_lock("w1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lock_times_out_on_contention() {
        let lock = LocalLock::new();
        let _guard = lock.lock("w1", None).await.unwrap();

        let err = lock
            .lock("w1", Some(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(matches!(err, taskgrid_error::Error::Timeout { .. }));
    }
}
