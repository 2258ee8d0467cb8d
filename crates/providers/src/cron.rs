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

//! Tokio-backed cron timer.
//!
//! One background task per registered entry; fires of the same entry
//! never overlap because the callback is awaited inline. `at` shifts
//! the first fire by that many seconds, letting callers align entries
//! within their unit.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use taskgrid_error::Result;
use taskgrid_scheduler::interface::{Cron, CronCallback};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct TokioCron {
    entries: Mutex<HashMap<String, CancellationToken>>,
}

impl TokioCron {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn register(
        &self,
        name: &str,
        period: Duration,
        at: Option<&str>,
        callback: CronCallback,
    ) -> Result<()> {
        let token = CancellationToken::new();
        let first_delay = at
            .and_then(|at| at.parse::<u64>().ok())
            .map(Duration::from_secs);

        {
            let mut entries = self.entries.lock().expect("cron lock poisoned");
            if let Some(previous) = entries.insert(name.to_string(), token.clone()) {
                previous.cancel();
            }
        }

        let entry = name.to_string();
        tokio::spawn(async move {
            if let Some(delay) = first_delay {
                tokio::select! {
                    () = token.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of a tokio interval completes immediately;
            // consume it so the entry first fires one period in.
            interval.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => callback().await,
                }
            }
            debug!(entry = %entry, "cron entry cancelled");
        });
        Ok(())
    }
}

impl Default for TokioCron {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Cron for TokioCron {
    async fn every_n_milliseconds(&self, name: &str, n: u32, task: CronCallback) -> Result<()> {
        self.register(name, Duration::from_millis(n.into()), None, task)
    }

    async fn every_n_seconds(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()> {
        self.register(name, Duration::from_secs(n.into()), at, task)
    }

    async fn every_n_minutes(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()> {
        self.register(name, Duration::from_secs(u64::from(n) * 60), at, task)
    }

    async fn every_n_hours(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()> {
        self.register(name, Duration::from_secs(u64::from(n) * 3600), at, task)
    }

    async fn every_n_days(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()> {
        self.register(name, Duration::from_secs(u64::from(n) * 86_400), at, task)
    }

    async fn every_n_weeks(
        &self,
        name: &str,
        n: u32,
        task: CronCallback,
        at: Option<&str>,
    ) -> Result<()> {
        self.register(name, Duration::from_secs(u64::from(n) * 7 * 86_400), at, task)
    }

    async fn cancel(&self, name: &str) -> Result<()> {
        if let Some(token) = self.entries.lock().expect("cron lock poisoned").remove(name) {
            token.cancel();
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .expect("cron lock poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    fn counting_callback(counter: &Arc<AtomicU32>) -> CronCallback {
        let counter = counter.clone();
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn entries_fire_periodically_until_cancelled() {
        let cron = TokioCron::new();
        let counter = Arc::new(AtomicU32::new(0));

        cron.every_n_milliseconds("tick", 50, counting_callback(&counter))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(270)).await;

        let fired = counter.load(Ordering::SeqCst);
        assert!((3..=6).contains(&fired), "expected 3-6 fires, got {fired}");

        cron.cancel("tick").await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let after_cancel = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn get_all_and_cancel_are_idempotent() {
        let cron = TokioCron::new();
        let counter = Arc::new(AtomicU32::new(0));

        cron.every_n_seconds("a/second:1", 1, counting_callback(&counter), None)
            .await
            .unwrap();
        cron.every_n_seconds("b/second:2", 2, counting_callback(&counter), None)
            .await
            .unwrap();

        let mut names = cron.get_all().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a/second:1", "b/second:2"]);

        cron.cancel("a/second:1").await.unwrap();
        cron.cancel("a/second:1").await.unwrap();
        assert_eq!(cron.get_all().await.unwrap(), vec!["b/second:2"]);
    }
}
