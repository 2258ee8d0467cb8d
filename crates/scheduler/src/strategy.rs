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

//! Strategy UDF resolution.
//!
//! A strategy's `Udf` variant names a registered function that, given
//! the flattened cron-task fields, returns another strategy. Resolution
//! is an iterative fixed-point with an explicit depth counter; chains
//! longer than [`MAX_RESOLVE_DEPTH`] fail with `RecursionLimit`.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use futures::future::BoxFuture;
use taskgrid_base::{
    ArgumentStrategy, FuncUuid, QueueFullStrategy, StrategyInfo, UdfSpec, WorkerChooseStrategy,
};
use taskgrid_error::{RecursionLimitSnafu, Result, StrategySnafu};

/// Bound on the number of UDF evaluations in one resolution.
pub const MAX_RESOLVE_DEPTH: usize = 10;

/// Outcome of one UDF evaluation: the next strategy, or a user error
/// message.
pub type UdfOutcome<S> = std::result::Result<S, String>;

pub type ArgumentUdf =
    Arc<dyn Fn(StrategyInfo) -> BoxFuture<'static, UdfOutcome<ArgumentStrategy>> + Send + Sync>;
pub type WorkerChooseUdf =
    Arc<dyn Fn(StrategyInfo) -> BoxFuture<'static, UdfOutcome<WorkerChooseStrategy>> + Send + Sync>;
pub type QueueFullUdf =
    Arc<dyn Fn(StrategyInfo) -> BoxFuture<'static, UdfOutcome<QueueFullStrategy>> + Send + Sync>;

/// Registered strategy UDFs, keyed by the function uuid the persisted
/// strategy references.
#[derive(Default)]
pub struct UdfRegistry {
    argument:      RwLock<HashMap<FuncUuid, ArgumentUdf>>,
    worker_choose: RwLock<HashMap<FuncUuid, WorkerChooseUdf>>,
    queue_full:    RwLock<HashMap<FuncUuid, QueueFullUdf>>,
}

macro_rules! resolve_impl {
    ($fn_name:ident, $register:ident, $map:ident, $strategy:ident, $udf:ty, $what:literal) => {
        pub fn $register(&self, func: FuncUuid, udf: $udf) {
            self.$map
                .write()
                .expect("udf registry lock poisoned")
                .insert(func, udf);
        }

        /// Resolve to a UDF-free strategy or fail with `RecursionLimit`.
        pub async fn $fn_name(
            &self,
            strategy: $strategy,
            info: &StrategyInfo,
        ) -> Result<$strategy> {
            let mut current = strategy;
            let mut depth = 0_usize;
            loop {
                let spec: UdfSpec = match &current {
                    $strategy::Udf(spec) => spec.clone(),
                    _ => return Ok(current),
                };
                depth += 1;
                if depth > MAX_RESOLVE_DEPTH {
                    return RecursionLimitSnafu {
                        what:      $what,
                        max_depth: MAX_RESOLVE_DEPTH,
                    }
                    .fail();
                }

                let udf = self
                    .$map
                    .read()
                    .expect("udf registry lock poisoned")
                    .get(&spec.func)
                    .cloned()
                    .ok_or_else(|| {
                        StrategySnafu {
                            message: format!("unknown {} strategy udf {}", $what, spec.func),
                        }
                        .build()
                    })?;

                let mut info = info.clone();
                if let Some(extra) = spec.extra {
                    info.extend(extra);
                }
                current = udf(info).await.map_err(|error| {
                    StrategySnafu {
                        message: format!("{} strategy udf failed: {error}", $what),
                    }
                    .build()
                })?;
            }
        }
    };
}

impl UdfRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    resolve_impl!(
        resolve_argument,
        register_argument_udf,
        argument,
        ArgumentStrategy,
        ArgumentUdf,
        "argument"
    );

    resolve_impl!(
        resolve_worker_choose,
        register_worker_choose_udf,
        worker_choose,
        WorkerChooseStrategy,
        WorkerChooseUdf,
        "worker_choose"
    );

    resolve_impl!(
        resolve_queue_full,
        register_queue_full_udf,
        queue_full,
        QueueFullStrategy,
        QueueFullUdf,
        "task_queue"
    );
}

impl std::fmt::Debug for UdfRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UdfRegistry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(func: FuncUuid) -> UdfSpec { UdfSpec { func, extra: None } }

    #[tokio::test]
    async fn non_udf_strategies_resolve_to_themselves() {
        let registry = UdfRegistry::new();
        let resolved = registry
            .resolve_queue_full(QueueFullStrategy::Seize, &StrategyInfo::new())
            .await
            .unwrap();
        assert_eq!(resolved, QueueFullStrategy::Seize);
    }

    #[tokio::test]
    async fn udf_chain_resolves_to_fixed_point() {
        let registry = UdfRegistry::new();
        let inner = FuncUuid::new();
        let outer = FuncUuid::new();

        registry.register_queue_full_udf(
            inner,
            Arc::new(|_| Box::pin(async { Ok(QueueFullStrategy::Skip) })),
        );
        let inner_spec = spec(inner);
        registry.register_queue_full_udf(
            outer,
            Arc::new(move |_| {
                let inner_spec = inner_spec.clone();
                Box::pin(async move { Ok(QueueFullStrategy::Udf(inner_spec)) })
            }),
        );

        let resolved = registry
            .resolve_queue_full(QueueFullStrategy::Udf(spec(outer)), &StrategyInfo::new())
            .await
            .unwrap();
        assert_eq!(resolved, QueueFullStrategy::Skip);
    }

    #[tokio::test]
    async fn endless_udf_chain_hits_recursion_limit() {
        let registry = UdfRegistry::new();
        let func = FuncUuid::new();
        let self_spec = spec(func);
        registry.register_argument_udf(
            func,
            Arc::new(move |_| {
                let self_spec = self_spec.clone();
                Box::pin(async move { Ok(ArgumentStrategy::Udf(self_spec)) })
            }),
        );

        let err = registry
            .resolve_argument(ArgumentStrategy::Udf(spec(func)), &StrategyInfo::new())
            .await
            .unwrap_err();
        assert!(matches!(err, taskgrid_error::Error::RecursionLimit { .. }));
    }

    #[tokio::test]
    async fn udf_extra_is_merged_into_info() {
        let registry = UdfRegistry::new();
        let func = FuncUuid::new();
        registry.register_argument_udf(
            func,
            Arc::new(|info| {
                Box::pin(async move {
                    if info.get("mode").and_then(|v| v.as_str()) == Some("skip") {
                        Ok(ArgumentStrategy::Skip)
                    } else {
                        Ok(ArgumentStrategy::Drop)
                    }
                })
            }),
        );

        let mut extra = StrategyInfo::new();
        extra.insert("mode".into(), serde_json::Value::String("skip".into()));
        let resolved = registry
            .resolve_argument(
                ArgumentStrategy::Udf(UdfSpec {
                    func,
                    extra: Some(extra),
                }),
                &StrategyInfo::new(),
            )
            .await
            .unwrap();
        assert_eq!(resolved, ArgumentStrategy::Skip);
    }
}
