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

use std::{collections::HashMap, sync::RwLock};

use taskgrid_base::{BoxTaskFn, Func};
use taskgrid_error::{Result, TaskExecutionSnafu};

/// Resolves persisted function payloads into runnable callables.
///
/// A `Func` entity stores its body as opaque bytes; here those bytes
/// name a registered entry. A function's declared dependencies must all
/// be registered as well before it may run — the equivalent of loading
/// a code object together with its modules.
#[derive(Default)]
pub struct FuncRegistry {
    entries: RwLock<HashMap<String, BoxTaskFn>>,
}

impl FuncRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn register(&self, name: impl Into<String>, task: BoxTaskFn) {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(name.into(), task);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Resolve a persisted `Func` into its callable, verifying all
    /// declared dependencies are loadable.
    pub fn resolve(&self, func: &Func) -> Result<BoxTaskFn> {
        let name = std::str::from_utf8(&func.payload).map_err(|_| {
            TaskExecutionSnafu {
                message: format!("function {} has a non-utf8 payload", func.uuid),
            }
            .build()
        })?;

        let entries = self.entries.read().expect("registry lock poisoned");
        for dependency in &func.dependencies {
            if !entries.contains_key(dependency.as_str()) {
                return TaskExecutionSnafu {
                    message: format!("missing dependency {dependency} of function {name}"),
                }
                .fail();
            }
        }
        entries.get(name).cloned().map_or_else(
            || {
                TaskExecutionSnafu {
                    message: format!("unknown function {name}"),
                }
                .fail()
            },
            Ok,
        )
    }
}

impl std::fmt::Debug for FuncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read().expect("registry lock poisoned");
        f.debug_struct("FuncRegistry")
            .field("entries", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use taskgrid_base::{Func, FuncUuid, task_fn};

    use super::*;

    fn func(payload: &'static str, dependencies: &[&str]) -> Func {
        Func {
            uuid:             FuncUuid::new(),
            payload:          Bytes::from_static(payload.as_bytes()),
            dependencies:     dependencies.iter().map(ToString::to_string).collect(),
            parameter_schema: None,
            name:             None,
        }
    }

    #[test]
    fn resolves_registered_functions() {
        let registry = FuncRegistry::new();
        registry.register("noop", task_fn(|_, _, _| async { Ok(None) }));

        assert!(registry.resolve(&func("noop", &[])).is_ok());
    }

    #[test]
    fn unknown_function_fails() {
        let registry = FuncRegistry::new();
        let err = registry.resolve(&func("ghost", &[])).unwrap_err();
        assert!(err.to_string().contains("unknown function ghost"));
    }

    #[test]
    fn missing_dependency_fails() {
        let registry = FuncRegistry::new();
        registry.register("main", task_fn(|_, _, _| async { Ok(None) }));

        let err = registry.resolve(&func("main", &["helpers"])).unwrap_err();
        assert!(err.to_string().contains("missing dependency helpers"));
    }
}
