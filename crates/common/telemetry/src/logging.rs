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

//! Tracing subscriber setup.
//!
//! One stdout layer (text or JSON) plus an optional hourly-rotated file
//! appender. The returned `WorkerGuard`s must stay alive for the whole
//! process; dropping them flushes and stops the non-blocking writers.

use std::{
    env,
    sync::{Arc, Mutex, Once},
};

use bon::Builder;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// The default directory name for log files when file logging is
/// enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Default log level filter when neither `LoggingOptions.level` nor
/// `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Configuration of the logging pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rotated log files. Empty means stdout only.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Log level filter string ("info", "debug,hyper=warn", …). Falls
    /// back to `RUST_LOG`, then to "info".
    pub level: Option<String>,

    /// Output format for log messages.
    #[builder(default)]
    pub log_format: LogFormat,

    /// Maximum number of rotated log files to retain.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Whether to log to stdout in addition to files.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON-structured records for log aggregation systems.
    Json,
    /// Human-readable text for development and console output.
    #[default]
    Text,
}

/// Initialize tracing with default options: stdout, text format.
///
/// The returned guards must be kept alive for logging to function. Safe
/// to call more than once; only the first call installs the subscriber.
#[must_use]
pub fn init_tracing_subscriber(app_name: &str) -> Vec<WorkerGuard> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Global storage for unit test logging worker guards, held so the
/// writers survive the whole test run.
static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Initialize logging for unit tests: file output under
/// `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`), level from
/// `UNITTEST_LOG_LEVEL`. Safe to call from every test.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut g = GLOBAL_UT_LOG_GUARD.as_ref().lock().unwrap();

        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            ..Default::default()
        };
        *g = Some(init_global_logging("unittest", &opts));

        tracing::info!("logs dir = {}", dir);
    });
}

/// Install the global subscriber according to `opts`.
///
/// Only the first call has an effect; later calls return no guards.
#[must_use]
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = Vec::new();

    START.call_once(|| {
        let filter = opts.level.as_ref().map_or_else(
            || {
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_TARGETS))
            },
            |level| EnvFilter::new(level),
        );

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        if opts.append_stdout {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer);
            layers.push(match opts.log_format {
                LogFormat::Json => layer.json().boxed(),
                LogFormat::Text => layer.boxed(),
            });
        }

        if !opts.dir.is_empty() {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_prefix(app_name)
                .max_log_files(opts.max_log_files.max(1))
                .build(&opts.dir)
                .expect("failed to create rolling file appender");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            layers.push(match opts.log_format {
                LogFormat::Json => layer.json().boxed(),
                LogFormat::Text => layer.boxed(),
            });
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .init();
    });

    guards
}
