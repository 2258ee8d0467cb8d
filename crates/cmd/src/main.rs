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

use clap::{Args, Parser, Subcommand};
use snafu::Whatever;
use taskgrid_app::{NodeConfig, shutdown_signal};
use taskgrid_telemetry::LoggingOptions;

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "taskgrid",
about = "taskgrid scheduler node",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Node(NodeArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Starts a single-process taskgrid node.
Examples:

taskgrid node
taskgrid node --workers 4 --tag gpu

")]
struct NodeArgs {
    /// Number of workers to spawn at startup.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Tags advertised by the spawned workers (repeatable).
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Log level filter (e.g. "info" or "debug,taskgrid_scheduler=trace").
    #[arg(long)]
    log_level: Option<String>,
}

impl NodeArgs {
    async fn run(self) -> Result<(), Whatever> {
        let logging = LoggingOptions::builder()
            .maybe_level(self.log_level)
            .build();

        let mut handle = NodeConfig::builder()
            .logging(logging)
            .initial_workers(self.workers)
            .worker_tags(self.tags)
            .build()
            .open()
            .await?;

        shutdown_signal().await;
        handle.shutdown();
        handle.wait_for_shutdown().await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Node(args) => args.run().await,
    }
}
