// Copyright 2024 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Storage node entry point: parses the disk set from the command
//! line, brings up the multi-disk placement layer and its EIO
//! recovery queue, and serves a small line-oriented admin console over
//! stdin for exercising `plug`/`unplug`/`info`/`eio` by hand.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ecstore::{LoggingRecoveryTrigger, MultiDisk};
use workers::{CompletionBus, EventLoop, Policy, WorkerPool};

#[derive(Parser, Debug)]
#[command(name = "md-node", about = "Multi-disk object placement node")]
struct Cli {
    /// Comma-separated list of disk paths to register at startup.
    #[arg(long, value_delimiter = ',')]
    disk: Vec<PathBuf>,

    /// Cluster size used to size the recovery queue under the Dynamic
    /// policy (roof = 2 * nodes).
    #[arg(long, default_value_t = 3)]
    cluster_nodes: usize,
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let object_path = cli
        .disk
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let md = Arc::new(MultiDisk::new(object_path, Arc::new(LoggingRecoveryTrigger)));

    for path in &cli.disk {
        if let Err(err) = md.add(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to register disk at startup");
        }
    }
    let total = md.reinit();
    tracing::info!(disks = cli.disk.len(), total_bytes = total, "multi-disk layer initialized");

    let bus = Arc::new(CompletionBus::new().expect("eventfd unavailable"));
    let recovery_queue = WorkerPool::new(
        "eio-recovery",
        Policy::Dynamic {
            cluster_nodes: cli.cluster_nodes,
        },
        bus.clone(),
    );
    let event_loop = Arc::new(EventLoop::new(bus));
    {
        let event_loop = event_loop.clone();
        std::thread::spawn(move || event_loop.run());
    }

    run_console(&md, &recovery_queue)
}

fn run_console(md: &Arc<MultiDisk>, recovery_queue: &Arc<WorkerPool>) -> io::Result<()> {
    let stdin = io::stdin();
    print_help();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next().unwrap_or("").trim();

        match cmd {
            "" => continue,
            "quit" | "exit" => return Ok(()),
            "help" => print_help(),
            "info" => {
                for summary in md.info() {
                    println!(
                        "{:>3}  {:<40}  {:>14} bytes",
                        summary.index,
                        summary.path.display(),
                        summary.size_bytes
                    );
                }
            }
            "plug" => {
                let changed = md.plug(arg);
                println!("{}", if changed { "plugged" } else { "no change" });
            }
            "unplug" => {
                let changed = md.unplug(arg);
                println!("{}", if changed { "unplugged" } else { "no change" });
            }
            "eio" => {
                let path = PathBuf::from(arg);
                let err = md.handle_eio(recovery_queue, path);
                println!("{err}");
            }
            "get" => match arg.parse::<u64>() {
                Ok(oid) if md.exists(oid) => println!("{}", md.get_object_path(oid).display()),
                Ok(_) => println!("object not found"),
                Err(_) => println!("usage: get <oid>"),
            },
            "cleanup" => match md.cleanup_temp_files() {
                Ok(n) => println!("removed {n} temp file(s)"),
                Err(err) => println!("cleanup failed: {err}"),
            },
            other => println!("unknown command: {other}"),
        }
    }
}

fn print_help() {
    println!("commands: info | plug <csv> | unplug <csv> | eio <path> | get <oid> | cleanup | quit");
}
