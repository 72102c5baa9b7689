//! `l9 worker run`: drain the queue through the GMP and Git executors.

use std::path::Path;

use anyhow::Result;
use l9_config::Config;
use l9_runtime::{Runtime, WorkerOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::theme::Theme;

/// Run the worker until Ctrl-C, or for a single poll with `once`.
pub(crate) async fn run_worker(cfg: Config, workspace: &Path, once: bool) -> Result<i32> {
    let runtime = Runtime::from_config(cfg, workspace).await?;
    let worker = runtime.worker();

    if once {
        return Ok(match worker.run_once().await? {
            WorkerOutcome::Executed(report) => {
                if report.success {
                    println!("{}", Theme::success(&format!("Task {} succeeded", report.task_id)));
                    0
                } else {
                    println!(
                        "{}",
                        Theme::error(&format!(
                            "Task {} failed (exit {:?}, timed out: {})",
                            report.task_id, report.exit_code, report.timed_out
                        ))
                    );
                    1
                }
            },
            WorkerOutcome::Unapproved(task_id) => {
                println!("{}", Theme::warning(&format!("Dropped unapproved task {task_id}")));
                1
            },
            WorkerOutcome::UnknownHandler { task_id, handler } => {
                println!(
                    "{}",
                    Theme::warning(&format!("Dropped task {task_id}: no executor for '{handler}'"))
                );
                1
            },
            WorkerOutcome::Empty => {
                println!("{}", Theme::info("Queue is empty"));
                0
            },
        });
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, stopping worker");
                    shutdown.cancel();
                },
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
        }
    });

    let stats = worker.run(shutdown).await;
    println!(
        "{}",
        Theme::info(&format!(
            "Worker stopped: {} succeeded, {} failed, {} dropped",
            stats.succeeded, stats.failed, stats.dropped
        ))
    );
    Ok(0)
}
