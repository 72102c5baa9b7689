//! `l9 queue`: backend health and queued tasks.

use anyhow::Result;
use colored::Colorize;
use l9_config::Config;
use l9_queue::QueueState;
use l9_runtime::runtime::open_queue;

use crate::theme::Theme;

/// Show which backend is serving and how many tasks wait.
pub(crate) async fn show_status(cfg: &Config) -> Result<i32> {
    let queue = open_queue(cfg).await;
    let health = queue.health().await;

    println!("\n{}", Theme::header("Task Queue"));
    println!("  {}", Theme::kv("Configured", &cfg.queue.backend.to_string()));
    println!("  {}", Theme::kv("State", &health.state.to_string()));
    if let Some(primary) = &health.primary {
        let len = health
            .primary_len
            .map_or_else(|| "unavailable".to_owned(), |n| n.to_string());
        println!("  {}", Theme::kv(primary, &len));
    }
    println!("  {}", Theme::kv("memory", &health.fallback_len.to_string()));
    println!("  {}", Theme::kv("Total", &health.total().to_string()));
    println!();

    Ok(match health.state {
        QueueState::Healthy | QueueState::MemoryOnly => 0,
        QueueState::Degraded { .. } => 1,
    })
}

/// Print up to `limit` tasks in the order they would be dequeued.
pub(crate) async fn peek_tasks(cfg: &Config, limit: usize) -> Result<i32> {
    let queue = open_queue(cfg).await;
    let tasks = queue.peek_all().await?;

    if tasks.is_empty() {
        println!("{}", Theme::info("Queue is empty"));
        return Ok(0);
    }

    println!(
        "{:>8} {:>3} {:<8} {:<9} {:>16} {}",
        "ID".dimmed(),
        "PRI".dimmed(),
        "HANDLER".dimmed(),
        "APPROVED".dimmed(),
        "CREATED".dimmed(),
        "NAME".dimmed()
    );
    println!("{}", Theme::separator());
    for task in tasks.iter().take(limit) {
        let approved = if task.is_approved() {
            "yes".green()
        } else {
            "no".red()
        };
        println!(
            "{:>8} {:>3} {:<8} {:<9} {:>16} {}",
            Theme::short_id(&task.task_id.to_string()),
            task.priority,
            task.handler,
            approved,
            Theme::timestamp(&task.created_at.0),
            task.name
        );
    }
    if tasks.len() > limit {
        println!(
            "{}",
            Theme::dimmed(&format!("... and {} more", tasks.len().saturating_sub(limit)))
        );
    }
    Ok(0)
}
