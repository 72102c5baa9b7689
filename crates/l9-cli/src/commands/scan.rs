//! `l9 scan`: governance rules and credential detection over a file or stdin.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use l9_config::Config;
use l9_governance::Verdict;
use l9_runtime::runtime::build_rule_engine;

use crate::theme::Theme;

/// Scan `file` (or stdin). Exit 1 when any blocking rule fires.
pub(crate) fn run_scan(cfg: &Config, workspace: &Path, file: Option<&Path>) -> Result<i32> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        },
    };

    let engine = build_rule_engine(cfg, workspace)?;
    let verdict = engine.evaluate(&text);
    print_verdict(&verdict);
    Ok(i32::from(verdict.is_blocked()))
}

fn print_verdict(verdict: &Verdict) {
    if verdict.findings().is_empty() {
        println!("{}", Theme::success("No findings"));
        return;
    }
    for finding in verdict.findings() {
        println!(
            "{} [{}] line {}: {} ({})",
            Theme::risk_level(finding.severity),
            finding.rule_id,
            finding.line,
            finding.message,
            finding.action
        );
        if !finding.excerpt.is_empty() {
            println!("    {}", Theme::dimmed(&finding.excerpt));
        }
    }
    match verdict {
        Verdict::Block { .. } => println!("{}", Theme::error("Blocked")),
        Verdict::Warn { .. } => println!("{}", Theme::warning("Warnings only")),
        Verdict::Allow => {},
    }
}
