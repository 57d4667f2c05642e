//! Shared output helpers for CLI commands.

use console::style;

use crate::pipeline::{RunReport, TargetReport};
use crate::scrapers::{RevealOutcome, SkippedContainer};
use crate::sink::SinkSummary;

/// Truncate a string to `max` characters, adding an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max.saturating_sub(3)) {
        Some((cut, _)) if s.chars().count() > max => format!("{}...", &s[..cut]),
        _ => s.to_string(),
    }
}

fn describe_reveal(outcome: &RevealOutcome, clicks: usize) -> String {
    match outcome {
        RevealOutcome::Stagnated => format!("{} click(s), listing stopped growing", clicks),
        RevealOutcome::ControlAbsent => format!("{} click(s), no more to load", clicks),
        RevealOutcome::ClickBoundExceeded => {
            format!("stopped at {} click(s), listing may be incomplete", clicks)
        }
        RevealOutcome::NoControlConfigured => "single page".to_string(),
        RevealOutcome::Interrupted(reason) => {
            format!("interrupted after {} click(s): {}", clicks, truncate(reason, 60))
        }
    }
}

pub fn print_skipped(skipped: &[SkippedContainer]) {
    for skip in skipped {
        println!(
            "    {} container {}: {}",
            style("!").yellow(),
            skip.index,
            skip.reason
        );
        println!("      {}", style(truncate(&skip.snippet, 100)).dim());
    }
}

pub fn print_target(report: &TargetReport, verbose: bool) {
    let label = match &report.target.category {
        Some(category) => format!("{} ({})", report.target.url, category),
        None => report.target.url.clone(),
    };

    match &report.outcome {
        Ok(page) => {
            let mark = if page.reveal.outcome.is_complete() {
                style("✓").green()
            } else {
                style("!").yellow()
            };
            println!(
                "{} {}: {} record(s), {}",
                mark,
                label,
                page.records,
                describe_reveal(&page.reveal.outcome, page.reveal.state.click_count)
            );
            if !page.skipped.is_empty() {
                println!(
                    "  {} {} container(s) skipped",
                    style("→").cyan(),
                    page.skipped.len()
                );
                if verbose {
                    print_skipped(&page.skipped);
                }
            }
        }
        Err(e) => println!("{} {}: {}", style("✗").red(), label, e),
    }
}

pub fn print_run(report: &RunReport, verbose: bool) {
    for target in &report.targets {
        print_target(target, verbose);
    }
}

pub fn print_sink_summary(summary: &SinkSummary) {
    println!();
    println!("{}", style("Summary").bold());
    println!("{}", "-".repeat(40));
    println!("  Found:          {}", summary.found);
    println!("  Already known:  {}", summary.already_known);
    println!("  Newly added:    {}", style(summary.newly_added).green());
    if summary.without_url > 0 {
        println!("  Without URL:    {}", style(summary.without_url).yellow());
    }
    if let Some(total) = summary.total_persisted {
        println!("  Total in file:  {}", total);
    }
    if let Some(inserted) = summary.store_inserted {
        println!("  Store inserted: {}", inserted);
    }
    for error in &summary.errors {
        println!("{} {}", style("✗").red(), error);
    }
}
