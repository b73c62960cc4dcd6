//! Output formatting for run results

use anyhow::Error;
use colored::*;
use serde_json::json;
use uhid_harness::{Filter, Registry, RunSummary, ScenarioResult, Status};

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "chain": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

/// Print the scenario names the filter selects
pub fn print_list(registry: &Registry, filter: &Filter, json: bool) {
    let names: Vec<&str> = registry.names().filter(|name| filter.matches(name)).collect();
    if json {
        match serde_json::to_string_pretty(&json!({ "scenarios": names })) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to format scenario list as JSON: {e}"),
        }
        return;
    }
    for name in names {
        println!("{name}");
    }
}

pub fn print_summary(summary: &RunSummary, json: bool, quiet: bool) {
    if json {
        match summary.to_json() {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to format summary as JSON: {e}"),
        }
        return;
    }

    if !quiet {
        for result in summary.results.iter().filter(|r| r.status != Status::NotRun) {
            print_result(result);
        }
        println!();
    }

    println!("{}", "Test Summary".bold());
    println!("{}", "------------".bold());
    for result in &summary.results {
        println!("{:<40} {}", result.name, status_label(result.status));
    }
    println!(
        "Total: {}, {} {}, {} {}, {} {}, {} {}",
        summary.results.len(),
        "Passed:".green(),
        summary.passed,
        "Failed:".red(),
        summary.failed,
        "Aborted:".yellow(),
        summary.aborted,
        "Not Run:".dimmed(),
        summary.not_run,
    );
}

fn print_result(result: &ScenarioResult) {
    match &result.reason {
        Some(reason) => println!(
            "{} - {} ({} ms): {}",
            result.name,
            status_label(result.status),
            result.duration_ms,
            reason
        ),
        None => println!(
            "{} - {} ({} ms)",
            result.name,
            status_label(result.status),
            result.duration_ms
        ),
    }
}

fn status_label(status: Status) -> ColoredString {
    match status {
        Status::Passed => status.as_str().green(),
        Status::Failed => status.as_str().red(),
        Status::Aborted => status.as_str().yellow(),
        Status::NotRun => status.as_str().dimmed(),
    }
}
