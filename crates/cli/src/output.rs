//! Output formatting for the runner

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use sitecheck::{CaseStatus, TestSuiteResult};

/// Print the run header
pub fn print_banner(site_root: &str, browsers: &[String]) {
    println!("{}", "=".repeat(60));
    println!("{}", "MB Secure Website Test Runner".bold());
    println!("{}", "=".repeat(60));
    println!("Site root: {}", site_root);
    println!("Browsers:  {}", browsers.join(", "));
    println!();
}

fn status_cell(status: &CaseStatus) -> Cell {
    match status {
        CaseStatus::Passed => Cell::new("PASS").fg(Color::Green),
        CaseStatus::Failed(_) => Cell::new("FAIL").fg(Color::Red),
        CaseStatus::Skipped(_) => Cell::new("SKIP").fg(Color::Yellow),
    }
}

/// Table of failed and skipped cases followed by the totals
pub fn print_summary(result: &TestSuiteResult, verbose: bool) {
    let notable: Vec<_> = result
        .results
        .iter()
        .filter(|r| verbose || !matches!(r.status, CaseStatus::Passed))
        .collect();

    if !notable.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Status", "Test", "Time (ms)", "Details"]);

        for r in notable {
            let details = match &r.status {
                CaseStatus::Passed => String::new(),
                CaseStatus::Failed(msg) | CaseStatus::Skipped(msg) => msg.clone(),
            };
            table.add_row(vec![
                status_cell(&r.status),
                Cell::new(&r.id),
                Cell::new(r.duration_ms),
                Cell::new(details),
            ]);
        }
        println!("{table}");
    }

    let totals = format!(
        "{} passed, {} failed, {} skipped in {:.1}s",
        result.passed,
        result.failed,
        result.skipped,
        result.duration_ms as f64 / 1000.0
    );
    println!();
    if result.success() {
        print_success(&totals);
    } else {
        print_error(&totals);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message.green());
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{}  {}", "⚠️".yellow(), message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
