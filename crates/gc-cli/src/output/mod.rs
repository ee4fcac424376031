//! Output formatting utilities for the CLI
//!
//! Stage lines, the summary table and failure details for `gatecheck
//! check`, plus coloured status messages.

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use gc_client::{AttemptReport, HandshakeOutcome};
use gc_core::DeviceInfo;

use crate::report::{StageResult, StageStatus, Summary};

/// Width of the banner rules
const RULE_WIDTH: usize = 60;

/// A horizontal rule
pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn status_icon(status: StageStatus) -> (&'static str, Color) {
    match status {
        StageStatus::Pass => ("✓", Color::Green),
        StageStatus::Fail => ("✗", Color::Red),
        StageStatus::Skip => ("○", Color::DarkGrey),
    }
}

/// Print one stage result as it completes
pub fn print_stage(result: &StageResult) {
    let (icon, color) = status_icon(result.status);
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(color),
        Print(format!("{} ", icon)),
        ResetColor,
        Print(format!(
            "{}: {} ({:.2}ms)\n",
            result.name, result.status, result.duration_ms
        ))
    );
    if !result.message.is_empty() {
        println!("  → {}", result.message);
    }
}

/// Format the per-stage summary table
pub fn format_summary_table(results: &[StageResult]) -> String {
    #[derive(Tabled)]
    struct StageRow {
        #[tabled(rename = "STAGE")]
        name: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "DURATION")]
        duration: String,
        #[tabled(rename = "MESSAGE")]
        message: String,
    }

    let rows: Vec<StageRow> = results
        .iter()
        .map(|r| StageRow {
            name: r.name.clone(),
            status: r.status.to_string(),
            duration: format!("{:.2}ms", r.duration_ms),
            message: truncate(&r.message, 60),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Format the pass/fail/skip counts
pub fn format_counts(summary: &Summary) -> String {
    format!(
        "Total: {}  Passed: {} ✓  Failed: {} ✗  Skipped: {} ○",
        summary.total, summary.passed, summary.failed, summary.skipped
    )
}

/// Format details of every failed stage
pub fn format_failures(results: &[StageResult]) -> String {
    let mut output = String::new();
    for result in results.iter().filter(|r| r.status == StageStatus::Fail) {
        output.push_str(&format!("  ✗ {}\n", result.name));
        output.push_str(&format!("    Reason: {}\n", result.message));
        if !result.details.is_empty() {
            let details = serde_json::to_string(&result.details).unwrap_or_default();
            output.push_str(&format!("    Details: {}\n", truncate(&details, 200)));
        }
    }
    output
}

/// Format a device description
pub fn format_device(device: Option<&DeviceInfo>) -> String {
    match device {
        Some(info) => match &info.fingerprint {
            Some(fingerprint) => format!("{} (key {})", info.id, fingerprint),
            None => info.id.clone(),
        },
        None => "none (token only)".to_string(),
    }
}

/// Format the outcome of a single handshake attempt
pub fn format_attempt(report: &AttemptReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("Gateway:  {}\n", report.peer));
    output.push_str(&format!("Device:   {}\n", format_device(report.device.as_ref())));
    output.push_str(&format!("Elapsed:  {:.2?}\n", report.elapsed));

    match &report.outcome {
        HandshakeOutcome::Succeeded(hello) => {
            output.push_str(&format!("Protocol: {}\n", hello.protocol_version));
            output.push_str(&format!(
                "Token:    {}\n",
                token_preview(&hello.device_token)
            ));
            if let Some(policy) = &hello.policy {
                output.push_str(&format!("Policy:   {}\n", policy));
            }
        }
        HandshakeOutcome::Failed(failure) => {
            output.push_str(&format!("Stage:    {}\n", failure.stage));
            output.push_str(&format!("Error:    {}\n", failure.error));
        }
    }

    if report.ignored_frames > 0 {
        output.push_str(&format!("Ignored:  {} frame(s)\n", report.ignored_frames));
    }
    output
}

/// First characters of a device token, never the whole token
pub fn token_preview(token: &str) -> String {
    let preview: String = token.chars().take(12).collect();
    if token.chars().count() > 12 {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
