//! CLI output formatting

use crate::{
    core::{ProgressSnapshot, RunStatus, StageDescriptor},
    execution::ProvisionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Resolution of the progress bar
const BAR_LENGTH: u64 = 100;

/// Create the run progress bar
pub fn create_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new(BAR_LENGTH);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Message shown next to the bar
pub fn progress_message(snapshot: &ProgressSnapshot) -> String {
    if let Some(error) = &snapshot.error {
        return format!("{}", style(error).red());
    }
    if snapshot.complete && snapshot.phase.is_settled() {
        return format!("{}", style("Done!").green());
    }

    let title = snapshot.stage_title.as_deref().unwrap_or("title");
    match snapshot.subtasks_total {
        Some(total) if total > 0 => {
            format!("Creating {}... ({}/{})", title, snapshot.subtasks_completed, total)
        }
        _ => format!("Creating {}...", title),
    }
}

/// Move the bar to the snapshot's position
pub fn render_progress(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    bar.set_position((snapshot.fraction * BAR_LENGTH as f64).round() as u64);
    bar.set_message(progress_message(snapshot));
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Completed => style("COMPLETED").green().to_string(),
        RunStatus::Halted => style("HALTED").red().to_string(),
        RunStatus::Aborted => style("ABORTED").yellow().to_string(),
    }
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Completed => CHECK,
        RunStatus::Halted => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Aborted => WARN,
    };

    let mut line = format!(
        "{} {} - {} - {} ({}/{}) - {}",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.title_id).bold(),
        format_status(summary.status),
        summary.stages_completed,
        summary.total_stages,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    );
    if let Some(error) = &summary.last_error {
        line.push_str(&format!(" - {}", style(error).red()));
    }
    line
}

/// One line of the `stages` listing
pub fn format_stage(index: usize, stage: &StageDescriptor, calls: Option<usize>) -> String {
    let calls = match calls {
        Some(n) => format!(" - {} call{}", n, if n == 1 { "" } else { "s" }),
        None => String::new(),
    };
    format!(
        "  {}. {} {} ({:?}){}",
        index + 1,
        style(stage.key).cyan(),
        style(stage.title).bold(),
        stage.kind,
        calls
    )
}

/// Format a provisioning event for display
///
/// Dispatch events are left to the debug log.
pub fn format_provision_event(event: &ProvisionEvent) -> Option<String> {
    let line = match event {
        ProvisionEvent::RunStarted {
            run_id,
            total_stages,
        } => format!(
            "{} Provisioning {} stages ({})",
            ROCKET,
            total_stages,
            style(&run_id.to_string()[..8]).dim()
        ),
        ProvisionEvent::StageStarted { title, items, .. } => {
            format!("{} Creating {} ({} calls)", SPINNER, style(title).cyan(), items)
        }
        ProvisionEvent::ItemDispatched { .. } => return None,
        ProvisionEvent::ItemSucceeded { label, .. } => {
            format!("  {} {}", CHECK, style(label).dim())
        }
        ProvisionEvent::ItemFailed { label, error, .. } => {
            format!("  {} {}: {}", CROSS, style(label).red(), style(error).dim())
        }
        ProvisionEvent::StageCompleted { title, .. } => {
            format!("{} Created {}", CHECK, style(title).green())
        }
        ProvisionEvent::Halted { error, .. } => {
            format!("{} Halted: {}", CROSS, style(error).red())
        }
        ProvisionEvent::ErrorCleared { .. } => format!("{} Error cleared", INFO),
        ProvisionEvent::ItemsRetried { count, .. } => {
            format!("{} Retrying {} failed call(s)", WARN, style(count).yellow())
        }
        ProvisionEvent::RunCompleted { run_id } => format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            style("completed").green()
        ),
        ProvisionEvent::RunAborted { run_id, .. } => format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            style("aborted").yellow()
        ),
    };
    Some(line)
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
