mod styling;

use chrono::{DateTime, Local};

use crate::config::Config;
use crate::monitor::TickOutcome;
use crate::status::CanonicalStatus;

use styling::{
    blue, bright, bright_green, bright_red, bright_yellow, cyan, dim, magenta, magenta_bold,
};

/// Prints the buildlight banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚦 buildlight"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Azure DevOps build traffic light")
    );
}

/// Prints what is being monitored and how.
pub fn print_startup(config: &Config, driver: &str) {
    let azure = &config.azure_devops;
    println!(
        "{}",
        bright("Starting Azure DevOps pipeline monitoring... Press Ctrl+C to stop.")
    );
    println!("  Organization: {}", cyan(&azure.organization));
    println!("  Project:      {}", cyan(&azure.project));
    println!("  Pipeline ID:  {}", cyan(&azure.pipeline_id));
    println!("  Indicator:    {}", cyan(driver));

    let hours = &config.business_hours;
    if hours.days_of_week.is_empty() {
        println!("  Active:       {}", dim("always"));
    } else {
        println!(
            "  Active:       {} {:02}:00-{:02}:00",
            dim(hours.days_of_week.join(", ")),
            hours.start_hour,
            hours.end_hour
        );
    }
}

/// One-line verdict for a status, as shown to the operator.
pub fn verdict(status: CanonicalStatus, label: &str) -> String {
    match status {
        CanonicalStatus::Succeeded => "✅ Build passed".to_string(),
        CanonicalStatus::Failed => "🚨 Build failed".to_string(),
        CanonicalStatus::PartiallySucceeded => "⚠️  Build partially succeeded".to_string(),
        CanonicalStatus::InProgress => "🏃 Build in progress".to_string(),
        CanonicalStatus::Canceled => "🛑 Build cancelled".to_string(),
        CanonicalStatus::OffDuty => "🌙 Outside business hours".to_string(),
        CanonicalStatus::Unknown => format!("❔ Build status unknown ({label})"),
    }
}

fn styled_verdict(status: CanonicalStatus, label: &str) -> String {
    let text = verdict(status, label);
    match status {
        CanonicalStatus::Succeeded => bright_green(text).to_string(),
        CanonicalStatus::Failed => bright_red(text).to_string(),
        CanonicalStatus::PartiallySucceeded | CanonicalStatus::Canceled => {
            magenta(text).to_string()
        }
        CanonicalStatus::InProgress => bright_yellow(text).to_string(),
        CanonicalStatus::OffDuty => dim(text).to_string(),
        CanonicalStatus::Unknown => blue(text).to_string(),
    }
}

/// Prints the conclusion of a tick and when the next one is due.
pub fn print_tick(outcome: &TickOutcome, next_check: DateTime<Local>) {
    println!(
        "Overall Status: {} {}",
        bright(&outcome.label),
        dim(format!("[{}]", outcome.color))
    );
    println!("{}", styled_verdict(outcome.status, &outcome.label));
    println!(
        "{}",
        dim(format!("Next check at {}", next_check.format("%H:%M:%S")))
    );
}

/// Prints the result of a one-off status lookup.
pub fn print_status(status: CanonicalStatus, label: &str) {
    println!("Overall Status: {}", bright(label));
    println!("{}", styled_verdict(status, label));
}
