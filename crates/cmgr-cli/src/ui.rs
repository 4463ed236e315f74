use colored::Colorize;
use serde::Serialize;

use cmgr_core::deps::DependencySnapshot;
use cmgr_core::profile::{ProfileState, ProfileStatus};

// ---------------------------------------------------------------------------
// Colored message helpers
// ---------------------------------------------------------------------------

fn prefix() -> String {
    "[cmgr]".bold().cyan().to_string()
}

/// Print an informational message: [cmgr] message
pub fn info(msg: &str) {
    println!("{} {}", prefix(), msg);
}

/// Print a success message: [cmgr] message (in green)
pub fn success(msg: &str) {
    println!("{} {}", prefix(), msg.green());
}

/// Print a warning message: [cmgr] message (in yellow)
pub fn warn(msg: &str) {
    println!("{} {}", prefix(), msg.yellow());
}

/// Print pretty JSON to stdout.
pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Status table
// ---------------------------------------------------------------------------

fn state_label(state: ProfileState) -> String {
    let label = state.to_string();
    match state {
        ProfileState::Running => label.green().to_string(),
        ProfileState::Starting | ProfileState::NotStarted => label.yellow().to_string(),
        _ => label.red().to_string(),
    }
}

/// Print a status line with a bold label and a value.
pub fn status_line(label: &str, value: &str) {
    println!("  {:<14} {}", format!("{}:", label).bold(), value);
}

fn yes_no(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".dimmed().to_string()
    }
}

pub fn profile_status(status: &ProfileStatus) {
    println!("{}", format!("profile {}", status.profile).bold());
    status_line("State", &state_label(status.state));
    status_line("CPUs", &status.cpus.to_string());
    status_line("Memory", &format!("{} GiB", status.memory));
    status_line("Disk", &format!("{} GiB", status.disk_size));
    status_line("Kubernetes", &yes_no(status.kubernetes));
}

fn with_detail(present: bool, detail: &str) -> String {
    if present && !detail.is_empty() {
        format!("{} ({})", yes_no(present), detail)
    } else {
        yes_no(present)
    }
}

pub fn dependencies(snapshot: &DependencySnapshot) {
    println!("{}", "dependencies".bold());
    status_line("Homebrew", &with_detail(snapshot.homebrew, &snapshot.homebrew_path));
    let colima = if snapshot.colima_path.is_empty() {
        snapshot.colima_version.clone()
    } else {
        format!("{}, {}", snapshot.colima_version, snapshot.colima_path)
    };
    status_line("Colima", &with_detail(snapshot.colima, &colima));
    status_line("Lima", &with_detail(snapshot.lima, &snapshot.lima_version));
}
