//! Styled terminal output.

use console::{Style, style};

/// Print a success line.
pub fn success(msg: &str) {
    println!("{} {msg}", style("✓").green().bold());
}

/// Print an error line.
pub fn error(msg: &str) {
    println!("{} {msg}", style("✗").red().bold());
}

/// Print a warning line.
pub fn warning(msg: &str) {
    println!("{} {msg}", style("⚠").yellow().bold());
}

/// Print an info line.
pub fn info(msg: &str) {
    println!("{} {msg}", style("ℹ").blue().bold());
}

/// Print a section title.
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Outcome of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

/// Print one health check result.
pub fn health_check(name: &str, status: HealthStatus, detail: Option<&str>) {
    let (icon, label, status_style) = match status {
        HealthStatus::Ok => (style("✓").green(), "OK", Style::new().green()),
        HealthStatus::Warning => (style("⚠").yellow(), "WARNING", Style::new().yellow()),
        HealthStatus::Error => (style("✗").red(), "ERROR", Style::new().red()),
    };

    print!("  {icon} {name}: {}", status_style.apply_to(label));
    if let Some(d) = detail {
        print!(" - {}", style(d).dim());
    }
    println!();
}

/// Print the startup banner.
pub fn banner() {
    println!(
        "{}",
        style(
            r"
   ___ __ _ _ ____   ____ _ ___ ___
  / __/ _` | '_ \ \ / / _` / __/ __|
 | (_| (_| | | | \ V / (_| \__ \__ \
  \___\__,_|_| |_|\_/ \__,_|___/___/
"
        )
        .cyan()
    );
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    println!("  {}: {value}", style(key).bold());
}

/// Print a row of fixed-width columns.
pub fn table_row(cols: &[(&str, usize)]) {
    for (text, width) in cols {
        print!("{text:width$}", width = *width);
    }
    println!();
}
