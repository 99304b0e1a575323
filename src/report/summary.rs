// Summary - colored console output for the end of a run

use colored::*;
use std::fmt::Display;
use std::path::Path;

/// Prints a section header with visual separation.
pub fn header(title: &str) {
    println!();
    println!("{}", format!("─── {} ───", title).bright_blue().bold());
}

/// Prints one `label: value` line.
pub fn line(label: &str, value: impl Display) {
    println!("  {} {}", format!("{}:", label).bright_blue(), value);
}

/// Prints a titled list of value counts.
pub fn counts(title: &str, counts: &[(String, usize)], unit: &str) {
    if counts.is_empty() {
        return;
    }
    println!("  {}", title.bold());
    for (value, count) in counts {
        let value = if value.is_empty() { "(none)" } else { value.as_str() };
        println!("    {} {}: {} {}", "*".dimmed(), value, count, unit);
    }
}

/// Prints the path of the written workbook.
pub fn saved(what: &str, path: &Path) {
    println!();
    println!(
        "{} {} saved to {}",
        "✔".bright_green().bold(),
        what,
        path.display().to_string().bold()
    );
}

/// Prints a highlighted call to action.
pub fn attention(message: &str) {
    println!();
    println!("{}", format!("*** {} ***", message).yellow().bold());
}

/// Prints the "nothing found" outcome.
pub fn nothing_found(message: &str) {
    println!();
    println!("{} {}", "⚠".yellow().bold(), message);
}
