use colored::*;
use indicatif::HumanBytes;

pub fn success(msg: &str) {
    tracing::info!("{} {}", "✓".green(), msg.green());
}

pub fn error(msg: &str) {
    tracing::info!("{} {}", "Error:".red().bold(), msg.red());
}

pub fn info(msg: &str) {
    tracing::info!("{}", msg);
}

pub fn warning(msg: &str) {
    tracing::info!("{}", msg.yellow());
}

pub fn tip(msg: &str) {
    tracing::info!("{} {}", "Tip:".dimmed(), msg.dimmed());
}

pub fn question(msg: &str) {
    tracing::info!("{} {}", "[?]".magenta(), msg.magenta());
}

/// One `name  size` row of a size listing.
pub fn size_row(name: &str, bytes: u64) {
    tracing::info!("  {:<24} {}", name.cyan(), bytes_str(bytes).bold());
}

pub fn bytes_str(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}
