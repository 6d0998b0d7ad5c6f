//! Console reporter.
//!
//! Human-facing progress lines with ANSI colours. These never fail; anything
//! worth keeping for diagnostics is also emitted as a `tracing` event by the
//! caller.

pub const BOLD: &str = "\x1b[1m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const RESET: &str = "\x1b[0m";

pub fn success(message: &str) {
    println!("{BOLD}{GREEN}✓ {message}{RESET}");
}

pub fn error(message: &str) {
    eprintln!("{BOLD}{RED}Error:{RESET} {message}");
}

pub fn info(message: &str) {
    println!("{BOLD}{BLUE}Info:{RESET} {message}");
}

pub fn warning(message: &str) {
    println!("{BOLD}{YELLOW}Warning:{RESET} {message}");
}

/// Prints a numbered pipeline step, preceded by a blank line after step 1.
pub fn step(number: usize, message: &str) {
    if number > 1 {
        println!();
    }
    println!("{BOLD}Step {number}:{RESET} {message}");
}

/// Prints a `=== title ===` banner.
pub fn headline(title: &str) {
    println!("{BOLD}{BLUE}=== {title} ==={RESET}\n");
}

/// Prints the command for uploading a package by hand.
pub fn manual_upload_hint(ipa: &std::path::Path) {
    println!("\nYou can manually upload using:");
    println!("  xcrun altool --upload-app --type ios --file {}", ipa.display());
}
