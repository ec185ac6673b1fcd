//! Plain terminal output helpers.

use std::fmt::Display;

/// Print a section header.
pub fn section(title: &str) {
    println!();
    println!("{title}");
}

/// Print an aligned `label: value` line.
pub fn field(label: &str, value: impl Display) {
    println!("  {label:<20} {value}");
}

/// Print an indented note.
pub fn note(message: &str) {
    println!("  {message}");
}

pub fn success(message: &str) {
    println!("✓ {message}");
}
