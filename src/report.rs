//! Terminal output for chat exchanges and settings.

use colored::*;
use std::path::Path;

use crate::analyzer::is_failure;
use crate::settings::{mask_key, Settings, KEYS};

/// Who said something in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Assistant => "AI Assistant",
        }
    }
}

/// Print one transcript entry.
pub fn write_entry(speaker: Speaker, text: &str) {
    let label = match speaker {
        Speaker::User => speaker.label().blue().bold(),
        Speaker::Assistant if is_failure(text) => speaker.label().red().bold(),
        Speaker::Assistant => speaker.label().green().bold(),
    };
    println!("{}:", label);
    if speaker == Speaker::Assistant && is_failure(text) {
        println!("{}", text.trim_end().red());
    } else {
        println!("{}", text.trim_end());
    }
    println!();
}

/// Print all settings with the key masked.
pub fn write_settings(settings: &Settings, path: &Path) {
    println!("  {} {}", "Settings file:".bold(), path.display());
    println!();
    for key in KEYS {
        let value = match *key {
            "api_key" => mask_key(&settings.api_key),
            other => settings.get(other).unwrap_or_default(),
        };
        println!("  {:<14} {}", key, value);
    }
    println!();
    let status = if settings.is_configured() {
        "✓ configured".green()
    } else {
        "✗ not configured".red()
    };
    println!("  {}", status);
}
