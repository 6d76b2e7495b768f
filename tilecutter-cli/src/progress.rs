//! Single-line text progress display.

use std::io::{self, Write};
use std::time::Duration;

use tilecutter::ProgressEvent;

const BAR_WIDTH: usize = 30;

/// ASCII bar: `#` for done, `-` for remaining.
pub fn render_bar(completed: u64, total: u64, width: usize) -> String {
    let ratio = if total == 0 {
        1.0
    } else {
        (completed as f64 / total as f64).clamp(0.0, 1.0)
    };
    let filled = (ratio * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Format a duration in compact form (e.g. "42s", "3m 05s", "1h 02m").
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Text of one progress line.
pub fn progress_line(event: &ProgressEvent) -> String {
    format!(
        "{} {:>3.0}% {}/{} {}",
        render_bar(event.completed, event.total, BAR_WIDTH),
        event.fraction() * 100.0,
        event.completed,
        event.total,
        event.label
    )
}

/// Redraws the progress line in place when attached to a terminal.
pub struct ProgressDisplay {
    interactive: bool,
    last_label: String,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        Self {
            interactive: atty::is(atty::Stream::Stdout),
            last_label: String::new(),
        }
    }

    pub fn update(&mut self, event: &ProgressEvent) {
        if self.interactive {
            print!("\r{}", progress_line(event));
            let _ = io::stdout().flush();
        } else if event.label != self.last_label {
            // Non-interactive output only gets one line per zoom level
            println!("{}", event.label);
        }
        self.last_label.clone_from(&event.label);
    }

    pub fn finish(&self) {
        if self.interactive {
            println!();
        }
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}
