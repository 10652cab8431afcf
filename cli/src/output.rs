use std::sync::{Mutex, MutexGuard};

use adminkit_core::api::{ExecutionResult, OutputEvent, OutputSink, OutputStream, ProgressUpdate};
use indicatif::{ProgressBar, ProgressStyle};

/// Streams tool output to the terminal. Progress markers drive a bar that
/// appears on the first marker; ordinary lines print above it.
pub struct ConsoleSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { bar: Mutex::new(None) }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn print(&self, line: &str, stderr: bool) {
        let emit = || {
            if stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        };
        match self.bar().as_ref() {
            Some(bar) => bar.suspend(emit),
            None => emit(),
        }
    }

    fn progress(&self, update: &ProgressUpdate) {
        let mut slot = self.bar();
        let bar = slot.get_or_insert_with(new_bar);
        if let Some(percent) = update.percent {
            bar.set_position(u64::from(percent));
        }
        let message = [update.activity.as_deref(), update.status.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" - ");
        if !message.is_empty() {
            bar.set_message(message);
        }
    }
}

impl OutputSink for ConsoleSink {
    fn on_output(&self, _correlation_id: &str, event: OutputEvent) {
        match event.stream {
            OutputStream::Stdout => self.print(&event.line, false),
            OutputStream::Stderr => self.print(&event.line, true),
            OutputStream::Progress => match &event.progress {
                Some(update) => self.progress(update),
                None => self.print(&event.line, false),
            },
        }
    }

    fn on_result(&self, _correlation_id: &str, _result: &ExecutionResult) {
        if let Some(bar) = self.bar().take() {
            bar.finish_and_clear();
        }
    }
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanised() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.5 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
