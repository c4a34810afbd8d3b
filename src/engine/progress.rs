//! Terminal progress for reconciliation phases

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{Operation, Phase, ProgressCallback};

/// Shows a bar per phase and one line per store mutation
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn println(&self, line: String) {
        if self.quiet {
            return;
        }
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

/// Line printed for an operation, if it is worth reporting
pub fn operation_line(operation: &Operation) -> Option<String> {
    match operation {
        Operation::Put { path, .. } => Some(format!("    {} wrote {path}", "✓".green())),
        Operation::Delete { path } => Some(format!("    {} deleted {path}", "✓".green())),
        Operation::Untrack { path } => Some(format!("    {} untracked {path}", "○".dimmed())),
        Operation::Read { path, found: false } => {
            Some(format!("    {} {path} not found, using default", "⚠".yellow()))
        }
        Operation::KeepRewritten { .. }
        | Operation::SkipEmptyWrite { .. }
        | Operation::Read { .. } => None,
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_phase_start(&mut self, phase: Phase, count: usize) {
        if self.quiet || count == 0 {
            return;
        }
        let bar = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("    {spinner:.green} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix(phase.to_string());
        self.bar = Some(bar);
    }

    fn on_operation(&mut self, operation: &Operation) {
        if let Some(line) = operation_line(operation) {
            self.println(line);
        }
        if let Some(bar) = &self.bar {
            bar.set_message(operation.path().to_string());
            bar.inc(1);
        }
    }

    fn on_phase_complete(&mut self, _phase: Phase) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_lines() {
        colored::control::set_override(false);
        assert_eq!(
            operation_line(&Operation::Put {
                path: "a".into(),
                flags: 0
            })
            .as_deref(),
            Some("    ✓ wrote a")
        );
        assert!(
            operation_line(&Operation::Read {
                path: "a".into(),
                found: false
            })
            .unwrap()
            .contains("not found")
        );
        assert!(operation_line(&Operation::Read {
            path: "a".into(),
            found: true
        })
        .is_none());
        assert!(operation_line(&Operation::KeepRewritten { path: "a".into() }).is_none());
    }

    #[test]
    fn test_quiet_progress_creates_no_bar() {
        let mut progress = TerminalProgress::new(true);
        progress.on_phase_start(Phase::Write, 3);
        assert!(progress.bar.is_none());
        progress.on_operation(&Operation::Delete { path: "a".into() });
        progress.on_phase_complete(Phase::Write);
    }

    #[test]
    fn test_bar_lifecycle() {
        let mut progress = TerminalProgress::new(false);
        progress.on_phase_start(Phase::Delete, 2);
        assert!(progress.bar.is_some());
        progress.on_phase_complete(Phase::Delete);
        assert!(progress.bar.is_none());
    }
}
