//! Leveled notification sink for user-facing messages.

use std::sync::Mutex;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

pub trait Notifier: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

/// Routes notifications into `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info | Severity::Success => info!(target: "comps::notify", "{message}"),
            Severity::Warning => warn!(target: "comps::notify", "{message}"),
            Severity::Error => error!(target: "comps::notify", "{message}"),
        }
    }
}

/// Keeps every notification so callers can replay them later.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.lock().clone()
    }

    pub fn take(&self) -> Vec<(Severity, String)> {
        std::mem::take(&mut *self.lock())
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lock()
            .iter()
            .filter(|(level, _)| *level == severity)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Severity, String)>> {
        match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn log(&self, severity: Severity, message: &str) {
        self.lock().push((severity, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recorder_counts_and_drains() {
        let recorder = RecordingNotifier::new();
        recorder.log(Severity::Warning, "first");
        recorder.log(Severity::Success, "second");
        recorder.log(Severity::Warning, "third");

        assert_eq!(recorder.count(Severity::Warning), 2);
        assert_eq!(recorder.messages().len(), 3);
        assert_eq!(
            recorder.take(),
            vec![
                (Severity::Warning, "first".to_string()),
                (Severity::Success, "second".to_string()),
                (Severity::Warning, "third".to_string()),
            ]
        );
        assert!(recorder.messages().is_empty());
    }
}
