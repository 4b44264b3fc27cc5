//! UI adapter that records a stage's log lines into its result.

use futures::future::BoxFuture;
use std::sync::Mutex;

use crate::models::{LogEntry, LogLevel, StageInfo, StageResult};
use crate::ui::Ui;

pub(crate) struct CapturingUi<'a> {
    inner: &'a dyn Ui,
    entries: Mutex<Vec<LogEntry>>,
}

impl<'a> CapturingUi<'a> {
    pub(crate) fn new(inner: &'a dyn Ui) -> Self {
        CapturingUi {
            inner,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn into_entries(self) -> Vec<LogEntry> {
        self.entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Ui for CapturingUi<'_> {
    fn stage_start(&self, stage: &StageInfo) {
        self.inner.stage_start(stage);
    }

    fn stage_complete(&self, result: &StageResult) {
        self.inner.stage_complete(result);
    }

    fn progress(&self, percent: u8, message: &str) {
        self.inner.progress(percent, message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry::new(level, message));
        }
        log::log!(log::Level::from(level), "[Stage] {}", message);
        self.inner.log(level, message);
    }

    fn confirm<'b>(&'b self, message: &'b str, default_yes: bool) -> BoxFuture<'b, bool> {
        self.inner.confirm(message, default_yes)
    }

    fn select<'b>(&'b self, message: &'b str, options: &'b [String]) -> BoxFuture<'b, usize> {
        self.inner.select(message, options)
    }

    fn input<'b>(&'b self, message: &'b str, default_value: &'b str) -> BoxFuture<'b, String> {
        self.inner.input(message, default_value)
    }
}
