//! Spy stages, a scripted UI and a fake platform shared by the integration tests.

#![allow(dead_code)]

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use strixforge::device::DeviceKind;
use strixforge::{
    CancelHandle, Device, HardwareError, LogLevel, Platform, RunContext, Stage, StageError, StageInfo,
    StageResult, Ui,
};

/// Shared record of which stage bodies ran, in order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub struct SpyStage {
    id: String,
    optional: bool,
    outcome: Result<(), StageError>,
    calls: CallLog,
    rollbacks: Arc<AtomicUsize>,
    cancel_on_run: Option<Arc<CancelHandle>>,
}

impl SpyStage {
    pub fn ok(id: &str, calls: &CallLog) -> Self {
        SpyStage {
            id: id.to_string(),
            optional: false,
            outcome: Ok(()),
            calls: Arc::clone(calls),
            rollbacks: Arc::new(AtomicUsize::new(0)),
            cancel_on_run: None,
        }
    }

    pub fn failing(id: &str, calls: &CallLog, reason: &str) -> Self {
        SpyStage {
            outcome: Err(StageError::Failed(reason.to_string())),
            ..SpyStage::ok(id, calls)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Cancel the run from inside this stage's body.
    pub fn cancelling(mut self, handle: Arc<CancelHandle>) -> Self {
        self.cancel_on_run = Some(handle);
        self
    }

    pub fn rollback_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.rollbacks)
    }
}

impl Stage for SpyStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "spy"
    }

    fn optional(&self) -> bool {
        self.optional
    }

    fn run<'a>(&'a self, _ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        async move {
            self.calls.lock().unwrap().push(self.id.clone());
            ui.info(&format!("running {}", self.id));
            if let Some(handle) = &self.cancel_on_run {
                handle.cancel();
            }
            self.outcome.clone()
        }
        .boxed()
    }

    fn rollback<'a>(&'a self, _ctx: &'a RunContext) -> BoxFuture<'a, Result<(), StageError>> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(())).boxed()
    }
}

pub struct FakePlatform {
    stages: Vec<Arc<dyn Stage>>,
    invalid: Option<String>,
}

impl FakePlatform {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        FakePlatform { stages, invalid: None }
    }

    pub fn refusing(reason: &str, stages: Vec<Arc<dyn Stage>>) -> Self {
        FakePlatform {
            stages,
            invalid: Some(reason.to_string()),
        }
    }
}

impl Platform for FakePlatform {
    fn name(&self) -> &str {
        "Fake"
    }

    fn detect(&self) -> BoxFuture<'_, Result<Device, HardwareError>> {
        futures::future::ready(Ok(Device::new(DeviceKind::Generic, "Acme", "Box 9000"))).boxed()
    }

    fn stages(&self) -> Vec<Arc<dyn Stage>> {
        self.stages.clone()
    }

    fn validate(&self) -> BoxFuture<'_, Result<(), StageError>> {
        let outcome = match &self.invalid {
            Some(reason) => Err(StageError::Requirement(reason.clone())),
            None => Ok(()),
        };
        futures::future::ready(outcome).boxed()
    }
}

/// UI with canned confirm answers, keyed by a substring of the prompt.
#[derive(Default)]
pub struct ScriptedUi {
    answers: HashMap<String, bool>,
    pub prompts: Mutex<Vec<String>>,
    pub logs: Mutex<Vec<(LogLevel, String)>>,
    pub started: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<StageResult>>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, fragment: &str, yes: bool) -> Self {
        self.answers.insert(fragment.to_string(), yes);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn logged(&self, fragment: &str) -> bool {
        self.logs.lock().unwrap().iter().any(|(_, m)| m.contains(fragment))
    }
}

impl Ui for ScriptedUi {
    fn stage_start(&self, stage: &StageInfo) {
        self.started.lock().unwrap().push(stage.id.clone());
    }

    fn stage_complete(&self, result: &StageResult) {
        self.completed.lock().unwrap().push(result.clone());
    }

    fn progress(&self, _percent: u8, _message: &str) {}

    fn log(&self, level: LogLevel, message: &str) {
        self.logs.lock().unwrap().push((level, message.to_string()));
    }

    fn confirm<'a>(&'a self, message: &'a str, default_yes: bool) -> BoxFuture<'a, bool> {
        self.prompts.lock().unwrap().push(message.to_string());
        let answer = self
            .answers
            .iter()
            .find(|(fragment, _)| message.contains(fragment.as_str()))
            .map(|(_, yes)| *yes)
            .unwrap_or(default_yes);
        futures::future::ready(answer).boxed()
    }

    fn select<'a>(&'a self, _message: &'a str, _options: &'a [String]) -> BoxFuture<'a, usize> {
        futures::future::ready(0).boxed()
    }

    fn input<'a>(&'a self, _message: &'a str, default_value: &'a str) -> BoxFuture<'a, String> {
        futures::future::ready(default_value.to_string()).boxed()
    }
}

pub fn arc(stage: SpyStage) -> Arc<dyn Stage> {
    Arc::new(stage)
}
