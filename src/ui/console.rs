//! Interactive terminal front end driven entirely by the event bus.
//!
//! Runs as its own tokio task: renders each event as a plain line and answers
//! prompts by reading stdin on a blocking thread, so the engine only ever
//! waits on the prompt's reply channel.

use std::io::{self, BufRead, BufReader};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use super::rendezvous::{PromptKind, PromptReply, PromptRequest};
use super::status_glyph;
use crate::events::{Event, EventBus, Subscription};

type LineSource = Arc<Mutex<Box<dyn BufRead + Send>>>;

/// Counters reported when the front end shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleStats {
    pub events: u64,
    pub prompts_answered: u64,
    pub dropped: u64,
}

pub struct ConsoleFrontend {
    subscription: Subscription,
    input: LineSource,
    /// A stdin read left running by an abandoned prompt; the next prompt takes its line.
    pending_read: Option<JoinHandle<Option<String>>>,
}

impl ConsoleFrontend {
    /// Subscribe to `bus`, reading answers from stdin.
    pub fn new(bus: &EventBus) -> Self {
        Self::with_input(bus, Box::new(BufReader::new(io::stdin())))
    }

    /// Subscribe to `bus`, reading answers from `input`.
    pub fn with_input(bus: &EventBus, input: Box<dyn BufRead + Send>) -> Self {
        ConsoleFrontend {
            subscription: bus.subscribe(),
            input: Arc::new(Mutex::new(input)),
            pending_read: None,
        }
    }

    pub fn spawn(self) -> JoinHandle<ConsoleStats> {
        tokio::spawn(self.run())
    }

    /// Consume events until the bus is closed.
    pub async fn run(mut self) -> ConsoleStats {
        let mut stats = ConsoleStats::default();
        while let Some(event) = self.subscription.recv().await {
            stats.events += 1;
            match event {
                Event::StageStarted { stage } => {
                    println!("\n==> {}: {}", stage.name, stage.description);
                }
                Event::StageCompleted { result, .. } => match &result.error {
                    Some(err) => println!("  {} {}: {}", status_glyph(result.status), result.stage_name, err),
                    None => println!(
                        "  {} {} ({:.1}s)",
                        status_glyph(result.status),
                        result.stage_name,
                        result.duration.as_secs_f64()
                    ),
                },
                Event::Progress { percent, message } => println!("  [{:>3}%] {}", percent, message),
                Event::Log { level, message } => println!("  [{}] {}", level, message),
                Event::Prompt(request) => {
                    if self.answer(request).await {
                        stats.prompts_answered += 1;
                    }
                }
            }
        }
        stats.dropped = self.subscription.dropped();
        if stats.dropped > 0 {
            log::warn!("[Console] {} events were dropped for the terminal", stats.dropped);
        }
        stats
    }

    async fn answer(&mut self, request: PromptRequest) -> bool {
        if request.responder.is_answered() {
            return false;
        }
        print_prompt(&request);

        let mut reader = match self.pending_read.take() {
            Some(reader) => reader,
            None => {
                let input = Arc::clone(&self.input);
                tokio::task::spawn_blocking(move || read_line(&input))
            }
        };

        // Stop waiting on stdin once the engine no longer wants an answer
        let line = tokio::select! {
            line = &mut reader => line.ok().flatten(),
            _ = request.responder.closed() => {
                log::debug!("[Console] prompt '{}' abandoned", request.message);
                println!();
                self.pending_read = Some(reader);
                return false;
            }
        };

        let reply = match line {
            Some(line) => parse_reply(&request, &line),
            // EOF or a broken stdin: take the default
            None => request.default.clone(),
        };
        request.respond(reply)
    }
}

fn read_line(input: &LineSource) -> Option<String> {
    let mut guard = input.lock().ok()?;
    let mut line = String::new();
    match guard.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

fn print_prompt(request: &PromptRequest) {
    match (&request.kind, &request.default) {
        (PromptKind::Confirm, PromptReply::Confirm(default_yes)) => {
            let hint = if *default_yes { "[Y/n]" } else { "[y/N]" };
            println!("  ? {} {}", request.message, hint);
        }
        (PromptKind::Select, _) => {
            println!("  ? {}", request.message);
            for (i, option) in request.options.iter().enumerate() {
                println!("    {}) {}", i + 1, option);
            }
            println!("  choice [1]:");
        }
        (PromptKind::Input, PromptReply::Input(default_value)) => {
            println!("  ? {} [{}]", request.message, default_value);
        }
        _ => println!("  ? {}", request.message),
    }
}

/// Interpret a typed line for `request`. Blank or unparsable input yields the default.
pub fn parse_reply(request: &PromptRequest, line: &str) -> PromptReply {
    let answer = line.trim();
    match request.kind {
        PromptKind::Confirm => match answer.to_lowercase().as_str() {
            "y" | "yes" => PromptReply::Confirm(true),
            "n" | "no" => PromptReply::Confirm(false),
            _ => request.default.clone(),
        },
        PromptKind::Select => answer
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1 && *n <= request.options.len())
            .map(|n| PromptReply::Select(n - 1))
            .unwrap_or_else(|| request.default.clone()),
        PromptKind::Input if answer.is_empty() => request.default.clone(),
        PromptKind::Input => PromptReply::Input(answer.to_string()),
    }
}
