//! Prompt rendezvous between the sequential engine and asynchronous front ends.
//!
//! The engine side publishes an [`Event::Prompt`] carrying a [`PromptResponder`]
//! and awaits the reply. Whoever answers first wins; if nobody answers (no
//! subscriber, event dropped, responder dropped) or the run is cancelled, the
//! prompt resolves to its declared default. A prompt never fails and never
//! outlives cancellation.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::task::Poll;
use tokio::sync::oneshot;

use super::Ui;
use crate::context::CancelToken;
use crate::events::{Event, EventBus};
use crate::models::{LogLevel, StageInfo, StageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Confirm,
    Select,
    Input,
}

/// Typed answer to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    Confirm(bool),
    Select(usize),
    Input(String),
}

impl PromptReply {
    pub fn kind(&self) -> PromptKind {
        match self {
            PromptReply::Confirm(_) => PromptKind::Confirm,
            PromptReply::Select(_) => PromptKind::Select,
            PromptReply::Input(_) => PromptKind::Input,
        }
    }
}

/// Single-use reply handle. Clones share the same slot, so a prompt fanned out
/// to several subscribers is answered exactly once.
#[derive(Clone)]
pub struct PromptResponder {
    slot: Arc<Mutex<Option<oneshot::Sender<PromptReply>>>>,
}

impl PromptResponder {
    pub fn channel() -> (Self, oneshot::Receiver<PromptReply>) {
        let (tx, rx) = oneshot::channel();
        (
            PromptResponder {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Deliver `reply`. Returns false if the prompt was already answered or
    /// the waiting side has gone away.
    pub fn respond(&self, reply: PromptReply) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Resolves once nobody is waiting for the reply any more, or the prompt
    /// has already been answered.
    pub async fn closed(&self) {
        futures::future::poll_fn(|cx| {
            let mut slot = match self.slot.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };
            match slot.as_mut() {
                Some(tx) => tx.poll_closed(cx),
                None => Poll::Ready(()),
            }
        })
        .await
    }

    pub fn is_answered(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl fmt::Debug for PromptResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptResponder")
            .field("answered", &self.is_answered())
            .finish()
    }
}

/// A prompt as seen by a front end.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub kind: PromptKind,
    pub message: String,
    /// Choices for a Select prompt; empty otherwise.
    pub options: Vec<String>,
    pub default: PromptReply,
    pub responder: PromptResponder,
}

impl PromptRequest {
    pub fn respond(&self, reply: PromptReply) -> bool {
        self.responder.respond(reply)
    }

    pub fn accept_default(&self) -> bool {
        self.responder.respond(self.default.clone())
    }
}

/// Publish a prompt on `bus` and wait for its reply, the default on
/// cancellation, or the default if the responder is dropped unanswered.
pub async fn request_reply(
    bus: &EventBus,
    cancel: &CancelToken,
    kind: PromptKind,
    message: &str,
    options: Vec<String>,
    default: PromptReply,
) -> PromptReply {
    let (responder, reply_rx) = PromptResponder::channel();
    bus.publish(Event::Prompt(PromptRequest {
        kind,
        message: message.to_string(),
        options,
        default: default.clone(),
        responder,
    }));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            log::debug!("[Prompt] cancelled while waiting on '{}', using default", message);
            default
        }
        reply = reply_rx => match reply {
            Ok(reply) if reply.kind() == kind => reply,
            Ok(other) => {
                log::warn!("[Prompt] '{}' got a {:?} reply, using default", message, other.kind());
                default
            }
            Err(_) => {
                log::debug!("[Prompt] nobody answered '{}', using default", message);
                default
            }
        },
    }
}

/// Front-end adapter that routes every prompt through the event bus.
pub struct EventUi {
    bus: Arc<EventBus>,
    cancel: CancelToken,
}

impl EventUi {
    pub fn new(bus: Arc<EventBus>, cancel: CancelToken) -> Self {
        EventUi { bus, cancel }
    }
}

impl Ui for EventUi {
    // The engine publishes StageStarted/StageCompleted itself.
    fn stage_start(&self, _stage: &StageInfo) {}
    fn stage_complete(&self, _result: &StageResult) {}

    fn progress(&self, percent: u8, message: &str) {
        self.bus.publish(Event::Progress {
            percent: percent.min(100),
            message: message.to_string(),
        });
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.bus.publish(Event::Log {
            level,
            message: message.to_string(),
        });
    }

    fn confirm<'a>(&'a self, message: &'a str, default_yes: bool) -> BoxFuture<'a, bool> {
        async move {
            let reply = request_reply(
                &self.bus,
                &self.cancel,
                PromptKind::Confirm,
                message,
                Vec::new(),
                PromptReply::Confirm(default_yes),
            )
            .await;
            match reply {
                PromptReply::Confirm(answer) => answer,
                _ => default_yes,
            }
        }
        .boxed()
    }

    fn select<'a>(&'a self, message: &'a str, options: &'a [String]) -> BoxFuture<'a, usize> {
        async move {
            let reply = request_reply(
                &self.bus,
                &self.cancel,
                PromptKind::Select,
                message,
                options.to_vec(),
                PromptReply::Select(0),
            )
            .await;
            match reply {
                PromptReply::Select(index) if index < options.len() => index,
                _ => 0,
            }
        }
        .boxed()
    }

    fn input<'a>(&'a self, message: &'a str, default_value: &'a str) -> BoxFuture<'a, String> {
        async move {
            let reply = request_reply(
                &self.bus,
                &self.cancel,
                PromptKind::Input,
                message,
                Vec::new(),
                PromptReply::Input(default_value.to_string()),
            )
            .await;
            match reply {
                PromptReply::Input(value) => value,
                _ => default_value.to_string(),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_respond_wins() {
        let (responder, mut rx) = PromptResponder::channel();
        let clone = responder.clone();
        assert!(responder.respond(PromptReply::Confirm(false)));
        assert!(!clone.respond(PromptReply::Confirm(true)));
        assert!(clone.is_answered());
        assert_eq!(rx.try_recv().unwrap(), PromptReply::Confirm(false));
    }

    #[test]
    fn test_respond_after_receiver_dropped() {
        let (responder, rx) = PromptResponder::channel();
        drop(rx);
        assert!(!responder.respond(PromptReply::Input("x".to_string())));
    }

    #[tokio::test]
    async fn test_closed_when_waiter_goes_away() {
        let (responder, rx) = PromptResponder::channel();
        let watcher = responder.clone();
        let closed = tokio::spawn(async move { watcher.closed().await });
        drop(rx);
        tokio::time::timeout(std::time::Duration::from_secs(1), closed)
            .await
            .expect("closed() never resolved")
            .unwrap();
        assert!(!responder.respond(PromptReply::Confirm(true)));
    }

    #[tokio::test]
    async fn test_no_subscriber_resolves_default() {
        let ui = EventUi::new(Arc::new(EventBus::new()), CancelToken::never());
        assert!(ui.confirm("Proceed?", true).await);
        assert_eq!(ui.input("Container name", "dev-lab").await, "dev-lab");
    }
}
