//! Prompt Rendezvous Tests
//!
//! A prompt published on the bus resolves to the first reply, or to its
//! default when the run is cancelled, the responder is dropped, or the reply
//! has the wrong shape.

use std::io::{BufReader, Cursor, Read};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use strixforge::ui::rendezvous::request_reply;
use strixforge::ui::{PromptKind, PromptReply};
use strixforge::{cancel_pair, CancelToken, ConsoleFrontend, Event, EventBus, EventUi, Ui};

/// Answer the next prompt on `bus` with `reply`.
fn answer_next(bus: &EventBus, reply: PromptReply) -> tokio::task::JoinHandle<bool> {
    let mut sub = bus.subscribe();
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            if let Event::Prompt(request) = event {
                return request.respond(reply);
            }
        }
        false
    })
}

#[tokio::test]
async fn test_confirm_gets_reply() {
    let bus = Arc::new(EventBus::new());
    let answered = answer_next(&bus, PromptReply::Confirm(false));
    let ui = EventUi::new(Arc::clone(&bus), CancelToken::never());

    assert!(!ui.confirm("Install yay?", true).await);
    assert!(answered.await.unwrap());
}

#[tokio::test]
async fn test_select_and_input_get_replies() {
    let bus = Arc::new(EventBus::new());
    let ui = EventUi::new(Arc::clone(&bus), CancelToken::never());
    let options = vec!["ai-lab".to_string(), "dev-lab".to_string()];

    let answered = answer_next(&bus, PromptReply::Select(1));
    assert_eq!(ui.select("Container", &options).await, 1);
    answered.await.unwrap();

    let answered = answer_next(&bus, PromptReply::Input("gpu-box".to_string()));
    assert_eq!(ui.input("Name", "ai-lab").await, "gpu-box");
    answered.await.unwrap();
}

#[tokio::test]
async fn test_out_of_range_select_resolves_first_option() {
    let bus = Arc::new(EventBus::new());
    let ui = EventUi::new(Arc::clone(&bus), CancelToken::never());
    let options = vec!["a".to_string(), "b".to_string()];

    let answered = answer_next(&bus, PromptReply::Select(7));
    assert_eq!(ui.select("Pick", &options).await, 0);
    answered.await.unwrap();
}

#[tokio::test]
async fn test_wrong_kind_reply_resolves_default() {
    let bus = EventBus::new();
    let answered = answer_next(&bus, PromptReply::Input("yes".to_string()));

    let reply = request_reply(
        &bus,
        &CancelToken::never(),
        PromptKind::Confirm,
        "Proceed?",
        Vec::new(),
        PromptReply::Confirm(true),
    )
    .await;

    assert_eq!(reply, PromptReply::Confirm(true));
    assert!(answered.await.unwrap());
}

#[tokio::test]
async fn test_dropped_responder_resolves_default() {
    let bus = Arc::new(EventBus::new());
    let mut sub = bus.subscribe();
    let dropper = tokio::spawn(async move {
        // Take the prompt and drop it unanswered
        matches!(sub.recv().await, Some(Event::Prompt(_)))
    });
    let ui = EventUi::new(Arc::clone(&bus), CancelToken::never());

    assert_eq!(ui.input("Name", "dev-lab").await, "dev-lab");
    assert!(dropper.await.unwrap());
}

#[tokio::test]
async fn test_cancel_resolves_pending_prompt_to_default() {
    let bus = Arc::new(EventBus::new());
    // Subscribed but never answers
    let _silent = bus.subscribe();
    let (handle, token) = cancel_pair();
    let ui = EventUi::new(Arc::clone(&bus), token);

    let pending = tokio::spawn(async move { ui.confirm("Wait forever?", false).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    let answer = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("prompt outlived cancellation")
        .unwrap();
    assert!(!answer);
}

#[tokio::test]
async fn test_first_of_several_answers_wins() {
    let bus = Arc::new(EventBus::new());
    let first = answer_next(&bus, PromptReply::Confirm(false));
    let second = answer_next(&bus, PromptReply::Confirm(true));
    let ui = EventUi::new(Arc::clone(&bus), CancelToken::never());

    let answer = ui.confirm("Race?", true).await;
    let wins = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(wins.iter().filter(|w| **w).count(), 1);
    // The first subscriber answers no, the second yes
    assert_eq!(answer, wins[1]);
}

#[tokio::test]
async fn test_console_answers_from_input() {
    let bus = Arc::new(EventBus::new());
    let input = Cursor::new(b"n\n2\n\n".to_vec());
    let console = ConsoleFrontend::with_input(&bus, Box::new(input)).spawn();
    let ui = EventUi::new(Arc::clone(&bus), CancelToken::never());
    let options = vec!["ai-lab".to_string(), "dev-lab".to_string()];

    assert!(!ui.confirm("Run optional stage: Thermal?", true).await);
    assert_eq!(ui.select("Container", &options).await, 1);
    assert_eq!(ui.input("Name", "ai-lab").await, "ai-lab");

    bus.close();
    let stats = console.await.unwrap();
    assert_eq!(stats.prompts_answered, 3);
    assert_eq!(stats.events, 3);
    assert_eq!(stats.dropped, 0);
}

/// Terminal input fed line by line; reads block until a line is sent.
struct ChannelReader {
    lines: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.lines.recv() {
                Ok(line) => self.pending = line,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

#[tokio::test]
async fn test_console_moves_on_from_abandoned_prompt() {
    let bus = Arc::new(EventBus::new());
    let (typed, lines) = mpsc::channel();
    let input = BufReader::new(ChannelReader { lines, pending: Vec::new() });
    let console = ConsoleFrontend::with_input(&bus, Box::new(input)).spawn();

    // Nobody types; cancelling resolves the prompt to its default
    let (handle, token) = cancel_pair();
    let cancelled = EventUi::new(Arc::clone(&bus), token);
    let pending = tokio::spawn(async move { cancelled.confirm("Run optional stage: Thermal?", true).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();
    let answer = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("prompt outlived cancellation")
        .unwrap();
    assert!(answer);

    // The console is free again and the next typed line answers the next prompt
    let ui = EventUi::new(Arc::clone(&bus), CancelToken::never());
    let next = tokio::spawn(async move { ui.confirm("Install yay?", true).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    typed.send(b"n\n".to_vec()).unwrap();
    let answer = tokio::time::timeout(Duration::from_secs(1), next)
        .await
        .expect("console stuck on the abandoned prompt")
        .unwrap();
    assert!(!answer);

    bus.close();
    let stats = tokio::time::timeout(Duration::from_secs(1), console)
        .await
        .expect("console did not finish after the bus closed")
        .unwrap();
    assert_eq!(stats.prompts_answered, 1);
    assert_eq!(stats.events, 2);
    drop(typed);
}
