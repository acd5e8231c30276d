#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use advisor_chat::client::{ChatError, ChatTransport, RawResponse};
use advisor_chat::transcript::Transcript;
use advisor_chat::ui::{Renderer, Sender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Line(Sender, String),
    Pending(String),
    PendingCleared,
    Input(bool),
}

/// Renderer that records every call, shareable with the test body.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    events: Arc<Mutex<Vec<UiEvent>>>,
}

impl RecordingRenderer {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<(Sender, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Line(sender, text) => Some((sender, text)),
                _ => None,
            })
            .collect()
    }

    pub fn last_line(&self) -> Option<(Sender, String)> {
        self.lines().pop()
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, text: &str, sender: Sender) {
        self.push(UiEvent::Line(sender, text.to_string()));
    }

    fn show_pending(&mut self, text: &str) {
        self.push(UiEvent::Pending(text.to_string()));
    }

    fn clear_pending(&mut self) {
        self.push(UiEvent::PendingCleared);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.push(UiEvent::Input(enabled));
    }
}

/// Transport answering every call with the same response and counting calls.
#[derive(Clone)]
pub struct StubTransport {
    response: Result<RawResponse, ChatError>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Transcript>>>,
}

impl StubTransport {
    pub fn replying(body: &str) -> Self {
        Self::with(Ok(RawResponse::ok("http://proxy.test/api/chat", body)))
    }

    pub fn with(response: Result<RawResponse, ChatError>) -> Self {
        Self {
            response,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Transcript> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for StubTransport {
    async fn send(
        &self,
        transcript: &Transcript,
        _cancel: &CancellationToken,
    ) -> Result<RawResponse, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(transcript.clone());
        self.response.clone()
    }
}

/// Transport that never answers on its own; it only returns once cancelled.
#[derive(Clone, Default)]
pub struct HangingTransport {
    cancelled: Arc<AtomicUsize>,
}

impl HangingTransport {
    pub fn cancellations(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for HangingTransport {
    async fn send(
        &self,
        _transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, ChatError> {
        cancel.cancelled().await;
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Err(ChatError::Cancelled)
    }
}
