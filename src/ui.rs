use std::io::Write;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{format_secs, interpret_response, ChatError, ChatTransport};
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::reply;
use crate::request_fsm::{RequestEvent, RequestLifecycle, RequestState};
use crate::transcript::Transcript;

pub const GREETING: &str = "Hello! I'm the official L'Oréal chatbot, your personal chat assistant.";
pub const PENDING_TEXT: &str = "Thinking...";
const HINT_CHARS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    User,
    Ai,
}

/// Visible surface of a chat session.
pub trait Renderer: Send {
    /// Appends one line. Text is shown as is.
    fn render(&mut self, text: &str, sender: Sender);
    fn show_pending(&mut self, text: &str);
    fn clear_pending(&mut self);
    fn set_input_enabled(&mut self, enabled: bool);
}

/// Line-oriented renderer for terminals and other byte sinks.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    pending: bool,
    closed: bool,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            pending: false,
            closed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// True once a write to the sink has failed, e.g. a closed pipe.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn emit(&mut self, args: std::fmt::Arguments<'_>) {
        if self.closed {
            return;
        }
        if let Err(err) = self.out.write_fmt(args).and_then(|()| self.out.flush()) {
            tracing::debug!(error = %err, "Terminal output failed; further writes are skipped");
            self.closed = true;
        }
    }

    fn label(sender: Sender) -> &'static str {
        match sender {
            Sender::User => "you",
            Sender::Ai => "advisor",
        }
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, text: &str, sender: Sender) {
        self.emit(format_args!("{}> {}\n", Self::label(sender), text));
    }

    fn show_pending(&mut self, text: &str) {
        self.pending = true;
        self.emit(format_args!("{}> {}", Self::label(Sender::Ai), text));
    }

    fn clear_pending(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;
        self.emit(format_args!("\r\x1b[2K"));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if enabled {
            self.emit(format_args!("> "));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    Replied(String),
    Failed(ChatError),
}

/// Text shown to the user for a failed turn.
pub fn failure_message(err: &ChatError, verbose: bool) -> String {
    let full = err.to_string();
    match err {
        ChatError::Timeout(after) => format!(
            "Request timed out after {}s. {}",
            format_secs(after),
            if verbose { full.as_str() } else { "Try again." }
        ),
        ChatError::Cancelled => format!(
            "Request cancelled. {}",
            if verbose { full.as_str() } else { "Try again." }
        ),
        _ => {
            let hint = if verbose {
                full
            } else {
                full.chars().take(HINT_CHARS).collect()
            };
            format!("Whoops! Something went wrong. ({hint}) Please try again.")
        }
    }
}

/// Settles a turn whose `submit` future is dropped while still `Sending`:
/// the request is cancelled, the placeholder cleared and input re-enabled.
struct TurnGuard<'a, R: Renderer> {
    lifecycle: &'a mut RequestLifecycle,
    renderer: &'a mut R,
    cancel: CancellationToken,
}

impl<R: Renderer> Drop for TurnGuard<'_, R> {
    fn drop(&mut self) {
        if !self.lifecycle.state().is_pending() {
            return;
        }
        tracing::warn!("Chat turn abandoned before a response arrived");
        self.cancel.cancel();
        self.renderer.clear_pending();
        self.lifecycle.apply(RequestEvent::Fail);
        self.lifecycle.apply(RequestEvent::Settle);
        self.renderer.set_input_enabled(true);
    }
}

/// One user's conversation: the transcript, the request in flight, and the
/// surface it is drawn on.
///
/// Dropping a `submit` future mid-flight abandons that turn: the user turn
/// stays in the transcript, no reply is rendered, and the session is ready
/// for the next submission.
pub struct ChatSession<T: ChatTransport, R: Renderer> {
    transcript: Transcript,
    transport: T,
    renderer: R,
    lifecycle: RequestLifecycle,
    timeout: Duration,
    verbose: bool,
}

impl<T: ChatTransport, R: Renderer> ChatSession<T, R> {
    pub fn new(transcript: Transcript, transport: T, renderer: R) -> Self {
        Self {
            transcript,
            transport,
            renderer,
            lifecycle: RequestLifecycle::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verbose: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub fn state(&self) -> RequestState {
        self.lifecycle.state()
    }

    pub fn greet(&mut self) {
        self.renderer.render(GREETING, Sender::Ai);
    }

    pub fn render(&mut self, text: &str, sender: Sender) {
        self.renderer.render(text, sender);
    }

    /// Re-arms the input surface without sending anything.
    pub fn ready(&mut self) {
        self.renderer.set_input_enabled(true);
    }

    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        self.submit_with_cancel(text, CancellationToken::new()).await
    }

    pub async fn submit_with_cancel(&mut self, text: &str, cancel: CancellationToken) -> SubmitOutcome {
        let question = text.trim();
        if question.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let Self {
            transcript,
            transport,
            renderer,
            lifecycle,
            timeout,
            verbose,
        } = self;

        // `&mut self` plus the guard below keep the session idle between calls.
        let accepted = lifecycle.apply(RequestEvent::Submit);
        debug_assert!(accepted, "submission while a turn is still pending");

        let mut guard = TurnGuard {
            lifecycle,
            renderer,
            cancel: cancel.clone(),
        };
        guard.renderer.set_input_enabled(false);
        guard.renderer.render(question, Sender::User);
        transcript.push_user(question);
        guard.renderer.show_pending(PENDING_TEXT);

        let result = exchange(&*transport, transcript, *timeout, &cancel).await;
        guard.renderer.clear_pending();

        let outcome = match result {
            Ok(answer) => {
                guard.renderer.render(&answer, Sender::Ai);
                transcript.push_assistant(answer.clone());
                guard.lifecycle.apply(RequestEvent::Succeed);
                SubmitOutcome::Replied(answer)
            }
            Err(err) => {
                tracing::warn!(error = %err, abort = err.is_abort(), "Chat turn failed");
                let event = if matches!(err, ChatError::Timeout(_)) {
                    RequestEvent::TimeOut
                } else {
                    RequestEvent::Fail
                };
                guard.lifecycle.apply(event);
                let message = failure_message(&err, *verbose);
                guard.renderer.render(&message, Sender::Ai);
                SubmitOutcome::Failed(err)
            }
        };

        guard.lifecycle.apply(RequestEvent::Settle);
        guard.renderer.set_input_enabled(true);
        outcome
    }
}

async fn exchange<T: ChatTransport>(
    transport: &T,
    transcript: &Transcript,
    timeout: Duration,
    cancel: &CancellationToken,
) -> std::result::Result<String, ChatError> {
    tracing::debug!(turns = transcript.len(), "Sending transcript");
    let sent = tokio::select! {
        result = transport.send(transcript, cancel) => result,
        _ = tokio::time::sleep(timeout) => {
            cancel.cancel();
            Err(ChatError::Timeout(timeout))
        }
    };

    let body = interpret_response(sent?)?;
    match reply::extract_with_strategy(&body) {
        Some((strategy, text)) => {
            tracing::debug!(strategy, "Reply extracted");
            Ok(text)
        }
        None => {
            tracing::warn!("No known reply shape in response; using fallback text");
            Ok(reply::FALLBACK_REPLY.to_string())
        }
    }
}

/// Slash commands understood by the terminal front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Verbose(Option<bool>),
}

pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "/quit" | "/exit" => Some(Command::Quit),
        "/debug" => match parts.next() {
            None => Some(Command::Verbose(None)),
            Some("on") => Some(Command::Verbose(Some(true))),
            Some("off") => Some(Command::Verbose(Some(false))),
            Some(_) => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawResponse;
    use async_trait::async_trait;

    struct Canned(std::result::Result<RawResponse, ChatError>);

    #[async_trait]
    impl ChatTransport for Canned {
        async fn send(
            &self,
            _transcript: &Transcript,
            _cancel: &CancellationToken,
        ) -> std::result::Result<RawResponse, ChatError> {
            self.0.clone()
        }
    }

    fn session(
        response: std::result::Result<RawResponse, ChatError>,
    ) -> ChatSession<Canned, TerminalRenderer<Vec<u8>>> {
        ChatSession::new(
            Transcript::new("sys"),
            Canned(response),
            TerminalRenderer::new(Vec::new()),
        )
    }

    fn output(session: ChatSession<Canned, TerminalRenderer<Vec<u8>>>) -> String {
        String::from_utf8(session.into_renderer().into_inner()).unwrap()
    }

    #[tokio::test]
    async fn terminal_shows_user_line_reply_and_prompt() {
        let mut chat = session(Ok(RawResponse::ok("u", r#"{"reply":"Use SPF daily."}"#)));
        let outcome = chat.submit("  sunscreen?  ").await;
        assert_eq!(outcome, SubmitOutcome::Replied("Use SPF daily.".to_string()));

        let text = output(chat);
        assert!(text.starts_with("you> sunscreen?\n"));
        assert!(text.contains("advisor> Thinking..."));
        assert!(text.contains("\r\x1b[2Kadvisor> Use SPF daily.\n"));
        assert!(text.ends_with("> "));
    }

    #[tokio::test]
    async fn blank_input_renders_nothing() {
        let mut chat = session(Ok(RawResponse::ok("u", "{}")));
        assert_eq!(chat.submit(" \t\n").await, SubmitOutcome::Ignored);
        assert_eq!(chat.transcript().len(), 1);
        assert_eq!(output(chat), "");
    }

    #[tokio::test]
    async fn failure_leaves_only_the_user_turn() {
        let mut chat = session(Err(ChatError::Transport("connection refused".into())));
        let outcome = chat.submit("hello").await;
        assert!(matches!(outcome, SubmitOutcome::Failed(ChatError::Transport(_))));
        assert_eq!(chat.transcript().len(), 2);
        assert_eq!(chat.state(), RequestState::Idle);
        assert!(output(chat)
            .contains("Whoops! Something went wrong. (connection refused) Please try again."));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_marks_terminal_closed() {
        let mut renderer = TerminalRenderer::new(ClosedPipe);
        assert!(!renderer.is_closed());
        renderer.render("hello", Sender::Ai);
        assert!(renderer.is_closed());
        renderer.set_input_enabled(true);
        assert!(renderer.is_closed());
    }

    #[test]
    fn long_errors_are_cut_to_a_hint() {
        let err = ChatError::Transport("x".repeat(500));
        let short = failure_message(&err, false);
        assert_eq!(short.matches('x').count(), 200);
        let long = failure_message(&err, true);
        assert_eq!(long.matches('x').count(), 500);
    }

    #[test]
    fn timeout_message_differs_from_generic() {
        let err = ChatError::Timeout(Duration::from_secs(25));
        assert_eq!(
            failure_message(&err, false),
            "Request timed out after 25s. Try again."
        );
        assert!(failure_message(&err, true).contains("aborted"));
        assert!(!failure_message(&err, false).contains("Whoops"));
        assert_eq!(
            failure_message(&ChatError::Cancelled, false),
            "Request cancelled. Try again."
        );
    }

    #[test]
    fn slash_commands() {
        assert_eq!(parse_command("/quit"), Some(Command::Quit));
        assert_eq!(parse_command("/debug on"), Some(Command::Verbose(Some(true))));
        assert_eq!(parse_command("/debug off"), Some(Command::Verbose(Some(false))));
        assert_eq!(parse_command("/debug"), Some(Command::Verbose(None)));
        assert_eq!(parse_command("/debug maybe"), None);
        assert_eq!(parse_command("what is /debug"), None);
    }
}
