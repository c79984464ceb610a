//! Conversation controller.
//!
//! Owns the session history and drives one turn at a time:
//! `Idle -> AwaitingResponse -> Streaming -> Idle`. Any failure goes straight
//! back to `Idle` after a single bubble telling the user what happened.

use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::decoder::Utf8StreamDecoder;
use crate::error::Error;
use crate::markdown::{render_with, HtmlTheme};
use crate::message::{ChatRequest, ConversationHistory};
use crate::transport::{ByteStream, ChatResponse, ChatTransport};
use crate::view::ChatView;

/// Shown when the server reports an error without a usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Failed to communicate with the Agent.";

/// Shown when the request or the response stream fails in transit.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error while talking to server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Input was empty after trimming; nothing happened.
    Skipped,
    /// The reply streamed to completion and was added to history.
    Completed { content: String },
    /// The server answered with a non-2xx status.
    ServerError { status: u16, message: String },
    /// The request or the stream failed in transit.
    TransportFailure { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Char(char),
    Other,
}

/// Input events from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SendClicked,
    KeyPress(Key),
    /// An example block was clicked; carries its literal text.
    ExampleClicked(String),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Message for an error response body, falling back to the generic text when
/// the body is missing, not JSON, or carries no `error` string.
fn server_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .unwrap_or_default()
        .error
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}

pub struct Controller<V: ChatView> {
    transport: Box<dyn ChatTransport>,
    view: V,
    history: ConversationHistory,
    theme: HtmlTheme,
    state: TurnState,
}

impl<V: ChatView> Controller<V> {
    pub fn new(transport: Box<dyn ChatTransport>, view: V) -> Self {
        Self {
            transport,
            view,
            history: ConversationHistory::new(),
            theme: HtmlTheme::default(),
            state: TurnState::Idle,
        }
    }

    pub fn with_theme(mut self, theme: HtmlTheme) -> Self {
        self.theme = theme;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    /// Dispatch a UI event. Returns the turn outcome when the event submitted
    /// the input, `None` when it only touched the input field.
    pub async fn handle(&mut self, event: UiEvent) -> Option<TurnOutcome> {
        match event {
            UiEvent::SendClicked | UiEvent::KeyPress(Key::Enter) => {
                let text = self.view.input_text();
                Some(self.submit(&text).await)
            }
            UiEvent::KeyPress(_) => None,
            UiEvent::ExampleClicked(text) => {
                self.view.set_input_text(text.trim());
                self.view.focus_input();
                None
            }
        }
    }

    /// Send one user message and stream the reply into the view.
    pub async fn submit(&mut self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Skipped;
        }
        self.history.push_user(text);
        self.view.clear_input();
        self.view.append_user_bubble(text);
        self.view.show_typing();
        self.view.scroll_to_latest();
        self.view.set_send_enabled(false);
        self.state = TurnState::AwaitingResponse;

        let request = ChatRequest::new(text, self.history.prior_context().to_vec());
        debug!(
            "Sending chat request ({} chars, {} prior turns)",
            request.message.len(),
            request.history.len()
        );

        let mut turn = TurnGuard { controller: self };
        let outcome = turn.controller.run_turn(&request).await;
        turn.finish();
        debug!("Turn finished: {:?}", outcome);
        outcome
    }

    async fn run_turn(&mut self, request: &ChatRequest) -> TurnOutcome {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return self.fail_transport(e),
        };

        self.view.remove_typing();

        match response {
            ChatResponse::Failure { status, body } => {
                let message = server_error_message(&body);
                warn!("Chat endpoint returned {}: {}", status, message);
                self.append_bot_message(&format!("Error: {}", message));
                TurnOutcome::ServerError { status, message }
            }
            ChatResponse::Stream(body) => self.stream_reply(body).await,
        }
    }

    async fn stream_reply(&mut self, mut body: ByteStream) -> TurnOutcome {
        self.state = TurnState::Streaming;
        let bubble = self.view.append_bot_bubble("");
        let mut decoder = Utf8StreamDecoder::new();
        let mut buffer = String::new();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => return self.fail_transport(e),
            };
            trace!("Received {} bytes ({} buffered chars)", bytes.len(), buffer.len());

            buffer.push_str(&decoder.decode(&bytes));
            self.view.replace_bubble(bubble, &render_with(&buffer, &self.theme));
            self.view.scroll_to_latest();
        }

        if decoder.has_pending() {
            warn!("Response ended inside a UTF-8 sequence");
            buffer.push_str(&decoder.finish());
            self.view.replace_bubble(bubble, &render_with(&buffer, &self.theme));
            self.view.scroll_to_latest();
        }

        self.history.push_assistant(buffer.clone());
        TurnOutcome::Completed { content: buffer }
    }

    fn fail_transport(&mut self, error: Error) -> TurnOutcome {
        warn!("Chat transport failed: {}", error);
        self.view.remove_typing();
        self.append_bot_message(CONNECTION_ERROR_MESSAGE);
        TurnOutcome::TransportFailure {
            reason: error.to_string(),
        }
    }

    fn append_bot_message(&mut self, text: &str) {
        let html = render_with(text, &self.theme);
        self.view.append_bot_bubble(&html);
        self.view.scroll_to_latest();
    }
}

/// Returns the controller to `Idle` when a turn ends, including when the
/// submit future is dropped before the turn completes.
struct TurnGuard<'a, V: ChatView> {
    controller: &'a mut Controller<V>,
}

impl<V: ChatView> TurnGuard<'_, V> {
    fn finish(&mut self) {
        self.controller.state = TurnState::Idle;
        self.controller.view.set_send_enabled(true);
    }
}

impl<V: ChatView> Drop for TurnGuard<'_, V> {
    fn drop(&mut self) {
        if self.controller.state == TurnState::Idle {
            return;
        }
        warn!("Turn abandoned while {:?}", self.controller.state);
        self.controller.view.remove_typing();
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::render;
    use crate::message::{Role, Turn};
    use crate::testing::{MockTransport, RecordingView, ViewOp};
    use futures::FutureExt;

    fn controller(transport: MockTransport) -> (Controller<RecordingView>, MockTransport) {
        let handle = transport.clone();
        (Controller::new(Box::new(transport), RecordingView::new()), handle)
    }

    #[test]
    fn test_server_error_message() {
        assert_eq!(server_error_message(br#"{"error":"rate limited"}"#), "rate limited");
        assert_eq!(server_error_message(b""), GENERIC_ERROR_MESSAGE);
        assert_eq!(server_error_message(b"<html>502</html>"), GENERIC_ERROR_MESSAGE);
        assert_eq!(server_error_message(br#"{"error":""}"#), GENERIC_ERROR_MESSAGE);
        assert_eq!(server_error_message(br#"{"error":42}"#), GENERIC_ERROR_MESSAGE);
        assert_eq!(server_error_message(br#"{"detail":"x"}"#), GENERIC_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_whitespace_submit_is_skipped() {
        let (mut controller, transport) = controller(MockTransport::new());

        assert_eq!(controller.submit("   \n\t").await, TurnOutcome::Skipped);
        assert_eq!(controller.submit("").await, TurnOutcome::Skipped);

        assert!(controller.history().is_empty());
        assert!(controller.view().ops.is_empty());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_streamed_reply_matches_unsplit_render() {
        let transport = MockTransport::new();
        transport.queue_stream(["Hel", "lo **wo", "rld**"]);
        let (mut controller, _) = controller(transport);

        let outcome = controller.submit("hi").await;

        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                content: "Hello **world**".to_string()
            }
        );
        let view = controller.view();
        assert_eq!(view.bot_bubbles.last().map(String::as_str), Some(render("Hello **world**").as_str()));
        assert_eq!(
            controller.history().turns(),
            &[Turn::user("hi"), Turn::assistant("Hello **world**")]
        );
        assert_eq!(controller.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_renders_grow_monotonically() {
        let transport = MockTransport::new();
        transport.queue_stream(["Hel", "lo **wo", "rld**"]);
        let (mut controller, _) = controller(transport);

        controller.submit("hi").await;

        let replaced: Vec<&str> = controller
            .view()
            .ops
            .iter()
            .filter_map(|op| match op {
                ViewOp::ReplaceBubble(_, html) => Some(html.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            replaced,
            vec![
                render("Hel").as_str(),
                render("Hello **wo").as_str(),
                render("Hello **world**").as_str(),
            ]
        );
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_chunks() {
        let text = "naïve ⚙️ *tool* **done**";
        let bytes = text.as_bytes();
        // Split inside the two-byte 'ï' and inside the gear glyph.
        let first = &bytes[..3];
        let second = &bytes[3..8];
        let third = &bytes[8..];

        let transport = MockTransport::new();
        transport.queue_byte_stream(vec![first.to_vec(), second.to_vec(), third.to_vec()]);
        let (mut controller, _) = controller(transport);

        controller.submit("go").await;

        assert_eq!(controller.history().last(), Some(&Turn::assistant(text)));
        assert_eq!(controller.view().bot_bubbles.last(), Some(&render(text)));
    }

    #[tokio::test]
    async fn test_request_excludes_current_message_from_history() {
        let transport = MockTransport::new();
        transport.queue_stream(["first reply"]);
        transport.queue_stream(["second reply"]);
        let (mut controller, transport) = controller(transport);

        controller.submit("  first  ").await;
        controller.submit("second").await;

        let requests = transport.captured_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], ChatRequest::new("first", vec![]));
        assert_eq!(
            requests[1],
            ChatRequest::new(
                "second",
                vec![Turn::user("first"), Turn::assistant("first reply")]
            )
        );
        assert_eq!(controller.history().len(), 4);
    }

    #[tokio::test]
    async fn test_server_error_with_message() {
        let transport = MockTransport::new();
        transport.queue_failure(429, br#"{"error":"rate limited"}"#);
        let (mut controller, _) = controller(transport);

        let outcome = controller.submit("hi").await;

        assert_eq!(
            outcome,
            TurnOutcome::ServerError {
                status: 429,
                message: "rate limited".to_string()
            }
        );
        assert_eq!(controller.view().bot_bubbles, vec!["Error: rate limited".to_string()]);
        assert!(!controller.view().typing);
        assert_eq!(controller.history().turns(), &[Turn::user("hi")]);
    }

    #[tokio::test]
    async fn test_server_error_without_body() {
        let transport = MockTransport::new();
        transport.queue_failure(500, b"");
        let (mut controller, _) = controller(transport);

        controller.submit("hi").await;

        assert_eq!(
            controller.view().bot_bubbles,
            vec!["Error: Failed to communicate with the Agent.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let transport = MockTransport::new();
        transport.queue_error(Error::network("connection refused"));
        let (mut controller, _) = controller(transport);

        let outcome = controller.submit("hi").await;

        assert!(matches!(outcome, TurnOutcome::TransportFailure { .. }));
        assert_eq!(controller.view().bot_bubbles, vec![CONNECTION_ERROR_MESSAGE.to_string()]);
        assert!(!controller.view().typing);
        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.state(), TurnState::Idle);
        assert!(controller.view().send_enabled);
    }

    #[tokio::test]
    async fn test_stream_failure_midway_keeps_partial_bubble() {
        let transport = MockTransport::new();
        transport.queue_broken_stream(["partial "], Error::stream("connection reset"));
        let (mut controller, _) = controller(transport);

        let outcome = controller.submit("hi").await;

        assert!(matches!(outcome, TurnOutcome::TransportFailure { .. }));
        assert_eq!(
            controller.view().bot_bubbles,
            vec![render("partial "), CONNECTION_ERROR_MESSAGE.to_string()]
        );
        assert!(controller
            .history()
            .turns()
            .iter()
            .all(|turn| turn.role == Role::User));
    }

    #[tokio::test]
    async fn test_view_sequence_for_successful_turn() {
        let transport = MockTransport::new();
        transport.queue_stream(["ok"]);
        let (mut controller, _) = controller(transport);
        controller.view_mut().set_input_text("hello");

        controller.handle(UiEvent::KeyPress(Key::Enter)).await;

        let ops = &controller.view().ops;
        assert_eq!(ops[0], ViewOp::SetInput("hello".to_string()));
        assert_eq!(ops[1], ViewOp::SetInput(String::new()));
        assert_eq!(ops[2], ViewOp::AppendUser("hello".to_string()));
        assert_eq!(ops[3], ViewOp::ShowTyping);
        assert!(ops.contains(&ViewOp::SetSendEnabled(false)));
        assert!(ops.contains(&ViewOp::RemoveTyping));
        assert_eq!(ops.last(), Some(&ViewOp::SetSendEnabled(true)));
        assert_eq!(controller.view().user_bubbles, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_user_bubble_is_not_markdown_rendered() {
        let transport = MockTransport::new();
        transport.queue_stream(["ok"]);
        let (mut controller, _) = controller(transport);

        controller.submit("**not bold** <b>").await;

        assert_eq!(controller.view().user_bubbles, vec!["**not bold** <b>".to_string()]);
    }

    #[tokio::test]
    async fn test_send_click_submits_input() {
        let transport = MockTransport::new();
        transport.queue_stream(["reply"]);
        let (mut controller, transport) = controller(transport);
        controller.view_mut().set_input_text("from input");

        let outcome = controller.handle(UiEvent::SendClicked).await;

        assert!(matches!(outcome, Some(TurnOutcome::Completed { .. })));
        assert_eq!(transport.captured_requests()[0].message, "from input");
        assert_eq!(controller.view().input, "");
    }

    #[tokio::test]
    async fn test_other_keys_do_nothing() {
        let (mut controller, transport) = controller(MockTransport::new());
        controller.view_mut().set_input_text("draft");

        assert_eq!(controller.handle(UiEvent::KeyPress(Key::Char('a'))).await, None);
        assert_eq!(controller.handle(UiEvent::KeyPress(Key::Other)).await, None);
        assert_eq!(transport.request_count(), 0);
        assert_eq!(controller.view().input, "draft");
    }

    #[tokio::test]
    async fn test_example_click_fills_and_focuses_input() {
        let (mut controller, transport) = controller(MockTransport::new());

        let outcome = controller
            .handle(UiEvent::ExampleClicked("\n  What is my balance?  \n".to_string()))
            .await;

        assert_eq!(outcome, None);
        assert_eq!(controller.view().input, "What is my balance?");
        assert!(controller.view().focused);
        assert_eq!(transport.request_count(), 0);
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_failure() {
        let transport = MockTransport::new();
        transport.queue_error(Error::network("down"));
        transport.queue_stream(["back"]);
        let (mut controller, _) = controller(transport);

        controller.submit("one").await;
        let outcome = controller.submit("two").await;

        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                content: "back".to_string()
            }
        );
        assert_eq!(
            controller.history().turns(),
            &[Turn::user("one"), Turn::user("two"), Turn::assistant("back")]
        );
    }

    #[tokio::test]
    async fn test_abandoned_turn_returns_to_idle() {
        let transport = MockTransport::new();
        transport.queue_pending();
        transport.queue_stream(["second reply"]);
        let (mut controller, transport) = controller(transport);

        assert_eq!(controller.submit("one").now_or_never(), None);

        assert_eq!(controller.state(), TurnState::Idle);
        assert!(!controller.view().typing);
        assert!(controller.view().send_enabled);

        let outcome = controller.submit("two").await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                content: "second reply".to_string()
            }
        );
        assert_eq!(transport.request_count(), 2);
        assert_eq!(
            transport.captured_requests()[1],
            ChatRequest::new("two", vec![Turn::user("one")])
        );
    }
}
