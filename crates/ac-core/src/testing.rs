//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Error;
use crate::message::ChatRequest;
use crate::transport::{ChatResponse, ChatTransport};
use crate::view::{BubbleId, ChatView};

enum Scripted {
    Failure { status: u16, body: Vec<u8> },
    Stream(Vec<Result<Vec<u8>, Error>>),
    Error(Error),
    Pending,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<Scripted>,
    captured_requests: Vec<ChatRequest>,
}

/// A transport that returns pre-configured replies in FIFO order.
///
/// Clones share the same queue, so a test can keep a handle after boxing one
/// into a controller.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, reply: Scripted) {
        self.state.lock().unwrap().replies.push_back(reply);
    }

    /// Queue a successful reply streamed as the given text chunks.
    pub fn queue_stream<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chunks = chunks
            .into_iter()
            .map(|c| Ok(c.as_ref().as_bytes().to_vec()))
            .collect();
        self.push(Scripted::Stream(chunks));
    }

    /// Queue a successful reply streamed as raw byte chunks.
    pub fn queue_byte_stream(&self, chunks: Vec<Vec<u8>>) {
        self.push(Scripted::Stream(chunks.into_iter().map(Ok).collect()));
    }

    /// Queue a reply that streams some text chunks and then fails.
    pub fn queue_broken_stream<I, S>(&self, chunks: I, error: Error)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut items: Vec<Result<Vec<u8>, Error>> = chunks
            .into_iter()
            .map(|c| Ok(c.as_ref().as_bytes().to_vec()))
            .collect();
        items.push(Err(error));
        self.push(Scripted::Stream(items));
    }

    /// Queue a non-2xx response.
    pub fn queue_failure(&self, status: u16, body: &[u8]) {
        self.push(Scripted::Failure {
            status,
            body: body.to_vec(),
        });
    }

    /// Queue a request that never completes.
    pub fn queue_error(&self, error: Error) {
        self.push(Scripted::Error(error));
    }

    /// Queue a request whose response never arrives.
    pub fn queue_pending(&self) {
        self.push(Scripted::Pending);
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().captured_requests.len()
    }

    pub fn captured_requests(&self) -> Vec<ChatRequest> {
        self.state.lock().unwrap().captured_requests.clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, Error> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.captured_requests.push(request.clone());
            state.replies.pop_front()
        };
        match reply {
            Some(Scripted::Failure { status, body }) => Ok(ChatResponse::Failure { status, body }),
            Some(Scripted::Stream(items)) => {
                Ok(ChatResponse::Stream(Box::pin(futures::stream::iter(items))))
            }
            Some(Scripted::Error(error)) => Err(error),
            Some(Scripted::Pending) => futures::future::pending().await,
            None => Err(Error::network("No mock reply queued")),
        }
    }
}

/// Every mutation a [`RecordingView`] has seen, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOp {
    AppendUser(String),
    AppendBot(BubbleId, String),
    ReplaceBubble(BubbleId, String),
    ShowTyping,
    RemoveTyping,
    Scroll,
    SetInput(String),
    Focus,
    SetSendEnabled(bool),
}

/// A view that records operations and keeps the resulting state.
#[derive(Debug, Clone)]
pub struct RecordingView {
    pub ops: Vec<ViewOp>,
    pub user_bubbles: Vec<String>,
    /// Current HTML of every bot bubble, indexed by `BubbleId`.
    pub bot_bubbles: Vec<String>,
    pub typing: bool,
    pub input: String,
    pub focused: bool,
    pub send_enabled: bool,
}

impl RecordingView {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            user_bubbles: Vec::new(),
            bot_bubbles: Vec::new(),
            typing: false,
            input: String::new(),
            focused: false,
            send_enabled: true,
        }
    }
}

impl Default for RecordingView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView for RecordingView {
    fn append_user_bubble(&mut self, text: &str) {
        self.ops.push(ViewOp::AppendUser(text.to_string()));
        self.user_bubbles.push(text.to_string());
    }

    fn append_bot_bubble(&mut self, html: &str) -> BubbleId {
        let id = BubbleId(self.bot_bubbles.len());
        self.ops.push(ViewOp::AppendBot(id, html.to_string()));
        self.bot_bubbles.push(html.to_string());
        id
    }

    fn replace_bubble(&mut self, id: BubbleId, html: &str) {
        self.ops.push(ViewOp::ReplaceBubble(id, html.to_string()));
        if let Some(bubble) = self.bot_bubbles.get_mut(id.0) {
            *bubble = html.to_string();
        }
    }

    fn show_typing(&mut self) {
        self.ops.push(ViewOp::ShowTyping);
        self.typing = true;
    }

    fn remove_typing(&mut self) {
        self.ops.push(ViewOp::RemoveTyping);
        self.typing = false;
    }

    fn scroll_to_latest(&mut self) {
        self.ops.push(ViewOp::Scroll);
    }

    fn input_text(&self) -> String {
        self.input.clone()
    }

    fn set_input_text(&mut self, text: &str) {
        self.ops.push(ViewOp::SetInput(text.to_string()));
        self.input = text.to_string();
    }

    fn focus_input(&mut self) {
        self.ops.push(ViewOp::Focus);
        self.focused = true;
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        self.ops.push(ViewOp::SetSendEnabled(enabled));
        self.send_enabled = enabled;
    }
}
