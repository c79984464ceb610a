//! ac-core: Core types for agent-chat
//!
//! This crate provides the markdown renderer, the conversation model and the
//! controller that drives a streamed chat turn against an abstract transport
//! and view.

pub mod controller;
pub mod decoder;
pub mod error;
pub mod markdown;
pub mod message;
pub mod transcript;
pub mod transport;
pub mod view;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use controller::{
    Controller, Key, TurnOutcome, TurnState, UiEvent, CONNECTION_ERROR_MESSAGE,
    GENERIC_ERROR_MESSAGE,
};
pub use decoder::Utf8StreamDecoder;
pub use error::Error;
pub use markdown::{escape_html, render, render_with, HtmlTheme, DEFAULT_ACCENT};
pub use message::{ChatRequest, ConversationHistory, Role, Turn};
pub use transcript::HtmlTranscript;
pub use transport::{ByteStream, ChatResponse, ChatTransport};
pub use view::{BubbleId, ChatView};

pub type Result<T> = std::result::Result<T, Error>;
