//! ac-client: HTTP transport for agent-chat
//!
//! Implements [`ac_core::ChatTransport`] on top of reqwest, posting chat
//! requests as JSON and handing back the response body as a byte stream.

mod http;

pub use http::{HttpTransport, DEFAULT_CHAT_PATH};
