use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Error;
use crate::message::ChatRequest;

/// Raw body chunks of a successful response, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, Error>> + Send>>;

/// Outcome of a request that reached the server.
pub enum ChatResponse {
    /// Non-2xx status with whatever body the server sent.
    Failure { status: u16, body: Vec<u8> },
    /// 2xx status; the body streams the assistant's reply.
    Stream(ByteStream),
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatResponse::Failure { status, body } => f
                .debug_struct("Failure")
                .field("status", status)
                .field("body_len", &body.len())
                .finish(),
            ChatResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Sends chat requests to the agent endpoint.
///
/// `Err` means the request never completed (connection refused, reset, ...).
/// A server that answered with an error status is `Ok(ChatResponse::Failure)`.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, Error>;
}
