use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

use ac_core::{ChatRequest, ChatResponse, ChatTransport, Error};

/// Path of the chat endpoint relative to the server's base URL.
pub const DEFAULT_CHAT_PATH: &str = "/api/chat";

pub struct HttpTransport {
    client: Client,
    base_url: String,
    chat_path: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        // Configure client for incremental body delivery:
        // - Use HTTP/1.1 to avoid HTTP/2 framing issues
        // - Disable automatic decompression which can buffer entire response
        let client = Client::builder()
            .http1_only()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
        }
    }

    pub fn with_chat_path(mut self, chat_path: impl Into<String>) -> Self {
        self.chat_path = chat_path.into();
        self
    }

    /// Full URL requests are posted to.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.chat_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, Error> {
        let url = self.url();
        debug!("POST {} ({} history turns)", url, request.history.len());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // An unreadable error body is treated like an empty one.
            let body = response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .unwrap_or_default();
            debug!("Chat endpoint returned {} with {} byte body", status, body.len());
            return Ok(ChatResponse::Failure {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| Error::stream(e.to_string()))
        });
        Ok(ChatResponse::Stream(Box::pin(body)))
    }
}
