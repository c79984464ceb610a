//! In-memory HTML rendition of the chat page.

use crate::markdown::escape_html;
use crate::view::{BubbleId, ChatView};

const TYPING_INDICATOR: &str = r#"<div class="message bot-msg typing" id="typing-indicator"><span></span><span></span><span></span></div>"#;

const PAGE_STYLE: &str = "body{background:#111;color:#eee;font-family:sans-serif;margin:0;}\
#chat-history{max-width:760px;margin:0 auto;padding:16px;}\
.message{margin:8px 0;padding:10px 14px;border-radius:10px;line-height:1.45;}\
.user-msg{background:#2a2a2a;margin-left:20%;}\
.user-msg pre{margin:0;white-space:pre-wrap;font-family:inherit;}\
.bot-msg{background:#1b1f17;margin-right:20%;}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    User(String),
    Bot(BubbleId),
    Typing,
}

/// The history container as a list of message bubbles, plus the input and
/// send-control state.
#[derive(Debug, Clone)]
pub struct HtmlTranscript {
    nodes: Vec<Node>,
    bots: Vec<String>,
    input: String,
    send_enabled: bool,
}

impl HtmlTranscript {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            bots: Vec::new(),
            input: String::new(),
            send_enabled: true,
        }
    }

    /// Current HTML content of a bot bubble.
    pub fn bot_html(&self, id: BubbleId) -> Option<&str> {
        self.bots.get(id.0).map(String::as_str)
    }

    /// Number of bubbles in the history, including the typing indicator.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_typing(&self) -> bool {
        self.nodes.contains(&Node::Typing)
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Inner HTML of the history container.
    pub fn to_fragment(&self) -> String {
        let mut html = String::new();
        for node in &self.nodes {
            match node {
                Node::User(text) => {
                    html.push_str(r#"<div class="message user-msg"><pre>"#);
                    html.push_str(&escape_html(text));
                    html.push_str("</pre></div>");
                }
                Node::Bot(id) => {
                    html.push_str(r#"<div class="message bot-msg"><div>"#);
                    html.push_str(self.bot_html(*id).unwrap_or_default());
                    html.push_str("</div></div>");
                }
                Node::Typing => html.push_str(TYPING_INDICATOR),
            }
            html.push('\n');
        }
        html
    }

    /// A standalone HTML document showing the conversation.
    pub fn to_page(&self, title: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
             <style>{}</style>\n</head>\n<body>\n<div id=\"chat-history\">\n{}</div>\n</body>\n</html>\n",
            escape_html(title),
            PAGE_STYLE,
            self.to_fragment()
        )
    }
}

impl Default for HtmlTranscript {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView for HtmlTranscript {
    fn append_user_bubble(&mut self, text: &str) {
        self.nodes.push(Node::User(text.to_string()));
    }

    fn append_bot_bubble(&mut self, html: &str) -> BubbleId {
        let id = BubbleId(self.bots.len());
        self.bots.push(html.to_string());
        self.nodes.push(Node::Bot(id));
        id
    }

    fn replace_bubble(&mut self, id: BubbleId, html: &str) {
        if let Some(bubble) = self.bots.get_mut(id.0) {
            *bubble = html.to_string();
        }
    }

    fn show_typing(&mut self) {
        self.nodes.push(Node::Typing);
    }

    fn remove_typing(&mut self) {
        self.nodes.retain(|node| *node != Node::Typing);
    }

    // The fragment has no viewport; the latest bubble is always last.
    fn scroll_to_latest(&mut self) {}

    fn input_text(&self) -> String {
        self.input.clone()
    }

    fn set_input_text(&mut self, text: &str) {
        self.input = text.to_string();
    }

    // No caret to move outside a live page.
    fn focus_input(&mut self) {}

    fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
    }
}
