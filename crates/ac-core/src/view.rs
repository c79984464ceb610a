//! Abstract view surface the controller draws into.
//!
//! This is the DOM-equivalent of the chat page: a scrollable history of
//! bubbles, a text input, and a send control.

/// Handle to a bot bubble whose content can be replaced later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BubbleId(pub usize);

pub trait ChatView {
    /// Append a user bubble showing `text` literally (no markdown).
    fn append_user_bubble(&mut self, text: &str);

    /// Append a bot bubble holding an already-rendered HTML fragment.
    fn append_bot_bubble(&mut self, html: &str) -> BubbleId;

    /// Replace the whole content of a bot bubble.
    fn replace_bubble(&mut self, id: BubbleId, html: &str);

    fn show_typing(&mut self);

    /// Remove the typing indicator if it is shown.
    fn remove_typing(&mut self);

    fn scroll_to_latest(&mut self);

    fn input_text(&self) -> String;

    fn set_input_text(&mut self, text: &str);

    fn clear_input(&mut self) {
        self.set_input_text("");
    }

    fn focus_input(&mut self);

    fn set_send_enabled(&mut self, enabled: bool);
}
