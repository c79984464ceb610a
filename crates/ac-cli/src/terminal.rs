//! Terminal view for interactive chat.
//!
//! Bubbles are kept in an [`HtmlTranscript`] and drawn to stdout as styled
//! text. While a reply streams, the live bubble is cleared and redrawn in
//! place on every update.

use std::io::{self, Write};
use std::sync::LazyLock;

use ac_core::{BubbleId, ChatView, HtmlTranscript};
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::style::{Attribute, Color, ContentStyle, StyledContent};
use crossterm::terminal::{size as terminal_size, Clear, ClearType};
use crossterm::ExecutableCommand;
use regex::Regex;
use tracing::warn;
use unicode_width::UnicodeWidthStr;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(/?)([a-z]+)[^>]*>").unwrap());

#[derive(Debug, Default, Clone, Copy)]
struct InlineState {
    bold: bool,
    italic: bool,
    code: bool,
    link: bool,
}

impl InlineState {
    fn apply(&mut self, closing: bool, tag: &str) {
        let on = !closing;
        match tag {
            "strong" => self.bold = on,
            "em" => self.italic = on,
            "code" => self.code = on,
            "a" => self.link = on,
            _ => {}
        }
    }

    fn style(&self) -> ContentStyle {
        let mut style = ContentStyle::new();
        if self.bold {
            style.attributes.set(Attribute::Bold);
        }
        if self.italic {
            style.attributes.set(Attribute::Italic);
        }
        if self.code {
            style.foreground_color = Some(Color::Yellow);
        }
        if self.link {
            style.attributes.set(Attribute::Underlined);
            style.foreground_color = Some(Color::Cyan);
        }
        style
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Convert a rendered HTML fragment to terminal text.
///
/// With `styled` set, inline tags become ANSI attributes; otherwise they are
/// dropped. `<br>` becomes a newline and entities are decoded.
pub fn html_to_terminal(html: &str, styled: bool) -> String {
    let mut out = String::with_capacity(html.len());
    let mut state = InlineState::default();
    let mut last = 0;

    let push_text = |out: &mut String, text: &str, state: &InlineState| {
        if text.is_empty() {
            return;
        }
        let text = unescape(text);
        if styled {
            out.push_str(&StyledContent::new(state.style(), text).to_string());
        } else {
            out.push_str(&text);
        }
    };

    for caps in TAG.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut out, &html[last..whole.start()], &state);
        last = whole.end();

        let closing = !caps[1].is_empty();
        let tag = &caps[2];
        if tag == "br" {
            out.push('\n');
        } else {
            state.apply(closing, tag);
        }
    }
    push_text(&mut out, &html[last..], &state);
    out
}

/// Number of terminal rows `text` occupies once wrapped at `width` columns.
fn rows(text: &str, width: usize, ansi: &Regex) -> u16 {
    let width = width.max(1);
    text.split('\n')
        .map(|line| {
            let visible = ansi.replace_all(line, "").width();
            visible.div_ceil(width).max(1)
        })
        .sum::<usize>() as u16
}

static ANSI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

pub struct TerminalView {
    transcript: HtmlTranscript,
    /// Draw with ANSI styles and redraw the live bubble in place.
    styled: bool,
    /// Print user bubbles (readline already echoes them in interactive mode).
    echo_user: bool,
    term_width: usize,
    /// Bubble currently drawn at the bottom and how many rows it takes.
    live: Option<(BubbleId, u16)>,
    typing_shown: bool,
}

impl TerminalView {
    pub fn new(styled: bool, echo_user: bool) -> Self {
        let (width, _) = terminal_size().unwrap_or((80, 24));
        Self {
            transcript: HtmlTranscript::new(),
            styled,
            echo_user,
            term_width: width as usize,
            live: None,
            typing_shown: false,
        }
    }

    pub fn transcript(&self) -> &HtmlTranscript {
        &self.transcript
    }

    /// Take the text waiting in the input field, leaving it empty.
    pub fn take_input(&mut self) -> String {
        let text = self.transcript.input_text();
        self.transcript.clear_input();
        text
    }

    /// Finish the turn's output. Unstyled output prints the final bubble here
    /// since it cannot be redrawn while streaming.
    pub fn finish_turn(&mut self) {
        let live = self.live.take();
        let result = self.write_final(live.map(|(id, _)| id));
        Self::report(result);
    }

    fn write_final(&self, live: Option<BubbleId>) -> io::Result<()> {
        let mut stdout = io::stdout();
        if !self.styled {
            if let Some(html) = live.and_then(|id| self.transcript.bot_html(id)) {
                writeln!(stdout, "{}", html_to_terminal(html, false))?;
            }
        }
        writeln!(stdout)?;
        stdout.flush()
    }

    fn clear_rows(stdout: &mut io::Stdout, rows: u16) -> io::Result<()> {
        if rows > 0 {
            stdout.execute(MoveUp(rows))?;
        }
        stdout.execute(MoveToColumn(0))?;
        stdout.execute(Clear(ClearType::FromCursorDown))?;
        Ok(())
    }

    fn draw_live(&mut self, id: BubbleId) -> io::Result<()> {
        let html = self.transcript.bot_html(id).unwrap_or_default();
        let output = html_to_terminal(html, true);
        let mut stdout = io::stdout();

        if let Some((live_id, rendered)) = self.live {
            if live_id == id {
                Self::clear_rows(&mut stdout, rendered)?;
            }
        }

        writeln!(stdout, "{}", output)?;
        stdout.flush()?;
        self.live = Some((id, rows(&output, self.term_width, &ANSI)));
        Ok(())
    }

    fn report(result: io::Result<()>) {
        if let Err(e) = result {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl ChatView for TerminalView {
    fn append_user_bubble(&mut self, text: &str) {
        self.transcript.append_user_bubble(text);
        if self.echo_user {
            let mut stdout = io::stdout();
            Self::report(writeln!(stdout, "you> {}\n", text));
        }
    }

    fn append_bot_bubble(&mut self, html: &str) -> BubbleId {
        let id = self.transcript.append_bot_bubble(html);
        if self.styled {
            self.live = None;
            let result = self.draw_live(id);
            Self::report(result);
        } else {
            // Flush any earlier bubble before tracking the new one.
            if let Some((prev, _)) = self.live.take() {
                if let Some(prev_html) = self.transcript.bot_html(prev) {
                    let text = html_to_terminal(prev_html, false);
                    Self::report(writeln!(io::stdout(), "{}", text));
                }
            }
            self.live = Some((id, 0));
        }
        id
    }

    fn replace_bubble(&mut self, id: BubbleId, html: &str) {
        self.transcript.replace_bubble(id, html);
        if self.styled && matches!(self.live, Some((live_id, _)) if live_id == id) {
            let result = self.draw_live(id);
            Self::report(result);
        }
    }

    fn show_typing(&mut self) {
        self.transcript.show_typing();
        if self.styled && !self.typing_shown {
            let mut stdout = io::stdout();
            let mut dim = ContentStyle::new();
            dim.foreground_color = Some(Color::DarkGrey);
            let dots = StyledContent::new(dim, "…");
            Self::report(writeln!(stdout, "{}", dots).and_then(|_| stdout.flush()));
            self.typing_shown = true;
        }
    }

    fn remove_typing(&mut self) {
        self.transcript.remove_typing();
        if self.typing_shown {
            let mut stdout = io::stdout();
            Self::report(Self::clear_rows(&mut stdout, 1));
            self.typing_shown = false;
        }
    }

    fn scroll_to_latest(&mut self) {
        Self::report(io::stdout().flush());
    }

    fn input_text(&self) -> String {
        self.transcript.input_text()
    }

    fn set_input_text(&mut self, text: &str) {
        self.transcript.set_input_text(text);
    }

    fn focus_input(&mut self) {
        self.transcript.focus_input();
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        self.transcript.set_send_enabled(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::render;

    #[test]
    fn test_plain_conversion() {
        let html = render("## Title\n**bold** & `x < y`\n- item");
        assert_eq!(html_to_terminal(&html, false), "Title\nbold & x < y\n• item");
    }

    #[test]
    fn test_links_keep_label() {
        let html = render("see [docs](https://example.com)");
        assert_eq!(html_to_terminal(&html, false), "see docs");
    }

    #[test]
    fn test_styled_conversion_uses_ansi() {
        let html = render("**bold**");
        let out = html_to_terminal(&html, true);
        assert!(out.contains("bold"));
        assert!(out.contains('\x1b'));
        assert_eq!(ANSI.replace_all(&out, ""), "bold");
    }

    #[test]
    fn test_rows_wrap() {
        assert_eq!(rows("abc", 80, &ANSI), 1);
        assert_eq!(rows("a\nb", 80, &ANSI), 2);
        assert_eq!(rows(&"x".repeat(100), 40, &ANSI), 3);
        assert_eq!(rows("", 80, &ANSI), 1);
    }

    #[test]
    fn test_rows_count_wide_glyphs() {
        // 100 CJK characters take two columns each.
        assert_eq!(rows(&"你好".repeat(50), 80, &ANSI), 3);
        assert_eq!(rows("日本語", 4, &ANSI), 2);
        let styled = html_to_terminal(&ac_core::render("**你好**"), true);
        assert_eq!(rows(&styled, 4, &ANSI), 1);
    }

    #[test]
    fn test_take_input_clears() {
        let mut view = TerminalView::new(false, false);
        view.set_input_text("example");
        assert_eq!(view.take_input(), "example");
        assert_eq!(view.input_text(), "");
    }
}
