//! Lightweight markdown-to-HTML renderer for assistant messages.
//!
//! The renderer is a fixed sequence of text passes over the whole input.
//! Entity escaping runs first and is the only defense against injected
//! markup: every later pass matches on already-escaped text and only ever
//! inserts tags it builds itself. Rendering keeps no state between calls, so
//! re-rendering a growing stream buffer always yields `render(buffer)`.
//!
//! Supported syntax, in pass order:
//! - `### h3` and `## h2` headers at line start
//! - `**bold**`
//! - `*italic*` on a single line, except right after the tool sentinel `⚙️ `
//! - `` `inline code` ``
//! - `[label](https://url)` links (http and https only)
//! - bare `http(s)://` URLs
//! - `- ` bullet lines
//! - newlines as `<br>`

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::Error;

/// Default accent color for level-2 headers, inline code and links.
pub const DEFAULT_ACCENT: &str = "#c7f284";

/// Marker the upstream agent puts in front of tool-call status lines.
const TOOL_SENTINEL: &str = "\u{2699}\u{fe0f} ";

static H3: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^### (.+)$").unwrap());
static H2: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^## (.+)$").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*[^*\n]+?\*").unwrap());
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[([^\]]+)\]\((https?://[^\s)<>"]+)\)"#).unwrap());
static BARE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s<>"]+"#).unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^- (.+)$").unwrap());
static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Colors used in the inline styles of rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTheme {
    accent: String,
}

impl HtmlTheme {
    /// Build a theme around a `#rgb` or `#rrggbb` accent color.
    ///
    /// Anything else is rejected: the accent is spliced into `style`
    /// attributes verbatim.
    pub fn new(accent: impl Into<String>) -> Result<Self, Error> {
        let accent = accent.into();
        if !HEX_COLOR.is_match(&accent) {
            return Err(Error::config(format!(
                "accent color must be #rgb or #rrggbb, got {:?}",
                accent
            )));
        }
        Ok(Self { accent })
    }

    pub fn accent(&self) -> &str {
        &self.accent
    }

    /// Accent as `r,g,b` components, used for the translucent code background.
    fn accent_rgb(&self) -> (u8, u8, u8) {
        let hex = &self.accent[1..];
        let channel = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0);
        if hex.len() == 3 {
            let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
            (expand(0), expand(1), expand(2))
        } else {
            (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]))
        }
    }

    fn h2_style(&self) -> String {
        format!("font-size:1.1em;color:{};", self.accent)
    }

    fn code_style(&self) -> String {
        let (r, g, b) = self.accent_rgb();
        format!(
            "background:rgba({},{},{},0.12);color:{};padding:2px 6px;border-radius:4px;\
             font-family:monospace;font-size:0.9em;",
            r, g, b, self.accent
        )
    }

    fn link_style(&self) -> String {
        format!("color:{};text-decoration:underline;", self.accent)
    }
}

impl Default for HtmlTheme {
    fn default() -> Self {
        Self {
            accent: DEFAULT_ACCENT.to_string(),
        }
    }
}

/// Escape the three characters that can open markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render markdown to an HTML fragment using the default theme.
pub fn render(text: &str) -> String {
    render_with(text, &HtmlTheme::default())
}

/// Render markdown to an HTML fragment.
pub fn render_with(text: &str, theme: &HtmlTheme) -> String {
    let html = escape_html(text);

    let html = H3.replace_all(&html, r#"<strong style="font-size:1.05em;">$1</strong>"#);
    let h2 = format!(r#"<strong style="{}">$1</strong>"#, theme.h2_style());
    let html = H2.replace_all(&html, h2.as_str());
    let html = BOLD.replace_all(&html, "<strong>$1</strong>");
    let html = replace_italics(&html);

    let code_style = theme.code_style();
    let html = CODE.replace_all(&html, |caps: &Captures| {
        format!(r#"<code style="{}">{}</code>"#, code_style, &caps[1])
    });

    let link_style = theme.link_style();
    let html = LINK.replace_all(&html, |caps: &Captures| {
        anchor(&caps[2], &caps[1], &link_style)
    });
    let html = link_bare_urls(&html, &link_style);

    let html = BULLET.replace_all(&html, "• $1");
    html.replace('\n', "<br>")
}

fn anchor(href: &str, label: &str, style: &str) -> String {
    format!(
        r#"<a href="{}" target="_blank" style="{}">{}</a>"#,
        href, style, label
    )
}

/// `*text*` to `<em>`, skipping candidates opened right after the tool
/// sentinel. A skipped candidate resumes the scan one byte later, so its
/// closing `*` can still open a later match.
fn replace_italics(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(m) = ITALIC.find_at(html, pos) {
        if html[..m.start()].ends_with(TOOL_SENTINEL) {
            pos = m.start() + 1;
            continue;
        }
        out.push_str(&html[copied..m.start()]);
        out.push_str("<em>");
        out.push_str(&html[m.start() + 1..m.end() - 1]);
        out.push_str("</em>");
        copied = m.end();
        pos = m.end();
    }

    out.push_str(&html[copied..]);
    out
}

/// Link URLs that are not already an anchor's `href` or label.
fn link_bare_urls(html: &str, style: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(m) = BARE_URL.find_at(html, pos) {
        let before = &html[..m.start()];
        if before.ends_with("href=\"") || before.ends_with("\">") {
            pos = m.start() + 1;
            continue;
        }
        out.push_str(&html[copied..m.start()]);
        out.push_str(&anchor(m.as_str(), m.as_str(), style));
        copied = m.end();
        pos = m.end();
    }

    out.push_str(&html[copied..]);
    out
}
