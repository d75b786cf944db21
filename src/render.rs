//! Email body rendering pipeline
//!
//! Turns a user-authored markdown body into a single HTML document that
//! survives the major mail clients. The pipeline is pure and never fails:
//! malformed markup degrades to escaped literal text.
//!
//! Stages, in order:
//!
//! 1. Normalize: collapse double-escaped newline sequences and CR/CRLF
//!    variants to `\n`, trim surrounding whitespace.
//! 2. Markdown to HTML with tables enabled and single newlines treated as
//!    line breaks, then sanitize with `ammonia`.
//! 3. Inject inline styles onto a fixed tag set; mail clients do not
//!    reliably honor embedded stylesheets, so inline styles are the only
//!    portable mechanism.
//! 4. Optional signature block (`---` lines become rules, blank lines drop).
//! 5. Outer wrapper fixing the font stack, base size, color, and width.

use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser};
use regex::{Captures, Regex};

/// Inline styles injected per tag, tuned for cross-client compatibility
const TAG_STYLES: [(&str, &str); 10] = [
    ("p", "margin: 0 0 12px 0; line-height: 1.6;"),
    ("ul", "margin: 0 0 12px 24px; padding: 0;"),
    ("ol", "margin: 0 0 12px 24px; padding: 0;"),
    ("li", "margin-bottom: 6px; line-height: 1.6;"),
    (
        "h1",
        "margin: 20px 0 12px 0; font-size: 22px; font-weight: bold; color: #111111;",
    ),
    (
        "h2",
        "margin: 18px 0 10px 0; font-size: 18px; font-weight: bold; color: #333333;",
    ),
    (
        "h3",
        "margin: 16px 0 8px 0; font-size: 16px; font-weight: bold; color: #444444;",
    ),
    (
        "blockquote",
        "border-left: 4px solid #dfe2e5; margin: 0 0 12px 0; padding: 0 1em; color: #6a737d;",
    ),
    (
        "code",
        "background-color: #f6f8fa; padding: 2px 4px; border-radius: 3px; font-family: monospace;",
    ),
    ("strong", "color: #111111; font-weight: bold;"),
];

/// Widely-supported font stack for the outer wrapper
const FONT_STACK: &str = "-apple-system, BlinkMacSystemFont, \"Segoe UI\", Roboto, \
    \"Helvetica Neue\", Arial, sans-serif, \"Apple Color Emoji\", \"Segoe UI Emoji\", \
    \"Segoe UI Symbol\"";

/// Opening tags of the styled set, with optional attribute section
static STYLED_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(p|ul|ol|li|h1|h2|h3|blockquote|code|strong)(\s[^>]*)?>")
        .expect("styled tag pattern is valid")
});

/// Stateless body renderer
///
/// Holds the process-wide signature text, read-only at call time. One
/// instance is constructed at startup and shared by every write tool.
#[derive(Debug, Clone)]
pub struct BodyRenderer {
    signature: String,
}

impl BodyRenderer {
    /// Create a renderer with the configured signature text
    ///
    /// A signature that trims to empty disables stage 4 entirely.
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
        }
    }

    /// Render a markdown body into the final HTML document
    ///
    /// Deterministic: identical inputs produce byte-identical output. The
    /// signature block only appears when `use_signature` is true and a
    /// non-empty signature is configured.
    pub fn render(&self, content: &str, use_signature: bool) -> String {
        let normalized = normalize(content);
        let html = markdown_to_html(&normalized);
        let styled = inject_inline_styles(&html);

        let signature = if use_signature {
            signature_html(&self.signature)
        } else {
            String::new()
        };

        format!(
            "<div style=\"font-family: {FONT_STACK}; font-size: 14.5px; color: #333333; \
             line-height: 1.7; max-width: 800px; margin: 0 auto;\">{styled}{signature}</div>"
        )
    }
}

/// Stage 1: normalize line endings and escaped newlines
///
/// Tool arguments routinely arrive with literal `\n` sequences (sometimes
/// double-escaped) instead of real line breaks; both forms collapse to `\n`.
fn normalize(text: &str) -> String {
    text.replace("\\\\n", "\n")
        .replace("\\n", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_owned()
}

/// Stage 2: markdown to sanitized HTML
///
/// Tables are enabled, and soft breaks (a single newline inside a
/// paragraph) are promoted to hard breaks, matching how people write
/// messages. Output is sanitized with `ammonia`; the `style` attribute is
/// kept so author-specified styles survive into stage 3.
fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);

    ammonia::Builder::default()
        .add_generic_attributes(["style"])
        .clean(&html)
        .to_string()
}

/// Stage 3: inject inline styles onto the fixed tag set
///
/// When a tag already carries a `style` attribute, the injected style is
/// prepended so author-declared properties, appearing later, win for
/// overlapping declarations.
fn inject_inline_styles(html: &str) -> String {
    STYLED_TAG_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let tag = caps[1].to_ascii_lowercase();
            let attrs = caps.get(2).map_or("", |m| m.as_str());
            match style_for(&tag) {
                Some(style) => apply_style(&tag, attrs, style),
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// Look up the inline style for a tag name
fn style_for(tag: &str) -> Option<&'static str> {
    TAG_STYLES
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, style)| *style)
}

/// Rebuild an opening tag with the injected style
fn apply_style(tag: &str, attrs: &str, style: &str) -> String {
    if let Some(pos) = attrs.find("style=\"") {
        let insert_at = pos + "style=\"".len();
        let (head, tail) = attrs.split_at(insert_at);
        format!("<{tag}{head}{style} {tail}>")
    } else {
        format!("<{tag} style=\"{style}\"{attrs}>")
    }
}

/// Stage 4: render the signature block
///
/// Each non-empty line becomes a styled block; a line of exactly `---`
/// renders as a horizontal rule; blank lines contribute nothing. Returns
/// an empty string when the signature trims to empty.
fn signature_html(signature: &str) -> String {
    let mut lines_html = String::new();
    for line in signature.trim().lines() {
        let line = line.trim();
        if line == "---" {
            lines_html.push_str(
                "<hr style=\"border:none;border-top:1px solid #dddddd;margin:8px 0;\" />",
            );
        } else if !line.is_empty() {
            lines_html.push_str(&format!(
                "<div style=\"font-family: Arial, sans-serif; font-size: 12px; \
                 color: #888888; line-height: 1.5;\">{}</div>",
                html_escape::encode_text(line)
            ));
        }
    }

    if lines_html.is_empty() {
        return String::new();
    }

    format!(
        "<div style=\"margin-top:24px;padding-top:14px;border-top:1px solid #eeeeee;\">\
         {lines_html}</div>"
    )
}

#[cfg(test)]
mod tests {
    use super::{BodyRenderer, inject_inline_styles, normalize};

    #[test]
    fn normalize_collapses_escaped_newline_forms() {
        assert_eq!(normalize("a\\nb"), "a\nb");
        assert_eq!(normalize("a\\\\nb"), "a\nb");
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(normalize("  hello  "), "hello");
    }

    #[test]
    fn single_newline_renders_as_line_break() {
        let renderer = BodyRenderer::new("");
        let out = renderer.render("Hello\nWorld", false);
        assert!(out.contains("Hello<br"), "missing line break in: {out}");
        assert!(out.contains("World"));
    }

    #[test]
    fn escaped_and_real_newlines_render_identically() {
        let renderer = BodyRenderer::new("");
        assert_eq!(
            renderer.render("Hello\\nWorld", false),
            renderer.render("Hello\nWorld", false)
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = BodyRenderer::new("Best,\n---\nJane");
        let input = "# Title\n\nSome *text* with a [link](https://example.com)";
        assert_eq!(renderer.render(input, true), renderer.render(input, true));
    }

    #[test]
    fn paragraphs_receive_inline_styles() {
        let renderer = BodyRenderer::new("");
        let out = renderer.render("Just a paragraph", false);
        assert!(out.contains("<p style=\"margin: 0 0 12px 0; line-height: 1.6;\">"));
    }

    #[test]
    fn existing_style_attribute_is_prepended_not_replaced() {
        let out = inject_inline_styles("<p style=\"color:red\">x</p>");
        assert!(
            out.contains("<p style=\"margin: 0 0 12px 0; line-height: 1.6; color:red\">"),
            "unexpected output: {out}"
        );
    }

    #[test]
    fn unstyled_tags_pass_through_unchanged() {
        let out = inject_inline_styles("<em>hi</em><hr />");
        assert_eq!(out, "<em>hi</em><hr />");
    }

    #[test]
    fn tables_are_rendered() {
        let renderer = BodyRenderer::new("");
        let out = renderer.render("| a | b |\n| - | - |\n| 1 | 2 |", false);
        assert!(out.contains("<table"), "table missing in: {out}");
    }

    #[test]
    fn raw_script_markup_degrades_to_safe_output() {
        let renderer = BodyRenderer::new("");
        let out = renderer.render("<script>alert(1)</script> hello", false);
        assert!(!out.contains("<script"), "script leaked into: {out}");
        assert!(out.contains("hello"));
    }

    #[test]
    fn signature_is_gated_by_flag() {
        let renderer = BodyRenderer::new("Best,\n---\nJane");
        let out = renderer.render("Hello", false);
        assert!(!out.contains("Best,"));
        assert!(!out.contains("Jane"));
    }

    #[test]
    fn empty_signature_produces_no_block_even_when_requested() {
        let renderer = BodyRenderer::new("   \n  ");
        let out = renderer.render("Hello", true);
        assert!(!out.contains("border-top:1px solid #eeeeee"));
    }

    #[test]
    fn signature_separator_renders_as_rule() {
        let renderer = BodyRenderer::new("Best,\n---\nJane");
        let out = renderer.render("Hello\nWorld", true);

        assert!(out.contains("Hello<br"), "line break missing in: {out}");
        let best = out.find("Best,").expect("signature line present");
        let rule = out
            .find("<hr style=\"border:none;border-top:1px solid #dddddd")
            .expect("rule element present");
        let jane = out.find("Jane").expect("second signature line present");
        assert!(best < rule && rule < jane, "signature order wrong: {out}");
    }

    #[test]
    fn blank_signature_lines_are_dropped() {
        let renderer = BodyRenderer::new("Jane\n\n\nAcme Corp");
        let out = renderer.render("x", true);
        let sig_start = out
            .find("border-top:1px solid #eeeeee")
            .expect("signature container present");
        let block_count = out[sig_start..]
            .matches("font-size: 12px")
            .count();
        assert_eq!(block_count, 2);
    }

    #[test]
    fn signature_text_is_html_escaped() {
        let renderer = BodyRenderer::new("R&D <Team>");
        let out = renderer.render("x", true);
        assert!(out.contains("R&amp;D"));
        assert!(!out.contains("<Team>"));
    }

    #[test]
    fn output_is_wrapped_in_font_stack_container() {
        let renderer = BodyRenderer::new("");
        let out = renderer.render("x", false);
        assert!(out.starts_with("<div style=\"font-family: -apple-system"));
        assert!(out.ends_with("</div>"));
        assert!(out.contains("max-width: 800px"));
    }
}
