//! Best-effort HTML sanitization for untrusted submission bodies.
//!
//! This is a denylist, not a full HTML sanitizer: it strips `<script>` and
//! `<style>` blocks, inline `on*=` event-handler attributes, and
//! `javascript:` URIs. Stored submissions are additionally gated behind
//! admin moderation before they can be published.

use regex::Regex;
use std::sync::OnceLock;

fn script_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"))
}

fn style_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"))
}

fn event_handler_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // on<name>= attribute with quoted or bare value
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
    })
}

fn javascript_uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // javascript: scheme inside href/src attribute values
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(href|src)\s*=\s*("|')?\s*javascript:[^"'>\s]*("|')?"#)
            .expect("valid regex")
    })
}

/// Strip known-dangerous constructs from untrusted HTML.
pub fn sanitize_html(input: &str) -> String {
    let s = script_block_re().replace_all(input, "");
    let s = style_block_re().replace_all(&s, "");
    let s = event_handler_re().replace_all(&s, "");
    let s = javascript_uri_re().replace_all(&s, r#"$1="""#);
    s.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_blocks() {
        let out = sanitize_html("<p>hi</p><script>alert(1)</script><p>there</p>");
        assert_eq!(out, "<p>hi</p><p>there</p>");
    }

    #[test]
    fn test_strips_script_blocks_case_insensitive() {
        let out = sanitize_html("<SCRIPT src='x'>x</SCRIPT>ok");
        assert_eq!(out, "ok");
    }

    #[test]
    fn test_strips_style_blocks() {
        let out = sanitize_html("<style>body{display:none}</style><p>visible</p>");
        assert_eq!(out, "<p>visible</p>");
    }

    #[test]
    fn test_strips_inline_handlers() {
        let out = sanitize_html(r#"<img src="x.png" onerror="alert(1)">"#);
        assert_eq!(out, r#"<img src="x.png">"#);

        let out = sanitize_html("<div onclick=doEvil()>x</div>");
        assert_eq!(out, "<div>x</div>");
    }

    #[test]
    fn test_neutralizes_javascript_uris() {
        let out = sanitize_html(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!out.contains("javascript:"));
        assert!(out.contains("<a"));
    }

    #[test]
    fn test_plain_content_untouched() {
        let input = "<p>Åpen dag <strong>12:00</strong></p>";
        assert_eq!(sanitize_html(input), input);
    }
}
