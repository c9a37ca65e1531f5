//! Free-text sanitization
//!
//! Every string that flows from user input into state or into rendered
//! HTML goes through [`sanitize`]. The output never contains tag-like
//! sequences, dangerous URI schemes or inline event handlers, and the five
//! HTML-reserved characters are escaped.
//!
//! Sanitizing already-sanitized text is a no-op: escaping recognises
//! existing entities, and the removal passes run to a fixpoint.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^<>]*>").unwrap())
}

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(?:javascript|vbscript|data)\s*:").unwrap())
}

fn event_handler_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap())
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^&(?:amp|lt|gt|quot|apos|#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6});").unwrap()
    })
}

fn suspicious_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)<\s*/?\s*(?:script|iframe|object|embed|svg|style)|(?:javascript|vbscript)\s*:|data\s*:\s*text/html|\bon[a-z]+\s*=",
        )
        .unwrap()
    })
}

/// Sanitize free-text input.
///
/// Steps, in order:
/// 1. truncate to `max_length` characters
/// 2. strip tag-like sequences, `javascript:`/`data:`/`vbscript:` schemes and
///    inline event-handler attributes until nothing more matches
/// 3. HTML-escape `& < > " '` (existing entities are kept)
/// 4. clamp the escaped text back to `max_length` without splitting an entity
///
/// # Example
///
/// ```
/// use hospital_map_security::sanitize;
///
/// let out = sanitize("<b>Saint-Louis</b> & co", 1000);
/// assert_eq!(out, "Saint-Louis &amp; co");
/// assert_eq!(sanitize(&out, 1000), out);
/// ```
pub fn sanitize(input: &str, max_length: usize) -> String {
    let truncated: Cow<'_, str> = if input.chars().count() > max_length {
        Cow::Owned(input.chars().take(max_length).collect())
    } else {
        Cow::Borrowed(input)
    };

    let stripped = strip_dangerous(&truncated);
    let escaped = escape_html(&stripped);
    clamp_escaped(escaped, max_length)
}

/// Returns `true` if the input contains script-like content worth reporting.
pub fn is_suspicious(input: &str) -> bool {
    suspicious_pattern().is_match(input)
}

/// Escape the five HTML-reserved characters.
///
/// An `&` that already starts a character entity is left alone.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (idx, ch) in input.char_indices() {
        match ch {
            '&' if entity_pattern().is_match(&input[idx..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn strip_dangerous(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = tag_pattern().replace_all(&current, "");
        let next = scheme_pattern().replace_all(&next, "");
        let next = event_handler_pattern().replace_all(&next, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clamp_escaped(escaped: String, max_length: usize) -> String {
    if escaped.chars().count() <= max_length {
        return escaped;
    }

    let mut clamped: String = escaped.chars().take(max_length).collect();

    // Drop a trailing partial entity such as "&am"
    if let Some(amp) = clamped.rfind('&') {
        if !clamped[amp..].contains(';') {
            clamped.truncate(amp);
        }
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1000;

    #[test]
    fn test_script_tag_removed() {
        let out = sanitize("<script>alert(1)</script>", MAX);
        assert!(!out.contains("<script"));
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
        assert_eq!(out, "alert(1)");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(sanitize("Hôpital Necker", MAX), "Hôpital Necker");
    }

    #[test]
    fn test_reserved_characters_escaped() {
        assert_eq!(
            sanitize("a & b \"c\" 'd'", MAX),
            "a &amp; b &quot;c&quot; &#x27;d&#x27;"
        );
    }

    #[test]
    fn test_unclosed_tag_escaped() {
        let out = sanitize("<script src=x", MAX);
        assert!(!out.contains("<script"));
        assert!(out.starts_with("&lt;script"));
    }

    #[test]
    fn test_dangerous_schemes_removed() {
        assert_eq!(sanitize("javascript:alert(1)", MAX), "alert(1)");
        assert_eq!(sanitize("JaVaScRiPt :go", MAX), "go");
        assert_eq!(sanitize("vbscript:msgbox", MAX), "msgbox");
        assert_eq!(sanitize("data:text/html,hi", MAX), "text/html,hi");
    }

    #[test]
    fn test_nested_scheme_removed_to_fixpoint() {
        let out = sanitize("javajavascript:script:alert(1)", MAX);
        assert!(!out.to_lowercase().contains("javascript:"));
    }

    #[test]
    fn test_event_handlers_removed() {
        let out = sanitize("x onerror=alert(1)", MAX);
        assert!(!out.contains("onerror"));
        let out = sanitize("ONLOAD = go", MAX);
        assert!(!out.to_lowercase().contains("onload"));
    }

    #[test]
    fn test_words_containing_on_survive() {
        assert_eq!(sanitize("Lyon Sud", MAX), "Lyon Sud");
        assert_eq!(sanitize("Monterrey", MAX), "Monterrey");
    }

    #[test]
    fn test_truncation() {
        let long = "a".repeat(50);
        assert_eq!(sanitize(&long, 10), "a".repeat(10));
    }

    #[test]
    fn test_truncation_never_splits_entity() {
        let out = sanitize("abcdefgh&", 10);
        assert_eq!(out, "abcdefgh");
        assert_eq!(sanitize(&out, 10), out);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<script>alert(1)</script>",
            "Tom & Jerry's \"clinic\"",
            "&amp; already escaped &lt;",
            "<<b>>nested<</b>>",
            "onclick=foo javascript:bar",
            "",
            "&#x27;&#39;&apos;",
        ];
        for input in inputs {
            let once = sanitize(input, MAX);
            assert_eq!(sanitize(&once, MAX), once, "input: {input}");
        }
    }

    #[test]
    fn test_idempotent_when_escaping_grows_past_limit() {
        let input = "<".repeat(3) + &"&".repeat(20);
        let once = sanitize(&input, 12);
        assert!(once.chars().count() <= 12);
        assert_eq!(sanitize(&once, 12), once);
    }

    #[test]
    fn test_escape_keeps_entities() {
        assert_eq!(escape_html("&amp;&lt;&#39;&#x27;"), "&amp;&lt;&#39;&#x27;");
        assert_eq!(escape_html("&ampx"), "&amp;ampx");
    }

    #[test]
    fn test_is_suspicious() {
        assert!(is_suspicious("<script>"));
        assert!(is_suspicious("< iframe src=x>"));
        assert!(is_suspicious("javascript:void(0)"));
        assert!(is_suspicious("img onerror=x"));
        assert!(!is_suspicious("Hospital Saint-Antoine"));
        assert!(!is_suspicious("data analysis"));
    }
}
