//! Content sanitization for user-supplied markdown/HTML snippets.
//!
//! A conservative tag allowlist; all scripting-capable markup and event
//! attributes are stripped before storage and before being echoed back.

use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use once_cell::sync::Lazy;

const ALLOWED_TAGS: &[&str] = &[
    "b", "i", "em", "strong", "code", "pre", "a", "ul", "ol", "li", "p", "br", "blockquote",
];

static CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder.tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>());
    builder.generic_attributes(HashSet::new());
    let mut tag_attributes = HashMap::new();
    // `rel` stays off the allowlist; the cleaner stamps its own
    // noopener/noreferrer value on every link.
    tag_attributes.insert("a", ["href", "title"].into_iter().collect::<HashSet<_>>());
    builder.tag_attributes(tag_attributes);
    builder
});

pub fn sanitize_markdown(text: &str) -> String {
    CLEANER.clean(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = sanitize_markdown("hello <script>alert(1)</script>world");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("hello"));
        assert!(cleaned.contains("world"));
    }

    #[test]
    fn keeps_allowlisted_formatting() {
        let cleaned = sanitize_markdown("<b>bold</b> and <code>let x = 1;</code>");
        assert_eq!(cleaned, "<b>bold</b> and <code>let x = 1;</code>");
    }

    #[test]
    fn drops_event_attributes() {
        let cleaned = sanitize_markdown("<b onclick=\"evil()\">hi</b>");
        assert!(!cleaned.contains("onclick"));
        assert!(cleaned.contains("<b>hi</b>"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize_markdown("just words"), "just words");
    }
}
