/// Maximum length of a snippet, in UTF-16 code units.
pub const SNIPPET_LEN: usize = 120;

/// Whitespace as web hosts define it: Unicode `White_Space` plus the byte
/// order mark, without NEL (U+0085).
pub fn is_host_whitespace(c: char) -> bool {
    c == '\u{FEFF}' || (c.is_whitespace() && c != '\u{0085}')
}

/// `text` without leading and trailing [host whitespace](is_host_whitespace).
pub fn trim_text(text: &str) -> &str {
    text.trim_matches(is_host_whitespace)
}

/// Human-readable preview of an item's text.
///
/// Runs of whitespace (including newlines) collapse to a single space, the
/// result is trimmed and cut to [`SNIPPET_LEN`] UTF-16 units. Snippets are a
/// display and secondary-match aid; they carry no identity.
pub fn snippet(text: &str) -> String {
    let collapsed = text
        .split(is_host_whitespace)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    truncate_utf16(&collapsed, SNIPPET_LEN).to_string()
}

/// The longest prefix of `s` holding at most `max` UTF-16 code units.
///
/// A character that would straddle the limit is left out whole, so a
/// surrogate pair is never split.
pub fn truncate_utf16(s: &str, max: usize) -> &str {
    let mut units = 0;
    for (idx, c) in s.char_indices() {
        units += c.len_utf16();
        if units > max {
            return &s[..idx];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(snippet("  Hello \n\n  world\t!  "), "Hello world !");
    }

    #[test]
    fn truncates_to_limit() {
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).chars().count(), SNIPPET_LEN);
    }

    #[test]
    fn empty_text_gives_empty_snippet() {
        assert_eq!(snippet(""), "");
        assert_eq!(snippet(" \n\t "), "");
        assert_eq!(snippet("\u{FEFF}\u{00A0}"), "");
    }

    #[test]
    fn byte_order_mark_counts_as_whitespace() {
        assert_eq!(snippet("\u{FEFF}Hello\u{FEFF}world "), "Hello world");
        assert_eq!(trim_text("\u{FEFF} hi \u{FEFF}"), "hi");
        assert_eq!(trim_text("\u{0085}hi"), "\u{0085}hi");
    }

    #[test]
    fn limit_is_counted_in_utf16_units() {
        // Each emoji is two UTF-16 units.
        let emoji = "\u{1F600}".repeat(100);
        let s = snippet(&emoji);
        assert_eq!(s.chars().count(), SNIPPET_LEN / 2);
        assert_eq!(s.encode_utf16().count(), SNIPPET_LEN);

        let odd = format!("a{emoji}");
        assert_eq!(snippet(&odd).encode_utf16().count(), SNIPPET_LEN - 1);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_utf16("héllo", 2), "hé");
        assert_eq!(truncate_utf16("a\u{1F600}b", 2), "a");
        assert_eq!(truncate_utf16("a\u{1F600}b", 3), "a\u{1F600}");
        assert_eq!(truncate_utf16("abc", 10), "abc");
        assert_eq!(truncate_utf16("abc", 0), "");
    }
}
