//! Text Helpers

/// Truncate to at most `max` characters, appending an ellipsis when
/// anything was cut. Safe on multi-byte content.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => {
            let mut truncated = text[..byte_index].to_string();
            truncated.push('…');
            truncated
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn test_long_text_truncated() {
        assert_eq!(truncate_chars("hello world", 5), "hello…");
    }

    #[test]
    fn test_multibyte_boundary() {
        let text = "αβγδε";
        assert_eq!(truncate_chars(text, 3), "αβγ…");
    }
}
