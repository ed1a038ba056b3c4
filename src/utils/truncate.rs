//! Truncation Utilities
//!
//! Text truncation that always lands on a UTF-8 char boundary.

/// Keep only the leading `max_bytes` of `content`, landing on a UTF-8 char
/// boundary and keeping no suffix -- used where only "the first N bytes of
/// output" matters, e.g. reporting a process's stdout tail when it exited
/// cleanly without producing an expected result.
pub fn first_n_bytes(content: &str, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content.to_string();
    }
    let mut end = 0;
    for (idx, c) in content.char_indices() {
        let char_end = idx + c.len_utf8();
        if char_end > max_bytes {
            break;
        }
        end = char_end;
    }
    format!("{} ... [{} more bytes]", &content[..end], content.len() - end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_n_bytes_passes_through_short_content() {
        assert_eq!(first_n_bytes("hello", 1024), "hello");
    }

    #[test]
    fn first_n_bytes_truncates_on_char_boundary() {
        let content = "a".repeat(2000);
        let out = first_n_bytes(&content, 1024);
        assert!(out.starts_with(&"a".repeat(1024)));
        assert!(out.contains("more bytes"));
    }
}
