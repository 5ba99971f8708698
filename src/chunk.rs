//! Fixed-width text chunker.
//!
//! Notion rejects rich-text items longer than 2000 characters, so thread
//! content is split into consecutive pieces of at most `max_chars`
//! characters before it is submitted. Splitting is purely mechanical: it
//! ignores word and line boundaries, but never splits a UTF-8 code point.
//! Concatenating the chunks in order reproduces the input exactly.

/// Maximum characters per rich-text item accepted by the destination store.
pub const MAX_CHUNK_CHARS: usize = 2000;

/// Split text into ordered chunks of at most `max_chars` characters.
///
/// Empty input yields no chunks. A `max_chars` of 0 is treated as 1.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(text[start..offset].to_string());
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(text[start..].to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", MAX_CHUNK_CHARS).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", MAX_CHUNK_CHARS);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let text = "a".repeat(4000);
        let chunks = chunk_text(&text, MAX_CHUNK_CHARS);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() == 2000));
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        for (len, max) in [(1usize, 1usize), (7, 3), (9, 3), (2001, 2000), (10, 100)] {
            let text = "x".repeat(len);
            let chunks = chunk_text(&text, max);
            assert_eq!(chunks.len(), len.div_ceil(max), "len={} max={}", len, max);
        }
    }

    #[test]
    fn test_round_trip_and_bound() {
        let text = "The bill passed 3/15/2024 after a long debate.\n\n".repeat(97);
        for max in [1, 5, 64, 2000] {
            let chunks = chunk_text(&text, max);
            assert_eq!(chunks.concat(), text);
            assert!(chunks.iter().all(|c| c.chars().count() <= max));
            assert!(chunks.iter().all(|c| !c.is_empty()));
        }
    }

    #[test]
    fn test_multibyte_characters_not_split() {
        let text = "é".repeat(5) + "日本語";
        let chunks = chunk_text(&text, 3);
        assert_eq!(chunks, vec!["ééé", "éé日", "本語"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_zero_max_treated_as_one() {
        let chunks = chunk_text("abc", 0);
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha Beta Gamma Delta ".repeat(200);
        assert_eq!(chunk_text(&text, 50), chunk_text(&text, 50));
    }
}
