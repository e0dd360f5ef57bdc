// src/index/chunker.rs
//! Paragraph-merging text splitter for transcript passages.

use std::collections::VecDeque;

pub const CHUNK_SIZE: usize = 800;
pub const CHUNK_OVERLAP: usize = 150;
const SEPARATOR: &str = "\n\n";

/// Splits `text` on blank lines and greedily merges the paragraphs into
/// chunks of at most `chunk_size` characters. Trailing paragraphs totalling
/// no more than `overlap` characters are repeated at the start of the next
/// chunk. Paragraphs longer than `chunk_size` are cut into overlapping
/// character windows first.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = SEPARATOR.chars().count();
    let pieces: Vec<String> = text
        .split(SEPARATOR)
        .filter(|p| !p.trim().is_empty())
        .flat_map(|p| window(p, chunk_size, overlap))
        .collect();

    let mut chunks = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in &pieces {
        let len = piece.chars().count();
        let joiner = |current: &VecDeque<&str>| if current.is_empty() { 0 } else { sep_len };

        if total + len + joiner(&current) > chunk_size && !current.is_empty() {
            push_joined(&current, &mut chunks);
            // Drop leading paragraphs until what is left fits as overlap and
            // leaves room for the incoming piece.
            while total > overlap || (total > 0 && total + len + joiner(&current) > chunk_size) {
                let Some(first) = current.pop_front() else { break };
                total -= first.chars().count() + if current.is_empty() { 0 } else { sep_len };
            }
        }

        total += len + joiner(&current);
        current.push_back(piece.as_str());
    }
    push_joined(&current, &mut chunks);
    chunks
}

fn push_joined(current: &VecDeque<&str>, chunks: &mut Vec<String>) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(SEPARATOR);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn window(piece: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = piece.chars().collect();
    if chars.len() <= chunk_size || chunk_size == 0 {
        return vec![piece.to_string()];
    }
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(tag: char, len: usize) -> String {
        std::iter::repeat(tag).take(len).collect()
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = split_text("Management was upbeat.\n\nDeal wins were strong.", CHUNK_SIZE, CHUNK_OVERLAP);
        assert_eq!(chunks, vec!["Management was upbeat.\n\nDeal wins were strong.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size_and_carry_overlap() {
        let text = (0..10)
            .map(|i| paragraph((b'a' + i as u8) as char, 120))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= CHUNK_SIZE, "chunk too long: {}", chunk.len());
        }
        // The last paragraph of one chunk opens the next
        let last_of_first = chunks[0].split("\n\n").last().unwrap();
        assert!(chunks[1].starts_with(last_of_first));
        assert!(last_of_first.chars().count() <= CHUNK_OVERLAP);
    }

    #[test]
    fn test_oversized_paragraph_is_windowed() {
        let text = paragraph('x', 2000);
        let chunks = split_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= CHUNK_SIZE));
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert_eq!(total, 2000 + 2 * CHUNK_OVERLAP);
    }

    #[test]
    fn test_blank_input_gives_no_chunks() {
        assert!(split_text("", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
        assert!(split_text("\n\n   \n\n", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
    }
}
