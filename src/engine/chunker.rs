//! Line-bounded chunking
//!
//! Lines accumulate into a chunk until the next one would push it past the
//! budget. The budget is soft: a single line longer than it still becomes one
//! chunk, never split. Sizes count `char`s, including the `\n` separators
//! between lines of the same chunk.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
}

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1000;

/// Split `text` into chunks whose contents, joined with `\n`, reproduce it.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut start_line = 1usize;

    for (i, line) in text.split('\n').enumerate() {
        let line_no = i + 1;
        let line_len = line.chars().count();

        if !current.is_empty() && current_len + 1 + line_len > max_chars {
            chunks.push(TextChunk {
                content: current.join("\n"),
                start_line,
                end_line: line_no - 1,
            });
            current.clear();
            current_len = 0;
            start_line = line_no;
        }

        if !current.is_empty() {
            current_len += 1;
        }
        current_len += line_len;
        current.push(line);
    }

    let end_line = start_line + current.len() - 1;
    chunks.push(TextChunk { content: current.join("\n"), start_line, end_line });
    chunks
}
