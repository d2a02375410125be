#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    /// Byte offset of `text` within the trimmed input.
    pub start: usize,
}

/// Splitter with a character budget and character overlap. Prefers to cut at
/// a paragraph, then a line, then a sentence, then a space.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    chunk_size: usize,
    overlap: usize,
}

impl Splitter {
    pub fn new(chunk_size: usize, overlap: usize) -> anyhow::Result<Self> {
        if chunk_size == 0 {
            anyhow::bail!("chunk size must be positive");
        }
        if overlap >= chunk_size {
            anyhow::bail!("chunk overlap ({}) must be smaller than chunk size ({})", overlap, chunk_size);
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        if text.chars().count() <= self.chunk_size {
            return vec![TextChunk {
                text: text.to_string(),
                chunk_index: 0,
                start: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = advance_chars(text, start, self.chunk_size);
            let cut = if end < text.len() {
                find_break_point(text, start, end)
            } else {
                end
            };

            let raw = &text[start..cut];
            let piece = raw.trim();
            if !piece.is_empty() {
                chunks.push(TextChunk {
                    text: piece.to_string(),
                    chunk_index: chunks.len(),
                    start: start + (raw.len() - raw.trim_start().len()),
                });
            }

            if cut >= text.len() {
                break;
            }

            let next = back_chars(text, cut, self.overlap);
            start = if next > start { next } else { cut };
        }

        chunks
    }
}

/// Byte position `n` characters after `from`, clamped to the end of `text`.
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Byte position `n` characters before `to`, clamped to the start of `text`.
fn back_chars(text: &str, to: usize, n: usize) -> usize {
    if n == 0 {
        return to;
    }
    text[..to]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn find_break_point(text: &str, start: usize, max_end: usize) -> usize {
    let segment = &text[start..max_end];

    if let Some(pos) = segment.rfind("\n\n") {
        if pos > 0 {
            return start + pos + 2;
        }
    }
    if let Some(pos) = segment.rfind('\n') {
        if pos > 0 {
            return start + pos + 1;
        }
    }
    for sentinel in [". ", "? ", "! ", "; "] {
        if let Some(pos) = segment.rfind(sentinel) {
            return start + pos + sentinel.len();
        }
    }
    if let Some(pos) = segment.rfind(' ') {
        if pos > 0 {
            return start + pos + 1;
        }
    }
    max_end
}
