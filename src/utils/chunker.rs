use super::sentence_divider::split_sentences;

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 450;

/// One translator call worth of text, tied to the source line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub line: usize,
}

/// Chunks for a whole document, in source-line order
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    pub line_count: usize,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn line_indices(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.line).collect()
    }
}

/// Split `text` into sentence-aligned chunks of at most `max_chars` characters.
///
/// A blank line yields exactly one empty chunk so that no line is lost on
/// reassembly. Sentences are never cut; a sentence longer than `max_chars`
/// gets a chunk of its own.
pub fn split_into_chunks(text: &str, max_chars: usize) -> ChunkPlan {
    let mut plan = ChunkPlan::default();

    for (line, raw) in text.split('\n').enumerate() {
        plan.line_count += 1;

        let paragraph = raw.trim();
        if paragraph.is_empty() {
            plan.chunks.push(Chunk {
                text: String::new(),
                line,
            });
            continue;
        }

        let mut buf = String::new();
        let mut buf_chars = 0;
        for sentence in split_sentences(paragraph) {
            let sentence_chars = sentence.chars().count();
            if buf.is_empty() {
                buf = sentence;
                buf_chars = sentence_chars;
            } else if buf_chars + 1 + sentence_chars <= max_chars {
                buf.push(' ');
                buf.push_str(&sentence);
                buf_chars += 1 + sentence_chars;
            } else {
                plan.chunks.push(Chunk {
                    text: std::mem::replace(&mut buf, sentence),
                    line,
                });
                buf_chars = sentence_chars;
            }
        }

        if !buf.is_empty() {
            plan.chunks.push(Chunk { text: buf, line });
        }
    }

    plan
}
