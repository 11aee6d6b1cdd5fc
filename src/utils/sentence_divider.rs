use once_cell::sync::Lazy;
use regex::Regex;

/// Sentence terminals for Latin, CJK full-width and Arabic scripts
const SENTENCE_TERMINALS: [char; 7] = ['.', '!', '?', '。', '！', '？', '؟'];

/// `dangerous.Cases` -> `dangerous. Cases`
static RUN_ON_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([.!?])([A-Z])").expect("run-on boundary pattern is valid")
});

pub fn is_sentence_terminal(ch: char) -> bool {
    SENTENCE_TERMINALS.contains(&ch)
}

/// Split a single paragraph into sentences.
///
/// Every terminal punctuation mark closes a sentence, whatever the script.
/// Sentences are trimmed and empty ones dropped, so text with no terminal
/// punctuation comes back as one sentence and blank text as none.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let text = RUN_ON_BOUNDARY.replace_all(text, "$1 $2");

    let mut sentences = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if is_sentence_terminal(ch) {
            let end = idx + ch.len_utf8();
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        sentences.push(piece.to_string());
    }
}
