/// Merge translated chunks back into `line_count` lines.
///
/// Chunks sharing a line index are joined with a single space, in order.
/// Lines that only received empty chunks stay empty.
pub fn reassemble_lines<I, S>(translated: I, line_count: usize) -> String
where
    I: IntoIterator<Item = (S, usize)>,
    S: AsRef<str>,
{
    let mut lines = vec![String::new(); line_count];

    for (chunk, line) in translated {
        let Some(slot) = lines.get_mut(line) else {
            tracing::warn!(line, line_count, "Dropping chunk mapped past the last line");
            continue;
        };
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(chunk.as_ref());
    }

    lines.join("\n")
}
