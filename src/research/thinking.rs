//! Stripping of hidden-reasoning markup from agent and generator output.
//!
//! Reasoning models wrap their scratchpad in `<think>…</think>` (some use
//! `<thinking>`). Only the text outside those segments is used downstream.

const OPEN_MARKERS: [&str; 2] = ["<think>", "<thinking>"];
const CLOSE_MARKERS: [&str; 2] = ["</think>", "</thinking>"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredText {
    pub text: String,
    /// Whether any reasoning markup was present
    pub had_thinking: bool,
}

/// Earliest occurrence of any marker at or after `from`, as `(start, end)`.
fn find_marker(haystack: &str, from: usize, markers: &[&str]) -> Option<(usize, usize)> {
    markers
        .iter()
        .filter_map(|m| haystack[from..].find(m).map(|i| (from + i, from + i + m.len())))
        .min_by_key(|(start, _)| *start)
}

/// Remove every reasoning segment, keeping surrounding text verbatim.
///
/// - Markers match case-insensitively and segments may span lines.
/// - An opener without a closer strips to the end of the text.
/// - A closer without an opener is dropped on its own; the text around it
///   is kept.
pub fn strip_thinking(raw: &str) -> FilteredText {
    // ASCII lowercasing keeps byte offsets aligned with `raw`.
    let lower = raw.to_ascii_lowercase();

    let mut text = String::with_capacity(raw.len());
    let mut had_thinking = false;
    let mut cursor = 0;

    while cursor < raw.len() {
        let open = find_marker(&lower, cursor, &OPEN_MARKERS);
        let close = find_marker(&lower, cursor, &CLOSE_MARKERS);

        match (open, close) {
            (_, Some((close_start, close_end)))
                if open.is_none_or(|(open_start, _)| close_start < open_start) =>
            {
                had_thinking = true;
                text.push_str(&raw[cursor..close_start]);
                cursor = close_end;
            }
            (Some((open_start, open_end)), _) => {
                had_thinking = true;
                text.push_str(&raw[cursor..open_start]);
                match find_marker(&lower, open_end, &CLOSE_MARKERS) {
                    Some((_, close_end)) => cursor = close_end,
                    None => cursor = raw.len(),
                }
            }
            _ => {
                text.push_str(&raw[cursor..]);
                cursor = raw.len();
            }
        }
    }

    FilteredText { text, had_thinking }
}
