//! Prompt assembly and source previews.

use crate::chunk::CHARS_PER_TOKEN;
use crate::models::ScoredChunk;

const CONTEXT_HEADER: &str = "Context information is below.\n---------------------\n";
const CONTEXT_FOOTER: &str = "---------------------\n\
Given the context information and not prior knowledge, answer the query.\n";
const PREVIEW_MARKER: &str = "...";

/// A rendered prompt and how many of the retrieved chunks made it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    /// Leading chunks (in the order given) that appear in `text`, possibly
    /// the last one cut short.
    pub used_chunks: usize,
}

/// Build the user prompt from the question and retrieved chunks.
///
/// Chunks are included best-first until the `context_window` token budget
/// (≈4 chars/token) is spent; the chunk that crosses the budget is cut short
/// and the rest are dropped. The question is always included in full.
pub fn build_prompt(question: &str, chunks: &[ScoredChunk], context_window: usize) -> Prompt {
    let question_part = format!("Query: {}\nAnswer: ", question.trim());
    let budget = context_window.saturating_mul(CHARS_PER_TOKEN);
    let fixed = CONTEXT_HEADER.len() + CONTEXT_FOOTER.len() + question_part.len();
    let mut remaining = budget.saturating_sub(fixed);

    let mut context = String::new();
    let mut used_chunks = 0;
    for chunk in chunks {
        let block = format!("[source: {}]\n{}\n\n", chunk.source_path, chunk.text);
        if block.len() <= remaining {
            remaining -= block.len();
            context.push_str(&block);
            used_chunks += 1;
            continue;
        }

        // Only worth cutting if some of the chunk text survives the label.
        let label_len = block.len() - chunk.text.len() - 2;
        if remaining > label_len {
            context.push_str(truncate_bytes(&block, remaining));
            context.push('\n');
            used_chunks += 1;
        }
        break;
    }

    if context.is_empty() {
        context.push_str("(no context available)\n");
    }

    Prompt {
        text: format!(
            "{}{}{}{}",
            CONTEXT_HEADER, context, CONTEXT_FOOTER, question_part
        ),
        used_chunks,
    }
}

/// First `max_chars` characters of `text` followed by `"..."`.
///
/// Cuts without regard to word boundaries; the marker is appended even when
/// nothing was cut.
pub fn source_preview(text: &str, max_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    format!("{}{}", &text[..end], PREVIEW_MARKER)
}

fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
