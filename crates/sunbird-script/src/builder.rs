//! Turn-to-program rendering.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use sunbird_types::{TurnRequest, DEFAULT_MODE};

use crate::escape::escape_literal;

/// First line of every generated program.
pub const PROGRAM_HEADER: &str = "begin:";

/// Last line of every generated program.
pub const PROGRAM_FOOTER: &str = "end.";

/// Upper bound on a single rendered snippet, in bytes.
///
/// The kernel interpreter reads quoted literals into a 256-byte buffer;
/// 240 leaves room for the truncation marker and the closing quote.
pub const SNIPPET_MAX_BYTES: usize = 240;

/// Marker appended to a truncated snippet.
const ELLIPSIS: &str = "…";

/// The fixed program rendered for an empty or whitespace-only question.
pub const EMPTY_REQUEST_PROGRAM: &str =
    "begin:\nshow \"empty request: nothing to evaluate\"\nend.\n";

/// Whether the input already carries the program envelope.
///
/// Detection is whitespace-tolerant and ASCII case-insensitive: the
/// trimmed input must start with the header and end with the footer.
pub fn is_preformed_program(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    lowered.starts_with(PROGRAM_HEADER) && lowered.ends_with(PROGRAM_FOOTER)
}

/// Render a turn into program text.
///
/// Pre-formed programs are returned unchanged except for exactly one
/// trailing newline. Otherwise the program is synthesized in fixed order:
/// header, optional mode announcement, question binding, question echo,
/// one deduplicated teach statement (plus a source citation) per
/// non-empty snippet, one display line per attachment, the closing
/// answer sequence, footer. Rendering is fully deterministic.
pub fn render_program(turn: &TurnRequest) -> String {
    if is_preformed_program(&turn.question) {
        let mut program = turn.question.trim_end().to_string();
        program.push('\n');
        return program;
    }

    let question = turn.question.trim();
    if question.is_empty() {
        return EMPTY_REQUEST_PROGRAM.to_string();
    }

    let question_lit = escape_literal(question);
    let mut lines: Vec<String> = Vec::new();
    lines.push(PROGRAM_HEADER.to_string());

    let mode = turn.mode.trim();
    if !mode.is_empty() && mode != DEFAULT_MODE {
        lines.push(format!("show \"mode: {}\"", escape_literal(mode)));
    }

    lines.push(format!("bind question = \"{question_lit}\""));
    lines.push(format!("show \"question: {question_lit}\""));

    let mut seen: HashSet<[u8; 32]> = HashSet::new();
    for snippet in &turn.snippets {
        let content = normalize_snippet(&snippet.content);
        if content.is_empty() {
            continue;
        }
        let digest: [u8; 32] = Sha256::digest(content.to_lowercase().as_bytes()).into();
        if !seen.insert(digest) {
            continue;
        }
        lines.push(format!("teach question -> \"{}\"", escape_literal(&content)));
        let source = snippet.source.trim();
        if !source.is_empty() {
            lines.push(format!("show \"context: {}\"", escape_literal(source)));
        }
    }

    for attachment in &turn.attachments {
        lines.push(format!(
            "show \"attachment: {} ({}, {} bytes)\"",
            escape_literal(attachment.name.trim()),
            escape_literal(attachment.media_type.trim()),
            attachment.size_bytes,
        ));
    }

    lines.push("bind answer = ask question".to_string());
    lines.push("evolve".to_string());
    lines.push("score answer against question".to_string());
    lines.push("show answer".to_string());
    lines.push(PROGRAM_FOOTER.to_string());

    let mut program = lines.join("\n");
    program.push('\n');
    program
}

/// Collapse runs of whitespace and truncate to [`SNIPPET_MAX_BYTES`].
fn normalize_snippet(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_to_boundary(&collapsed, SNIPPET_MAX_BYTES)
}

fn truncate_to_boundary(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes - ELLIPSIS.len();
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{ELLIPSIS}", &text[..cut])
}
