//! Escaping for the grammar's double-quoted string literals.

/// Escape text for insertion into a double-quoted literal.
///
/// The target grammar understands exactly three escapes — backslash,
/// double quote and newline. Carriage returns are dropped so CRLF input
/// cannot smuggle a raw line break into a literal.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
