//! Program Builder: deterministic rendering of a conversational turn into
//! the kernel's textual program grammar.
//!
//! The grammar is a *target* format only — the bridge generates valid
//! programs, it never parses them. A program is the `begin:` header, a
//! sequence of statement lines (`show`, `bind`, `teach`, `evolve`,
//! `score`), and the `end.` footer. String literals are double-quoted and
//! support exactly three escapes: `\\`, `\"` and `\n`.
//!
//! Inputs that already carry the envelope are passed through verbatim so
//! power users can hand-write programs.

mod builder;
mod escape;

pub use builder::{
    is_preformed_program, render_program, EMPTY_REQUEST_PROGRAM, PROGRAM_FOOTER, PROGRAM_HEADER,
    SNIPPET_MAX_BYTES,
};
pub use escape::escape_literal;
