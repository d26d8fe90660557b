//! A single conversational turn as handed to the bridge.
//!
//! The conversation store, retrieval ranking and attachment pipeline are
//! external collaborators; these types are their interface. The bridge
//! consumes a question, a mode label, ordered context snippets and ordered
//! attachment descriptors, and returns an answer string or a typed error.

use serde::{Deserialize, Serialize};

/// Mode label used when the caller does not pick one.
pub const DEFAULT_MODE: &str = "chat";

/// One retrieved knowledge-base snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnippet {
    /// Where the snippet came from (document title, URL, …).
    pub source: String,
    /// The snippet text itself.
    pub content: String,
}

impl ContextSnippet {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

/// Descriptor of an attachment already uploaded by the chat layer.
///
/// The bridge never sees attachment bytes, only this summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub name: String,
    pub media_type: String,
    pub size_bytes: u64,
}

/// Everything the bridge needs to answer one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    /// The user's question, or a pre-formed kernel program.
    pub question: String,
    /// Active conversation mode label.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Retrieved context, in ranking order.
    #[serde(default)]
    pub snippets: Vec<ContextSnippet>,
    /// Attachments of the turn, in upload order.
    #[serde(default)]
    pub attachments: Vec<AttachmentDescriptor>,
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

impl TurnRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            mode: default_mode(),
            snippets: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_snippet(mut self, source: impl Into<String>, content: impl Into<String>) -> Self {
        self.snippets.push(ContextSnippet::new(source, content));
        self
    }

    pub fn with_attachment(
        mut self,
        name: impl Into<String>,
        media_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        self.attachments.push(AttachmentDescriptor {
            name: name.into(),
            media_type: media_type.into(),
            size_bytes,
        });
        self
    }
}
