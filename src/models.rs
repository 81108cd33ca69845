use serde::{Deserialize, Serialize};

/// Message roles surfaced in a transcript. Anything the remote service
/// invents beyond user/assistant is kept but never rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn is_displayable(&self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub value: String,
}

/// One content part of a thread message. Parts that carry no text (images,
/// tool payloads) deserialize with `text: None` and render as nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<TextBlock>,
}

impl ContentPart {
    pub fn from_text(value: impl Into<String>) -> Self {
        Self {
            text: Some(TextBlock {
                value: value.into(),
            }),
        }
    }
}

/// A single turn stored on the remote conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ThreadMessage {
    pub fn local(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            role,
            content: vec![ContentPart::from_text(text)],
        }
    }

    /// Concatenated text of all content parts, for rendering.
    pub fn display_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| part.text.as_ref().map(|t| t.value.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Remote list endpoint returns most-recent-first; callers reverse for
/// chronological display.
#[derive(Debug, Deserialize)]
pub struct MessageList {
    pub data: Vec<ThreadMessage>,
}

/// Status of an asynchronous run on the remote assistant service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

/// One asynchronous processing job for a submitted turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
}

#[derive(Debug, Deserialize)]
pub struct ThreadHandle {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlobHandle {
    pub id: String,
}

// Chat-completion wire format, used by the query classifier.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: i32,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

// CORE search wire format.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Article>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: Option<String>,
}

/// Raw article record as returned by the search service; every field is
/// optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<Vec<Author>>,
    #[serde(default, rename = "publishedDate")]
    pub published_date: Option<String>,
    #[serde(default, rename = "sourceFulltextUrls")]
    pub source_fulltext_urls: Option<Vec<String>>,
    #[serde(default, rename = "abstract")]
    pub summary: Option<String>,
}

/// Display-ready article card. Ephemeral: rendered once, never stored in
/// session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub authors: String,
    pub published_date: String,
    pub source_url: String,
    pub summary: String,
}
