use std::sync::Arc;

use crate::models::{ChatMessage, CompletionRequest, SearchResult};
use crate::search::SearchApi;
use crate::transport::CompletionTransport;

const TERMS_MARKER: &str = "terms are:";

const CLASSIFIER_INSTRUCTION: &str = "Please analyze whether the following user input is \
specifically asking for academic articles from a database and not a general support question. \
If it is a request for articles, identify that it is a search query and extract the key search \
terms, listing them on a line reading 'The key search terms are:' followed by one term per \
bulleted line. Otherwise, indicate it's not a search query.";

/// Outcome of classifying one user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnKind {
    /// Literature-search request; terms joined with " OR " for a broad query.
    Search { terms: String },
    Conversation,
}

/// Decides whether a turn is a literature-search request and, if so,
/// resolves it against the search service instead of the assistant.
pub struct QueryRouter {
    completions: Arc<dyn CompletionTransport>,
    search: Arc<dyn SearchApi>,
    model: String,
    max_tokens: i32,
    page_limit: usize,
}

impl QueryRouter {
    pub fn new(
        completions: Arc<dyn CompletionTransport>,
        search: Arc<dyn SearchApi>,
        model: String,
        max_tokens: i32,
        page_limit: usize,
    ) -> Self {
        Self {
            completions,
            search,
            model,
            max_tokens,
            page_limit,
        }
    }

    /// Classify a user turn. Any transport or parsing trouble degrades to
    /// `Conversation` so the assistant path is never blocked.
    pub async fn classify(&self, text: &str) -> TurnKind {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: CLASSIFIER_INSTRUCTION.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        let response = match self.completions.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Classifier call failed, treating turn as conversation: {}", e);
                return TurnKind::Conversation;
            }
        };

        let Some(choice) = response.choices.first() else {
            tracing::warn!("Classifier returned no choices, treating turn as conversation");
            return TurnKind::Conversation;
        };

        let terms = extract_search_terms(&choice.message.content);
        if terms.is_empty() {
            TurnKind::Conversation
        } else {
            let terms = terms.join(" OR ");
            tracing::info!(%terms, "Classified turn as a literature search");
            TurnKind::Search { terms }
        }
    }

    /// Resolve a search-classified turn into display-ready cards. Search
    /// errors are swallowed into an empty result set.
    pub async fn dispatch_search(&self, terms: &str) -> Vec<SearchResult> {
        let articles = match self.search.search("works", terms, self.page_limit, 0).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::error!("Search dispatch failed: {}", e);
                Vec::new()
            }
        };

        articles.into_iter().map(SearchResult::from_article).collect()
    }
}

/// Scan the classifier reply line by line. Terms accumulate only after a
/// line containing the marker phrase (case-insensitive); each later line
/// starting with a bullet contributes one trimmed term.
fn extract_search_terms(response: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut extracting = false;
    for line in response.lines() {
        let line = line.trim();
        if extracting && line.starts_with('-') {
            let term = line.trim_start_matches('-').trim();
            if !term.is_empty() {
                terms.push(term.to_string());
            }
        } else if line.to_lowercase().contains(TERMS_MARKER) {
            extracting = true;
        }
    }
    terms
}
