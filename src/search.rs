use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::{Article, SearchResponse, SearchResult};

#[cfg(test)]
use mockall::automock;

const SEARCH_FIELDS: &str = "title,authors,publishedDate,sourceFulltextUrls,description";
const ABSTRACT_CAP: usize = 250;
const MISSING: &str = "N/A";

/// Seam for the academic-literature search service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(
        &self,
        entity_type: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>>;
}

/// Client for the CORE v3 search API. A non-200 response is logged and
/// treated as zero results so the conversational fallback stays reachable.
pub struct CoreSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CoreSearchClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl SearchApi for CoreSearchClient {
    async fn search(
        &self,
        entity_type: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>> {
        let url = format!("{}/search/{}", self.base_url, entity_type);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&[
                ("q", query),
                ("limit", &limit.to_string()),
                ("offset", &offset.to_string()),
                ("stats", "false"),
                ("fields", SEARCH_FIELDS),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(%status, %query, "Search API error: {}", body);
            return Ok(Vec::new());
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.results)
    }
}

impl SearchResult {
    /// Fill display fields from a raw article. Absent fields render as the
    /// literal `N/A`; the abstract is capped at 250 characters.
    pub fn from_article(article: Article) -> Self {
        let title = article.title.unwrap_or_else(|| MISSING.to_string());

        let authors = match article.authors {
            Some(list) if !list.is_empty() => list
                .into_iter()
                .map(|a| a.name.unwrap_or_else(|| MISSING.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            _ => MISSING.to_string(),
        };

        let published_date = article.published_date.unwrap_or_else(|| MISSING.to_string());

        let source_url = article
            .source_fulltext_urls
            .and_then(|urls| urls.into_iter().next())
            .unwrap_or_else(|| MISSING.to_string());

        let summary = truncate_abstract(
            &article.summary.unwrap_or_else(|| MISSING.to_string()),
        );

        Self {
            title,
            authors,
            published_date,
            source_url,
            summary,
        }
    }

    /// Markdown card as rendered to the user.
    pub fn card(&self) -> String {
        format!(
            "**Title:** {}\n**Authors:** {}\n**Published Date:** {}\n**URL:** [Link]({})\n**Abstract:** {}",
            self.title, self.authors, self.published_date, self.source_url, self.summary
        )
    }
}

fn truncate_abstract(text: &str) -> String {
    if text.chars().count() > ABSTRACT_CAP {
        let mut capped: String = text.chars().take(ABSTRACT_CAP).collect();
        capped.push_str("...");
        capped
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;

    fn article_with_abstract(len: usize) -> Article {
        Article {
            title: Some("Enzyme Kinetics".to_string()),
            authors: Some(vec![Author {
                name: Some("A. Researcher".to_string()),
            }]),
            published_date: Some("2021-04-01".to_string()),
            source_fulltext_urls: Some(vec!["https://example.org/a".to_string()]),
            summary: Some("x".repeat(len)),
        }
    }

    #[test]
    fn test_abstract_over_cap_is_truncated_with_ellipsis() {
        let result = SearchResult::from_article(article_with_abstract(300));
        assert_eq!(result.summary.len(), 253);
        assert!(result.summary.ends_with("..."));
        assert_eq!(&result.summary[..250], "x".repeat(250).as_str());
    }

    #[test]
    fn test_abstract_at_cap_is_unchanged() {
        let result = SearchResult::from_article(article_with_abstract(250));
        assert_eq!(result.summary, "x".repeat(250));
    }

    #[test]
    fn test_missing_authors_render_as_na() {
        let mut article = article_with_abstract(10);
        article.authors = None;
        let result = SearchResult::from_article(article);
        assert_eq!(result.authors, "N/A");

        let mut article = article_with_abstract(10);
        article.authors = Some(vec![]);
        let result = SearchResult::from_article(article);
        assert_eq!(result.authors, "N/A");
    }

    #[test]
    fn test_missing_fields_default_to_na() {
        let result = SearchResult::from_article(Article::default());
        assert_eq!(result.title, "N/A");
        assert_eq!(result.published_date, "N/A");
        assert_eq!(result.source_url, "N/A");
        assert_eq!(result.summary, "N/A");
    }

    #[test]
    fn test_first_source_url_is_used() {
        let mut article = article_with_abstract(10);
        article.source_fulltext_urls = Some(vec![
            "https://example.org/first".to_string(),
            "https://example.org/second".to_string(),
        ]);
        let result = SearchResult::from_article(article);
        assert_eq!(result.source_url, "https://example.org/first");
    }

    #[test]
    fn test_card_layout() {
        let result = SearchResult::from_article(article_with_abstract(5));
        let card = result.card();
        assert!(card.starts_with("**Title:** Enzyme Kinetics\n"));
        assert!(card.contains("**Authors:** A. Researcher\n"));
        assert!(card.contains("**URL:** [Link](https://example.org/a)\n"));
    }
}
