use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::{CompanionError, Result};

#[cfg(test)]
use mockall::automock;

/// Write-only sink for user feedback. Fire-and-forget: callers log failures
/// and move on, there is no read path.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn record(
        &self,
        message_content: &str,
        feedback: &str,
        feedback_type: &str,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct FeedbackEntry<'a> {
    message_content: &'a str,
    feedback: &'a str,
    feedback_type: &'a str,
}

/// Persists feedback as timestamped JSON documents under
/// `<root>/feedback/<type>/<timestamp>.json`, standing in for the
/// deployment's object store.
pub struct FileFeedbackSink {
    root: PathBuf,
}

impl FileFeedbackSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FeedbackSink for FileFeedbackSink {
    async fn record(
        &self,
        message_content: &str,
        feedback: &str,
        feedback_type: &str,
    ) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let dir = self.root.join("feedback").join(feedback_type);
        let path = dir.join(format!("{timestamp}.json"));

        let body = serde_json::to_string(&FeedbackEntry {
            message_content,
            feedback,
            feedback_type,
        })?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CompanionError::Internal(format!("Failed to create {dir:?}: {e}")))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| CompanionError::Internal(format!("Failed to write {path:?}: {e}")))?;

        tracing::info!(?path, %feedback_type, "Recorded feedback entry");
        Ok(())
    }
}
