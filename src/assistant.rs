use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;

use crate::error::{CompanionError, Result};
use crate::models::{AssistantProfile, BlobHandle, MessageList, Run, ThreadHandle, ThreadMessage};

#[cfg(test)]
use mockall::automock;

/// Seam for the hosted conversational-assistant service: threads, messages,
/// runs, assistant lookup and blob upload.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Create a conversation thread tagged with the local session id.
    async fn create_thread(&self, session_id: &str) -> Result<String>;
    /// Append a message to a thread, optionally attaching an uploaded blob.
    async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
        blob_id: Option<String>,
    ) -> Result<String>;
    /// Fetch the full thread transcript, most-recent-first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
    /// Start an asynchronous run of the assistant against the thread.
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;
    /// Re-fetch the current status of an existing run.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;
    /// Look up an assistant configuration, used to validate overrides.
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantProfile>;
    /// Upload a JSON document produced by the ingestion collaborator and
    /// return the remote blob id.
    async fn upload_blob(&self, file_name: &str, json: String) -> Result<String>;
}

#[derive(Serialize)]
struct CreateThreadBody<'a> {
    metadata: ThreadMetadata<'a>,
}

#[derive(Serialize)]
struct ThreadMetadata<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<Attachment<'a>>>,
}

#[derive(Serialize)]
struct Attachment<'a> {
    file_id: &'a str,
    tools: Vec<AttachmentTool>,
}

#[derive(Serialize)]
struct AttachmentTool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CreateRunBody<'a> {
    assistant_id: &'a str,
}

#[derive(serde::Deserialize)]
struct CreatedMessage {
    id: String,
}

/// reqwest-backed client for the assistant service's v2 REST surface.
pub struct OpenAiAssistantApi {
    client: Client,
    api_base: String,
    api_key: String,
}

impl OpenAiAssistantApi {
    pub fn new(api_base: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_base,
            api_key,
        }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn expect_success(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(CompanionError::AssistantApi(format!(
            "{context} returned {status}: {body}"
        )))
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantApi {
    async fn create_thread(&self, session_id: &str) -> Result<String> {
        let url = format!("{}/threads", self.api_base);
        let response = self
            .authed(self.client.post(&url))
            .json(&CreateThreadBody {
                metadata: ThreadMetadata { session_id },
            })
            .send()
            .await?;
        let thread: ThreadHandle = Self::expect_success(response, "create_thread")
            .await?
            .json()
            .await?;
        tracing::info!(thread_id = %thread.id, %session_id, "Created conversation thread");
        Ok(thread.id)
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
        blob_id: Option<String>,
    ) -> Result<String> {
        let url = format!("{}/threads/{}/messages", self.api_base, thread_id);
        let attachments = blob_id.as_deref().map(|file_id| {
            vec![Attachment {
                file_id,
                tools: vec![AttachmentTool {
                    kind: "file_search",
                }],
            }]
        });
        let response = self
            .authed(self.client.post(&url))
            .json(&CreateMessageBody {
                role,
                content,
                attachments,
            })
            .send()
            .await?;
        let created: CreatedMessage = Self::expect_success(response, "create_message")
            .await?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let url = format!("{}/threads/{}/messages", self.api_base, thread_id);
        let response = self.authed(self.client.get(&url)).send().await?;
        let list: MessageList = Self::expect_success(response, "list_messages")
            .await?
            .json()
            .await?;
        Ok(list.data)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let url = format!("{}/threads/{}/runs", self.api_base, thread_id);
        let response = self
            .authed(self.client.post(&url))
            .json(&CreateRunBody { assistant_id })
            .send()
            .await?;
        let run: Run = Self::expect_success(response, "create_run")
            .await?
            .json()
            .await?;
        tracing::info!(run_id = %run.id, %thread_id, status = ?run.status, "Created run");
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let url = format!("{}/threads/{}/runs/{}", self.api_base, thread_id, run_id);
        let response = self.authed(self.client.get(&url)).send().await?;
        Self::expect_success(response, "retrieve_run")
            .await?
            .json()
            .await
            .map_err(CompanionError::from)
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantProfile> {
        let url = format!("{}/assistants/{}", self.api_base, assistant_id);
        let response = self.authed(self.client.get(&url)).send().await?;
        Self::expect_success(response, "retrieve_assistant")
            .await?
            .json()
            .await
            .map_err(CompanionError::from)
    }

    async fn upload_blob(&self, file_name: &str, json: String) -> Result<String> {
        let url = format!("{}/files", self.api_base);
        let part = reqwest::multipart::Part::text(json)
            .file_name(file_name.to_string())
            .mime_str("application/json")
            .map_err(|e| CompanionError::Internal(format!("Invalid upload part: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);
        let response = self
            .authed(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;
        let blob: BlobHandle = Self::expect_success(response, "upload_blob")
            .await?
            .json()
            .await?;
        tracing::info!(blob_id = %blob.id, %file_name, "Uploaded data blob");
        Ok(blob.id)
    }
}
