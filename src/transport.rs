use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::{CompanionError, Result};
use crate::models::{CompletionRequest, CompletionResponse};

const MAX_ATTEMPTS: u8 = 5;
const MAX_RETRY_DURATION: Duration = Duration::from_secs(120);

/// Seam for the text-completion service used by the query classifier.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse>;
}

pub struct OpenAiCompletions {
    client: Client,
    api_base: String,
    api_key: String,
}

impl OpenAiCompletions {
    pub fn new(api_base: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_base,
            api_key,
        }
    }
}

#[async_trait]
impl CompletionTransport for OpenAiCompletions {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let start_time = Instant::now();
        let mut attempts = 0;

        while attempts < MAX_ATTEMPTS {
            if start_time.elapsed() > MAX_RETRY_DURATION {
                return Err(CompanionError::Internal(format!(
                    "Completion request timed out after {} seconds (max retry duration exceeded)",
                    MAX_RETRY_DURATION.as_secs()
                )));
            }

            attempts += 1;

            match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(req)
                .send()
                .await
            {
                Ok(response) => {
                    if response.status().is_success() {
                        return response.json().await.map_err(|e| {
                            CompanionError::Internal(format!(
                                "Failed to parse completion response: {e}"
                            ))
                        });
                    }

                    if attempts >= MAX_ATTEMPTS {
                        return Err(CompanionError::Internal(format!(
                            "Completion API error after {} attempts: {}",
                            attempts,
                            response
                                .text()
                                .await
                                .unwrap_or_else(|_| "Unknown error".to_string())
                        )));
                    }
                }
                Err(e) => {
                    if attempts >= MAX_ATTEMPTS {
                        return Err(CompanionError::Internal(format!(
                            "Failed to send completion request after {attempts} attempts: {e}"
                        )));
                    }
                }
            }

            // Exponential backoff with jitter (only if we're going to retry)
            if attempts < MAX_ATTEMPTS {
                let base_delay =
                    Duration::from_millis(200 * 2u64.pow(attempts.saturating_sub(1) as u32));
                let jitter = rand::thread_rng().gen_range(0.8..=1.2);
                let delay = Duration::from_millis((base_delay.as_millis() as f64 * jitter) as u64);

                let max_delay = Duration::from_secs(30);
                let final_delay = std::cmp::min(delay, max_delay);

                sleep(final_delay).await;
            }
        }

        Err(CompanionError::Internal(format!(
            "Completion request failed after {MAX_ATTEMPTS} attempts"
        )))
    }
}
