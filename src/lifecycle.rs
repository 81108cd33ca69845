use std::sync::Arc;
use std::time::Duration;

use crate::assistant::AssistantApi;
use crate::config::PollingConfig;
use crate::error::{CompanionError, Result};
use crate::models::{Role, RunStatus};
use crate::session::Session;

/// Rendering contract the controller needs from the hosting front-end:
/// append a message bubble, show a transient status line, show an error.
pub trait Surface: Send + Sync {
    fn render_message(&self, role: Role, text: &str);
    fn render_status(&self, text: &str);
    fn render_error(&self, text: &str);
}

/// What the controller wants to happen after one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Sleep for the given duration, then call `check_status` again.
    Recheck(Duration),
    /// The current run reached a settled outcome; no further automatic
    /// polling until the next user submission.
    Settled(RunOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Exhausted,
}

const THINKING_NOTICE: &str = "Thinking ......";
const RETRY_NOTICE: &str = "Run failed, retrying ......";
const EXHAUSTED_NOTICE: &str =
    "FAILED: The assistant service is currently processing too many requests. Please try again later ......";

/// Drives one remote run per submitted turn through its status states,
/// within the session's retry budget. All waits are surfaced as `Tick`
/// values; the caller owns the actual sleeping.
pub struct RunController {
    api: Arc<dyn AssistantApi>,
    polling: PollingConfig,
}

impl RunController {
    pub fn new(api: Arc<dyn AssistantApi>, polling: PollingConfig) -> Self {
        Self { api, polling }
    }

    /// Submit one non-search user turn: echo it locally, lazily create the
    /// remote thread, send the message (with the session blob when present)
    /// and start a run.
    ///
    /// A submission while a run is outstanding is rejected; the caller
    /// should ask the user to wait for the current turn to finish.
    pub async fn submit_turn(
        &self,
        session: &mut Session,
        text: &str,
        surface: &dyn Surface,
    ) -> Result<Tick> {
        if session.run_outstanding() {
            return Err(CompanionError::RunInProgress);
        }

        session.append_local_echo(Role::User, text);
        surface.render_message(Role::User, text);

        let thread_id = match &session.thread_id {
            Some(id) => id.clone(),
            None => {
                let id = self.api.create_thread(&session.session_id).await?;
                session.thread_id = Some(id.clone());
                id
            }
        };

        self.api
            .create_message(&thread_id, "user", text, session.uploaded_blob_id.clone())
            .await?;

        let run = self
            .api
            .create_run(&thread_id, &session.assistant_id)
            .await?;
        tracing::debug!(
            session_id = %session.session_id,
            run_id = %run.id,
            "Submitted turn, entering poll loop"
        );
        session.current_run = Some(run);
        session.retry_count = 0;

        Ok(Tick::Recheck(Duration::from_millis(
            self.polling.running_delay_ms,
        )))
    }

    /// One scheduled poll of the outstanding run. Classifies the last known
    /// status, re-fetches where the state is non-terminal, and reports how
    /// long to wait before the next check.
    pub async fn check_status(
        &self,
        session: &mut Session,
        surface: &dyn Surface,
    ) -> Result<Tick> {
        let Some(run) = session.current_run.clone() else {
            return Ok(Tick::Settled(RunOutcome::Completed));
        };
        let thread_id = session
            .thread_id
            .clone()
            .ok_or_else(|| CompanionError::Internal("Run outstanding without a thread".into()))?;

        match run.status {
            RunStatus::Completed => {
                let mut messages = self.api.list_messages(&thread_id).await?;
                // Remote order is most-recent-first.
                messages.reverse();
                session.replace_transcript(messages);
                session.retry_count = 0;
                session.current_run = None;
                tracing::info!(
                    session_id = %session.session_id,
                    run_id = %run.id,
                    "Run completed, transcript refreshed"
                );
                Ok(Tick::Settled(RunOutcome::Completed))
            }
            RunStatus::Failed => {
                session.retry_count += 1;
                if session.retry_count < self.polling.max_retries {
                    surface.render_status(RETRY_NOTICE);
                    // Re-poll the same run; no new run is created on failure.
                    let refreshed = self.api.retrieve_run(&thread_id, &run.id).await?;
                    session.current_run = Some(refreshed);
                    Ok(Tick::Recheck(Duration::from_millis(
                        self.polling.failed_delay_ms,
                    )))
                } else {
                    surface.render_error(EXHAUSTED_NOTICE);
                    tracing::warn!(
                        session_id = %session.session_id,
                        run_id = %run.id,
                        retries = session.retry_count,
                        "Retry budget exhausted, giving up on run"
                    );
                    session.current_run = None;
                    Ok(Tick::Settled(RunOutcome::Exhausted))
                }
            }
            RunStatus::Running => {
                surface.render_status(THINKING_NOTICE);
                if session.retry_count < self.polling.max_retries {
                    let refreshed = self.api.retrieve_run(&thread_id, &run.id).await?;
                    session.current_run = Some(refreshed);
                    Ok(Tick::Recheck(Duration::from_millis(
                        self.polling.running_delay_ms,
                    )))
                } else {
                    session.current_run = None;
                    Ok(Tick::Settled(RunOutcome::Exhausted))
                }
            }
            // Queued, or any status the service invents that we don't know.
            RunStatus::Queued | RunStatus::Other => {
                if session.retry_count < self.polling.max_retries {
                    let refreshed = self.api.retrieve_run(&thread_id, &run.id).await?;
                    session.current_run = Some(refreshed);
                    Ok(Tick::Recheck(Duration::from_millis(
                        self.polling.queued_delay_ms,
                    )))
                } else {
                    session.current_run = None;
                    Ok(Tick::Settled(RunOutcome::Exhausted))
                }
            }
        }
    }
}
