use std::sync::Arc;
use tokio::time::sleep;

use crate::assistant::{AssistantApi, OpenAiAssistantApi};
use crate::config::Config;
use crate::error::{CompanionError, Result};
use crate::feedback::{FeedbackSink, FileFeedbackSink};
use crate::lifecycle::{RunController, RunOutcome, Surface, Tick};
use crate::models::{AssistantProfile, Role};
use crate::router::{QueryRouter, TurnKind};
use crate::search::CoreSearchClient;
use crate::session::SessionStore;
use crate::transport::OpenAiCompletions;
use crate::validation::InputValidator;

const BUSY_NOTICE: &str = "Please wait for the current turn to finish.";
const NO_ARTICLES_NOTICE: &str = "No articles found. Please try a different query.";

/// How one user turn was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Conversational turn answered by the assistant.
    Answered,
    /// Search turn resolved with this many article cards.
    SearchResults(usize),
    /// Rejected because a run was still outstanding.
    Busy,
    /// Retry budget exhausted; a terminal error was rendered.
    Failed,
}

/// Facade wiring the session store, the query router, the run controller
/// and the optional feedback sink into one configurable companion. The
/// three deployment variants of this tool differ only in `Config`.
pub struct Companion {
    config: Config,
    store: SessionStore,
    controller: RunController,
    router: Option<QueryRouter>,
    feedback: Option<Arc<dyn FeedbackSink>>,
    api: Arc<dyn AssistantApi>,
    validator: InputValidator,
}

impl Companion {
    pub fn new(config: &Config) -> Result<Self> {
        if !config.has_assistant_credential() {
            return Err(CompanionError::MissingCredential(
                "assistant API key is not configured".to_string(),
            ));
        }

        let api: Arc<dyn AssistantApi> = Arc::new(OpenAiAssistantApi::new(
            config.assistant.api_base.clone(),
            config.assistant.api_key.clone(),
        ));

        let router = if config.search.enabled {
            if !config.has_search_credential() {
                // Reported once; the router stays disabled until corrected.
                tracing::error!(
                    "Search routing is enabled but CORE_API_KEY is not configured - search disabled"
                );
                None
            } else {
                Some(Self::build_router(config))
            }
        } else {
            None
        };

        let feedback: Option<Arc<dyn FeedbackSink>> = if config.feedback.enabled {
            Some(Arc::new(FileFeedbackSink::new(&config.feedback.root_dir)))
        } else {
            None
        };

        Ok(Self::assemble(config, api, router, feedback))
    }

    /// Wire a companion from pre-built collaborators.
    pub fn assemble(
        config: &Config,
        api: Arc<dyn AssistantApi>,
        router: Option<QueryRouter>,
        feedback: Option<Arc<dyn FeedbackSink>>,
    ) -> Self {
        Self {
            config: config.clone(),
            store: SessionStore::new(config.assistant.assistant_id.clone()),
            controller: RunController::new(api.clone(), config.polling.clone()),
            router,
            feedback,
            api,
            validator: InputValidator::new(),
        }
    }

    fn build_router(config: &Config) -> QueryRouter {
        let completions = Arc::new(OpenAiCompletions::new(
            config.assistant.api_base.clone(),
            config.assistant.api_key.clone(),
        ));
        let search = Arc::new(CoreSearchClient::new(
            config.search.base_url.clone(),
            config.search.api_key.clone(),
        ));
        QueryRouter::new(
            completions,
            search,
            config.classifier.model.clone(),
            config.classifier.max_tokens,
            config.search.page_limit,
        )
    }

    /// Runtime override of the conversational-service credential. Clients
    /// are built from the credential at wiring time, so the assistant API
    /// client, run controller and classifier transport are all rebuilt;
    /// existing sessions drop their thread bindings and get fresh threads
    /// lazily on the next turn.
    pub fn override_credential(&mut self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CompanionError::InvalidInput(
                "API key cannot be empty".to_string(),
            ));
        }
        self.config.assistant.api_key = api_key.to_string();

        let api: Arc<dyn AssistantApi> = Arc::new(OpenAiAssistantApi::new(
            self.config.assistant.api_base.clone(),
            self.config.assistant.api_key.clone(),
        ));
        self.controller = RunController::new(api.clone(), self.config.polling.clone());
        self.api = api;

        if self.router.is_some() {
            self.router = Some(Self::build_router(&self.config));
        }

        self.store.clear_threads();
        tracing::info!("Conversational-service credential updated, clients rebuilt");
        Ok(())
    }

    /// Handle one user turn end to end: validate, reject while a run is
    /// outstanding, route search turns to the literature service, and drive
    /// conversational turns through the run lifecycle to a settled outcome.
    pub async fn handle_turn(
        &mut self,
        session_key: &str,
        text: &str,
        surface: &dyn Surface,
    ) -> Result<TurnOutcome> {
        let text = self.validator.validate_prompt(text)?;

        let session = self.store.get_or_create(session_key);
        if session.run_outstanding() {
            surface.render_status(BUSY_NOTICE);
            return Ok(TurnOutcome::Busy);
        }

        if let Some(router) = &self.router {
            if let TurnKind::Search { terms } = router.classify(text).await {
                // Search turns bypass the assistant entirely: no run is
                // created and the transcript is untouched.
                surface.render_message(Role::User, text);
                let results = router.dispatch_search(&terms).await;
                if results.is_empty() {
                    surface.render_message(Role::Assistant, NO_ARTICLES_NOTICE);
                } else {
                    let cards = results
                        .iter()
                        .map(|r| r.card())
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    surface.render_message(Role::Assistant, &cards);
                }
                return Ok(TurnOutcome::SearchResults(results.len()));
            }
        }

        let mut tick = self.controller.submit_turn(session, text, surface).await?;
        loop {
            match tick {
                Tick::Recheck(delay) => {
                    sleep(delay).await;
                    tick = self.controller.check_status(session, surface).await?;
                }
                Tick::Settled(RunOutcome::Completed) => {
                    if let Some(reply) = session
                        .transcript
                        .iter()
                        .rev()
                        .find(|m| m.role == Role::Assistant)
                    {
                        surface.render_message(Role::Assistant, &reply.display_text());
                    }
                    return Ok(TurnOutcome::Answered);
                }
                Tick::Settled(RunOutcome::Exhausted) => {
                    return Ok(TurnOutcome::Failed);
                }
            }
        }
    }

    /// Record user feedback. Fire-and-forget: sink failures are logged and
    /// never surfaced to the conversation.
    pub async fn record_feedback(&self, message_content: &str, feedback: &str, feedback_type: &str) {
        let Some(sink) = &self.feedback else {
            tracing::debug!("Feedback logging disabled, dropping entry");
            return;
        };
        if let Err(e) = sink.record(message_content, feedback, feedback_type).await {
            tracing::warn!("Failed to record feedback: {}", e);
        }
    }

    /// Upload a JSON document produced by the ingestion collaborator and
    /// pin the returned blob id to the session. Later turns attach it.
    pub async fn attach_converted_blob(
        &mut self,
        session_key: &str,
        file_name: &str,
        json: String,
    ) -> Result<String> {
        let blob_id = self.api.upload_blob(file_name, json).await?;
        self.store
            .get_or_create(session_key)
            .attach_blob(blob_id.clone());
        Ok(blob_id)
    }

    /// Runtime assistant override. The id is validated against the remote
    /// service before the session is rebound to it.
    pub async fn override_assistant(
        &mut self,
        session_key: &str,
        assistant_id: &str,
    ) -> Result<AssistantProfile> {
        let profile = self.api.retrieve_assistant(assistant_id).await?;
        self.store
            .get_or_create(session_key)
            .set_assistant(profile.id.clone());
        Ok(profile)
    }

    pub fn session(&self, session_key: &str) -> Option<&crate::session::Session> {
        self.store.get(session_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::MockAssistantApi;
    use crate::error::Result as CResult;
    use crate::lifecycle::tests::RecordingSurface;
    use crate::models::{
        Article, ChatMessage, Choice, CompletionRequest, CompletionResponse, Run, RunStatus,
    };
    use crate::search::MockSearchApi;
    use crate::transport::CompletionTransport;
    use async_trait::async_trait;

    struct FixedCompletions {
        reply: String,
    }

    #[async_trait]
    impl CompletionTransport for FixedCompletions {
        async fn complete(&self, _req: &CompletionRequest) -> CResult<CompletionResponse> {
            Ok(CompletionResponse {
                choices: vec![Choice {
                    message: ChatMessage {
                        role: "assistant".to_string(),
                        content: self.reply.clone(),
                    },
                }],
            })
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.assistant.api_key = "sk-test".to_string();
        config.assistant.assistant_id = "asst_test".to_string();
        config.search.api_key = "core-test".to_string();
        config
    }

    fn search_router(reply: &str, search: MockSearchApi) -> QueryRouter {
        QueryRouter::new(
            Arc::new(FixedCompletions {
                reply: reply.to_string(),
            }),
            Arc::new(search),
            "test-model".to_string(),
            200,
            5,
        )
    }

    #[tokio::test]
    async fn test_search_turn_bypasses_assistant() {
        // Scenario: a search-classified turn renders article cards and
        // never touches the assistant API (the mock has no expectations).
        let mut search = MockSearchApi::new();
        search.expect_search().times(1).returning(|_, _, _, _| {
            Ok(vec![
                Article {
                    title: Some("Enzyme kinetics revisited".to_string()),
                    ..Default::default()
                },
                Article {
                    title: Some("Michaelis-Menten at scale".to_string()),
                    ..Default::default()
                },
            ])
        });
        let router = search_router(
            "This is a search query. The key search terms are:\n- enzyme kinetics",
            search,
        );
        let config = test_config();
        let mut companion = Companion::assemble(
            &config,
            Arc::new(MockAssistantApi::new()),
            Some(router),
            None,
        );
        let surface = RecordingSurface::default();

        let outcome = companion
            .handle_turn("alice", "Find me articles about enzyme kinetics", &surface)
            .await
            .expect("turn should succeed");

        assert_eq!(outcome, TurnOutcome::SearchResults(2));
        let session = companion.session("alice").expect("session exists");
        assert!(session.transcript.is_empty());
        assert!(session.current_run.is_none());

        let events = surface.events();
        let cards = &events
            .iter()
            .find(|(kind, _)| kind == "assistant")
            .expect("cards rendered")
            .1;
        assert!(cards.contains("Enzyme kinetics revisited"));
        assert!(cards.contains("Michaelis-Menten at scale"));
    }

    #[tokio::test]
    async fn test_empty_search_renders_no_articles_notice() {
        let mut search = MockSearchApi::new();
        search
            .expect_search()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![]));
        let router = search_router(
            "This is a search query. The key search terms are:\n- unobtainium",
            search,
        );
        let config = test_config();
        let mut companion = Companion::assemble(
            &config,
            Arc::new(MockAssistantApi::new()),
            Some(router),
            None,
        );
        let surface = RecordingSurface::default();

        let outcome = companion
            .handle_turn("alice", "Find me articles about unobtainium", &surface)
            .await
            .expect("turn should succeed");

        assert_eq!(outcome, TurnOutcome::SearchResults(0));
        assert!(
            surface
                .events()
                .iter()
                .any(|(kind, text)| kind == "assistant" && text == NO_ARTICLES_NOTICE)
        );
    }

    #[tokio::test]
    async fn test_conversational_turn_runs_to_completion() {
        let mut api = MockAssistantApi::new();
        api.expect_create_thread()
            .times(1)
            .returning(|_| Ok("thread_1".to_string()));
        api.expect_create_message()
            .times(1)
            .returning(|_, _, _, _| Ok("msg_1".to_string()));
        api.expect_create_run().times(1).returning(|_, _| {
            Ok(Run {
                id: "run_1".to_string(),
                status: RunStatus::Completed,
            })
        });
        api.expect_list_messages().times(1).returning(|_| {
            Ok(vec![
                crate::models::ThreadMessage::local(Role::Assistant, "Oxidation states are..."),
                crate::models::ThreadMessage::local(Role::User, "Hi, can you explain?"),
            ])
        });

        let mut config = test_config();
        // Keep the driver loop fast in tests.
        config.polling.running_delay_ms = 1;
        config.polling.queued_delay_ms = 1;
        config.polling.failed_delay_ms = 1;

        let mut companion = Companion::assemble(&config, Arc::new(api), None, None);
        let surface = RecordingSurface::default();

        let outcome = companion
            .handle_turn("alice", "Hi, can you explain oxidation states?", &surface)
            .await
            .expect("turn should succeed");

        assert_eq!(outcome, TurnOutcome::Answered);
        let session = companion.session("alice").expect("session exists");
        assert_eq!(session.retry_count, 0);
        assert!(session.current_run.is_none());
        assert!(
            surface
                .events()
                .iter()
                .any(|(kind, text)| kind == "assistant" && text == "Oxidation states are...")
        );
    }

    #[tokio::test]
    async fn test_busy_session_rejects_new_turn() {
        let config = test_config();
        let mut companion =
            Companion::assemble(&config, Arc::new(MockAssistantApi::new()), None, None);
        companion.store.get_or_create("alice").current_run = Some(Run {
            id: "run_1".to_string(),
            status: RunStatus::Running,
        });
        let surface = RecordingSurface::default();

        let outcome = companion
            .handle_turn("alice", "another question", &surface)
            .await
            .expect("rejection is not an error");

        assert_eq!(outcome, TurnOutcome::Busy);
        assert!(
            surface
                .events()
                .iter()
                .any(|(kind, text)| kind == "status" && text == BUSY_NOTICE)
        );
    }

    #[tokio::test]
    async fn test_attach_converted_blob_pins_id() {
        let mut api = MockAssistantApi::new();
        api.expect_upload_blob()
            .times(1)
            .returning(|_, _| Ok("file-42".to_string()));
        let config = test_config();
        let mut companion = Companion::assemble(&config, Arc::new(api), None, None);

        let blob_id = companion
            .attach_converted_blob("alice", "converted.json", "[]".to_string())
            .await
            .expect("upload should succeed");

        assert_eq!(blob_id, "file-42");
        let session = companion.session("alice").expect("session exists");
        assert_eq!(session.uploaded_blob_id.as_deref(), Some("file-42"));
    }

    #[tokio::test]
    async fn test_override_credential_rejects_empty_key() {
        let config = test_config();
        let mut companion =
            Companion::assemble(&config, Arc::new(MockAssistantApi::new()), None, None);
        let err = companion
            .override_credential("   ")
            .expect_err("blank key must be rejected");
        assert!(matches!(err, CompanionError::InvalidInput(_)));
        assert_eq!(companion.config.assistant.api_key, "sk-test");
    }

    #[tokio::test]
    async fn test_override_credential_rebuilds_clients_and_drops_threads() {
        let config = test_config();
        let mut companion =
            Companion::assemble(&config, Arc::new(MockAssistantApi::new()), None, None);
        companion.store.get_or_create("alice").thread_id = Some("thread_old".to_string());
        companion
            .store
            .get_or_create("alice")
            .attach_blob("file-1".to_string());

        companion
            .override_credential("sk-fresh")
            .expect("override should succeed");

        assert_eq!(companion.config.assistant.api_key, "sk-fresh");
        let session = companion.session("alice").expect("session exists");
        // Thread is rebound lazily under the new credential; the rest of
        // the session survives.
        assert!(session.thread_id.is_none());
        assert_eq!(session.uploaded_blob_id.as_deref(), Some("file-1"));
    }

    #[tokio::test]
    async fn test_override_assistant_rebinds_session() {
        let mut api = MockAssistantApi::new();
        api.expect_retrieve_assistant().times(1).returning(|id| {
            Ok(crate::models::AssistantProfile {
                id: id.to_string(),
                name: Some("Override".to_string()),
                model: None,
            })
        });
        let config = test_config();
        let mut companion = Companion::assemble(&config, Arc::new(api), None, None);
        companion.store.get_or_create("alice").thread_id = Some("thread_old".to_string());

        let profile = companion
            .override_assistant("alice", "asst_override")
            .await
            .expect("override should succeed");

        assert_eq!(profile.id, "asst_override");
        let session = companion.session("alice").expect("session exists");
        assert_eq!(session.assistant_id, "asst_override");
        assert!(session.thread_id.is_none());
    }
}
