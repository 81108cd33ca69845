use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the companion. One config drives every
/// deployment variant; branding, search routing and feedback logging are
/// plain settings rather than separate builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub assistant: AssistantConfig,
    pub classifier: ClassifierConfig,
    pub search: SearchConfig,
    pub feedback: FeedbackConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    /// Title line shown by the front-end on startup.
    pub title: String,
    pub tagline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub api_key: String,
    pub assistant_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub model: String,
    pub max_tokens: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub page_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub enabled: bool,
    /// Root directory for the write-only feedback store.
    pub root_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay before the first status check after submitting a turn, and
    /// between checks while the run reports `running`.
    pub running_delay_ms: u64,
    /// Delay between checks while the run is queued or in an unknown
    /// non-terminal state.
    pub queued_delay_ms: u64,
    /// Delay before re-polling after a `failed` status.
    pub failed_delay_ms: u64,
    /// Automatic re-poll budget per run before the failure becomes terminal.
    pub max_retries: u8,
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    /// ALWAYS returns a valid config - never fails.
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!(
                "No .env file found in any expected location - continuing with env vars only"
            );
        }

        let config_path =
            env::var("COMPANION_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        // Validate configuration - log warnings but don't fail
        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("COMPANION_APP_NAME") {
            self.app.name = name;
        }
        if let Ok(title) = env::var("COMPANION_APP_TITLE") {
            self.app.title = title;
        }

        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            self.assistant.api_key = api_key;
        }
        if let Ok(assistant_id) = env::var("COMPANION_ASSISTANT_ID") {
            self.assistant.assistant_id = assistant_id;
        }
        if let Ok(api_base) = env::var("COMPANION_API_BASE") {
            self.assistant.api_base = api_base;
        }

        if let Ok(model) = env::var("COMPANION_CLASSIFIER_MODEL") {
            self.classifier.model = model;
        }

        if let Ok(api_key) = env::var("CORE_API_KEY") {
            self.search.api_key = api_key;
        }
        if let Ok(enabled) = env::var("COMPANION_SEARCH_ENABLED") {
            if let Ok(flag) = enabled.parse() {
                self.search.enabled = flag;
            }
        }
        if let Ok(limit) = env::var("COMPANION_SEARCH_PAGE_LIMIT") {
            if let Ok(limit_num) = limit.parse() {
                self.search.page_limit = limit_num;
            }
        }

        if let Ok(enabled) = env::var("COMPANION_FEEDBACK_ENABLED") {
            if let Ok(flag) = enabled.parse() {
                self.feedback.enabled = flag;
            }
        }
        if let Ok(dir) = env::var("COMPANION_FEEDBACK_DIR") {
            self.feedback.root_dir = dir;
        }

        if let Ok(retries) = env::var("COMPANION_MAX_RETRIES") {
            if let Ok(retries_num) = retries.parse() {
                self.polling.max_retries = retries_num;
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.assistant.api_key == "PLACEHOLDER_OPENAI_API_KEY"
            || self.assistant.api_key.is_empty()
        {
            return Err("OPENAI_API_KEY environment variable must be set".into());
        }

        if self.assistant.assistant_id.is_empty() {
            return Err("assistant.assistant_id cannot be empty".into());
        }

        if self.search.enabled
            && (self.search.api_key == "PLACEHOLDER_CORE_API_KEY" || self.search.api_key.is_empty())
        {
            return Err("CORE_API_KEY must be set when search routing is enabled".into());
        }

        if self.search.page_limit == 0 {
            return Err("search.page_limit cannot be 0".into());
        }

        if self.polling.running_delay_ms == 0 || self.polling.queued_delay_ms == 0 {
            return Err("polling delays cannot be 0".into());
        }

        Ok(())
    }

    pub fn running_delay(&self) -> Duration {
        Duration::from_millis(self.polling.running_delay_ms)
    }

    pub fn queued_delay(&self) -> Duration {
        Duration::from_millis(self.polling.queued_delay_ms)
    }

    pub fn failed_delay(&self) -> Duration {
        Duration::from_millis(self.polling.failed_delay_ms)
    }

    /// True when the assistant credential is usable. A missing credential
    /// disables the conversational path rather than crashing startup.
    pub fn has_assistant_credential(&self) -> bool {
        !self.assistant.api_key.is_empty()
            && self.assistant.api_key != "PLACEHOLDER_OPENAI_API_KEY"
    }

    pub fn has_search_credential(&self) -> bool {
        !self.search.api_key.is_empty() && self.search.api_key != "PLACEHOLDER_CORE_API_KEY"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                name: "study-companion".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: "Extended Essay Companion".to_string(),
                tagline: "Ask a question, or request academic articles on a topic.".to_string(),
            },
            assistant: AssistantConfig {
                api_key: env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
                    tracing::warn!("OPENAI_API_KEY not set, using placeholder");
                    "PLACEHOLDER_OPENAI_API_KEY".to_string()
                }),
                assistant_id: env::var("COMPANION_ASSISTANT_ID").unwrap_or_default(),
                api_base: "https://api.openai.com/v1".to_string(),
            },
            classifier: ClassifierConfig {
                model: "gpt-3.5-turbo".to_string(),
                max_tokens: 200,
            },
            search: SearchConfig {
                enabled: true,
                api_key: env::var("CORE_API_KEY").unwrap_or_else(|_| {
                    tracing::warn!("CORE_API_KEY not set, using placeholder");
                    "PLACEHOLDER_CORE_API_KEY".to_string()
                }),
                base_url: "https://api.core.ac.uk/v3".to_string(),
                page_limit: 5,
            },
            feedback: FeedbackConfig {
                enabled: false,
                root_dir: "feedback-store".to_string(),
            },
            polling: PollingConfig {
                running_delay_ms: 1000,
                queued_delay_ms: 3000,
                failed_delay_ms: 3000,
                max_retries: 3,
            },
        }
    }
}
