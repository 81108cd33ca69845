use std::collections::HashMap;

use crate::models::{Role, Run, ThreadMessage};

/// Per-user interaction context. One remote thread per session for its
/// lifetime; switching assistants drops the thread so a fresh one is created
/// lazily on the next turn.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub thread_id: Option<String>,
    pub assistant_id: String,
    pub transcript: Vec<ThreadMessage>,
    pub uploaded_blob_id: Option<String>,
    pub current_run: Option<Run>,
    pub retry_count: u8,
}

impl Session {
    fn new(assistant_id: String) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            thread_id: None,
            assistant_id,
            transcript: Vec::new(),
            uploaded_blob_id: None,
            current_run: None,
            retry_count: 0,
        }
    }

    /// Last-write-wins; the blob is attached to every subsequent outgoing
    /// message while present.
    pub fn attach_blob(&mut self, blob_id: String) {
        if self.uploaded_blob_id.is_some() {
            tracing::info!(
                session_id = %self.session_id,
                "Replacing previously attached blob"
            );
        }
        self.uploaded_blob_id = Some(blob_id);
    }

    /// Switch assistants at runtime. The bound thread belongs to the old
    /// assistant's conversation, so it is dropped here and recreated lazily.
    pub fn set_assistant(&mut self, assistant_id: String) {
        self.assistant_id = assistant_id;
        self.thread_id = None;
    }

    /// Wholesale transcript replacement from a fresh remote fetch,
    /// chronological order expected.
    pub fn replace_transcript(&mut self, messages: Vec<ThreadMessage>) {
        self.transcript = messages;
    }

    /// Optimistic local echo of a turn before the remote round-trip lands.
    pub fn append_local_echo(&mut self, role: Role, text: &str) {
        self.transcript.push(ThreadMessage::local(role, text));
    }

    /// True while a run exists and has not reached a settled outcome.
    pub fn run_outstanding(&self) -> bool {
        self.current_run.is_some()
    }
}

/// In-memory session store. Purely local state; never talks to the network.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    default_assistant_id: String,
}

impl SessionStore {
    pub fn new(default_assistant_id: String) -> Self {
        Self {
            sessions: HashMap::new(),
            default_assistant_id,
        }
    }

    /// Idempotent: the first call for a key creates the session, later calls
    /// return the same one.
    pub fn get_or_create(&mut self, key: &str) -> &mut Session {
        let default_assistant = self.default_assistant_id.clone();
        self.sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(default_assistant))
    }

    pub fn get(&self, key: &str) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Drop every session's thread binding, e.g. after a credential change.
    /// Threads are recreated lazily on the next turn.
    pub fn clear_threads(&mut self) {
        for session in self.sessions.values_mut() {
            session.thread_id = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut store = SessionStore::new("asst_default".to_string());
        let id = store.get_or_create("alice").session_id.clone();
        let again = store.get_or_create("alice");
        assert_eq!(again.session_id, id);
        assert_eq!(again.assistant_id, "asst_default");
        assert!(again.transcript.is_empty());
        assert!(again.current_run.is_none());
        assert_eq!(again.retry_count, 0);
    }

    #[test]
    fn test_attach_blob_last_write_wins() {
        let mut store = SessionStore::new("asst_default".to_string());
        let session = store.get_or_create("alice");
        session.attach_blob("file-1".to_string());
        session.attach_blob("file-2".to_string());
        assert_eq!(session.uploaded_blob_id.as_deref(), Some("file-2"));
    }

    #[test]
    fn test_set_assistant_drops_thread() {
        let mut store = SessionStore::new("asst_default".to_string());
        let session = store.get_or_create("alice");
        session.thread_id = Some("thread_1".to_string());
        session.set_assistant("asst_override".to_string());
        assert_eq!(session.assistant_id, "asst_override");
        assert!(session.thread_id.is_none());
    }

    #[test]
    fn test_clear_threads_unbinds_every_session() {
        let mut store = SessionStore::new("asst_default".to_string());
        store.get_or_create("alice").thread_id = Some("thread_a".to_string());
        store.get_or_create("bob").thread_id = Some("thread_b".to_string());
        store.clear_threads();
        assert!(store.get("alice").unwrap().thread_id.is_none());
        assert!(store.get("bob").unwrap().thread_id.is_none());
    }

    #[test]
    fn test_run_outstanding() {
        let mut store = SessionStore::new("asst_default".to_string());
        let session = store.get_or_create("alice");
        assert!(!session.run_outstanding());
        session.current_run = Some(Run {
            id: "run_1".to_string(),
            status: RunStatus::Queued,
        });
        assert!(session.run_outstanding());
    }
}
