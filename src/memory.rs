//! Per-session conversation memory.
//!
//! Each session keeps its most recent `max_history` exchanges (oldest
//! evicted first) and a lock that serializes queries within the session.
//! Sessions live in process memory only.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// One user question and the assistant's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub query: String,
    pub answer: String,
}

#[derive(Default)]
struct Session {
    exchanges: VecDeque<Exchange>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

pub struct SessionManager {
    max_history: usize,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // The map holds no invariants a panicking writer could break.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new empty session and return its id.
    pub fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions().insert(id.clone(), Session::default());
        id
    }

    /// Formatted history, `None` for unknown or empty sessions.
    ///
    /// ```text
    /// User: <query>
    /// Assistant: <answer>
    /// ```
    pub fn get_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions();
        let session = sessions.get(session_id)?;
        if session.exchanges.is_empty() {
            return None;
        }
        let lines: Vec<String> = session
            .exchanges
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.query, e.answer))
            .collect();
        Some(lines.join("\n"))
    }

    /// Append an exchange, creating the session if needed and evicting
    /// the oldest exchanges beyond `max_history`.
    pub fn add_exchange(&self, session_id: &str, query: &str, answer: &str) {
        let mut sessions = self.sessions();
        let session = sessions.entry(session_id.to_string()).or_default();
        session.exchanges.push_back(Exchange {
            query: query.to_string(),
            answer: answer.to_string(),
        });
        while session.exchanges.len() > self.max_history {
            session.exchanges.pop_front();
        }
    }

    pub fn exchanges(&self, session_id: &str) -> Vec<Exchange> {
        self.sessions()
            .get(session_id)
            .map(|s| s.exchanges.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear_session(&self, session_id: &str) {
        self.sessions().remove(session_id);
    }

    /// Acquire the session's query lock, creating the session if needed.
    ///
    /// Held for the whole read-history / generate / write-history cycle so
    /// two queries on one session never interleave.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let gate = self
            .sessions()
            .entry(session_id.to_string())
            .or_default()
            .gate
            .clone();
        gate.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_ids_are_unique() {
        let manager = SessionManager::new(2);
        let a = manager.create_session();
        let b = manager.create_session();
        assert_ne!(a, b);
        assert!(manager.get_history(&a).is_none());
    }

    #[test]
    fn test_history_format() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();
        manager.add_exchange(&id, "What is ownership?", "Single owner per value.");
        assert_eq!(
            manager.get_history(&id).unwrap(),
            "User: What is ownership?\nAssistant: Single owner per value."
        );
    }

    #[test]
    fn test_oldest_exchange_evicted() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();
        manager.add_exchange(&id, "q1", "a1");
        manager.add_exchange(&id, "q2", "a2");
        manager.add_exchange(&id, "q3", "a3");

        let queries: Vec<_> = manager.exchanges(&id).into_iter().map(|e| e.query).collect();
        assert_eq!(queries, vec!["q2", "q3"]);
        assert_eq!(
            manager.get_history(&id).unwrap(),
            "User: q2\nAssistant: a2\nUser: q3\nAssistant: a3"
        );
    }

    #[test]
    fn test_unknown_session_is_created_on_add() {
        let manager = SessionManager::new(1);
        assert!(manager.get_history("client-chosen").is_none());
        manager.add_exchange("client-chosen", "q", "a");
        assert!(manager.get_history("client-chosen").is_some());

        manager.clear_session("client-chosen");
        assert!(manager.get_history("client-chosen").is_none());
    }

    #[tokio::test]
    async fn test_lock_serializes_one_session() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();
        let guard = manager.lock(&id).await;

        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(50), manager.lock(&id)).await;
        assert!(blocked.is_err());

        // Other sessions are unaffected.
        let other = manager.create_session();
        let _other_guard = manager.lock(&other).await;

        drop(guard);
        let _again = manager.lock(&id).await;
    }
}
