use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::session::SessionState;

/// Keyed storage for live sessions. An unknown or malformed session id is
/// never an error: the caller is the sole source of session identity, so an
/// unseen key simply creates a fresh session.
///
/// Each session is handed out behind its own async mutex, so turns for one
/// session serialise while turns for different sessions proceed in parallel.
pub trait SessionStore: Send + Sync {
    fn get_or_create(&self, session_id: &str) -> Arc<Mutex<SessionState>>;
    /// Explicit close; idempotent.
    fn remove(&self, session_id: &str);
}

struct Entry {
    state: Arc<Mutex<SessionState>>,
    last_seen: Instant,
}

/// Process-lifetime in-memory store with idle-TTL eviction. Sessions that
/// have not been touched within `ttl` are swept on the next access.
pub struct InMemorySessionStore {
    sessions: StdMutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().unwrap();
        let now = Instant::now();

        sessions.retain(|id, entry| {
            let live = now.duration_since(entry.last_seen) < self.ttl;
            if !live {
                tracing::debug!(session_id = %id, "Evicting idle session");
            }
            live
        });

        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::info!(session_id = %session_id, "Creating new session");
            Entry {
                state: Arc::new(Mutex::new(SessionState::new())),
                last_seen: now,
            }
        });
        entry.last_seen = now;
        Arc::clone(&entry.state)
    }

    fn remove(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
    }
}
