use concierge_booking::{Collaborators, Session, SessionSettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{sleep, Duration, Instant};
use tracing::info;
use uuid::Uuid;

/// A live session and when it was last looked up.
pub struct SessionSlot {
    pub session: Arc<Mutex<Session>>,
    pub last_seen: Instant,
}

/// Live sessions. Each session has its own lock so turns on one session
/// run one at a time while different sessions proceed independently.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionSlot>>>,
    pub collaborators: Collaborators,
    pub settings: SessionSettings,
}

impl AppState {
    pub fn new(collaborators: Collaborators, settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            collaborators,
            settings,
        }
    }

    pub async fn create_session(&self) -> Uuid {
        let session = Session::new(self.collaborators.clone(), self.settings);
        let id = session.id();
        self.sessions.write().await.insert(
            id,
            SessionSlot {
                session: Arc::new(Mutex::new(session)),
                last_seen: Instant::now(),
            },
        );
        id
    }

    /// Looks a session up and marks it as active.
    pub async fn session(&self, id: &Uuid) -> Option<Arc<Mutex<Session>>> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(id)?;
        slot.last_seen = Instant::now();
        Some(slot.session.clone())
    }

    pub async fn remove_session(&self, id: &Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.write().await.remove(id).map(|slot| slot.session)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Closes and drops every session not looked up within `max_idle`.
    /// Returns how many were dropped.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<SessionSlot> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, slot)| slot.last_seen.elapsed() >= max_idle)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for slot in &expired {
            let abandoned = slot.session.lock().await.exit();
            info!(abandoned, "idle session expired");
        }
        expired.len()
    }
}

/// Periodically drops sessions nobody has touched within `max_idle`.
pub async fn start_session_sweeper(state: AppState, max_idle: Duration) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    info!(max_idle_secs = max_idle.as_secs(), "Session sweeper started");

    loop {
        sleep(period).await;
        let evicted = state.evict_idle(max_idle).await;
        if evicted > 0 {
            let remaining = state.session_count().await;
            info!(evicted, remaining, "idle sessions evicted");
        }
    }
}
