//! services/dashboard/src/web/state.rs
//!
//! Defines the application's shared state and the per-user sign-in sessions.

use crate::config::Config;
use crate::web::refresh::ProgressLoader;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use tracker_core::domain::{
    Assignment, AuthContext, Event, Grade, Notification, Semester, Subject, Teacher,
    TimetableEntry, User,
};
use tracker_core::ports::{
    AuthService, EntityService, NotificationInbox, SettingsService, TokenDecoder,
};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn EntityService<User>>,
    pub subjects: Arc<dyn EntityService<Subject>>,
    pub assignments: Arc<dyn EntityService<Assignment>>,
    pub grades: Arc<dyn EntityService<Grade>>,
    pub semesters: Arc<dyn EntityService<Semester>>,
    pub teachers: Arc<dyn EntityService<Teacher>>,
    pub events: Arc<dyn EntityService<Event>>,
    pub timetable: Arc<dyn EntityService<TimetableEntry>>,
    pub notifications: Arc<dyn EntityService<Notification>>,
    pub inbox: Arc<dyn NotificationInbox>,
    pub settings: Arc<dyn SettingsService>,
    pub auth: Arc<dyn AuthService>,
    pub tokens: Arc<dyn TokenDecoder>,
    pub sessions: SessionStore,
    pub progress: Arc<ProgressLoader>,
}

//=========================================================================================
// Sign-in Sessions
//=========================================================================================

/// One signed-in browser session. Created at sign-in, dropped at sign-out.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub auth: AuthContext,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory registry of sign-in sessions keyed by the session cookie.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session and returns it with a fresh random id.
    pub async fn open(&self, auth: AuthContext, expires_at: DateTime<Utc>) -> Arc<Session> {
        let session = Arc::new(Session {
            id: Uuid::new_v4().to_string(),
            auth,
            expires_at,
        });
        self.inner
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Looks up a live session. Expired sessions are evicted and reported as missing.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        let session = self.inner.read().await.get(session_id).cloned()?;
        if session.is_expired(Utc::now()) {
            self.inner.write().await.remove(session_id);
            return None;
        }
        Some(session)
    }

    pub async fn close(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner.write().await.remove(session_id)
    }

    /// Removes every session expired at `now` and returns their ids.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.inner.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }

    pub async fn live_ids(&self) -> HashSet<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

impl AppState {
    /// Evicts expired sessions and drops refresh state no live session owns.
    ///
    /// Returns the number of evicted sessions.
    pub async fn sweep_sessions(&self) -> usize {
        let expired = self.sessions.sweep_expired(Utc::now()).await;
        let live = self.sessions.live_ids().await;
        let dropped = self.progress.retain(|key| live.contains(key));
        if !expired.is_empty() || dropped > 0 {
            debug!(
                "Swept {} expired sessions and {} refresh slots",
                expired.len(),
                dropped
            );
        }
        expired.len()
    }
}
