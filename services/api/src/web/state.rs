//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the in-memory session store.

use crate::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use storybook_core::ports::{
    CharacterAnalysisService, GalleryService, IllustrationService, OutlineService,
    StorageService, TextToSpeechService,
};
use storybook_core::session::StorySession;
use tokio::sync::RwLock;
use uuid::Uuid;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub outline_adapter: Arc<dyn OutlineService>,
    pub character_adapter: Arc<dyn CharacterAnalysisService>,
    pub illustrator_adapter: Arc<dyn IllustrationService>,
    /// Absent when no TTS key is configured; the audiobook endpoint then
    /// reports narration as unavailable instead of failing at startup.
    pub tts_adapter: Option<Arc<dyn TextToSpeechService>>,
    pub storage_adapter: Arc<dyn StorageService>,
    pub gallery_adapter: Arc<dyn GalleryService>,
}

/// All live authoring sessions, keyed by session id. Handlers access a
/// session only through the closure helpers so the lock is held just long
/// enough to read or mutate state — never across an external call.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, StorySession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: StorySession) -> Uuid {
        let id = session.id();
        self.inner.write().await.insert(id, session);
        id
    }

    /// Discards a session entirely (the wizard's `reset`).
    pub async fn remove(&self, id: &Uuid) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    /// Runs a closure against a session immutably. `None` when no session
    /// with that id exists.
    pub async fn with<R>(&self, id: &Uuid, f: impl FnOnce(&StorySession) -> R) -> Option<R> {
        let sessions = self.inner.read().await;
        sessions.get(id).map(f)
    }

    /// Runs a closure against a session mutably.
    pub async fn with_mut<R>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut StorySession) -> R,
    ) -> Option<R> {
        let mut sessions = self.inner.write().await;
        sessions.get_mut(id).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_can_be_inserted_looked_up_and_removed() {
        let store = SessionStore::new();
        let id = store.insert(StorySession::new("premise", "title")).await;

        let title = store.with(&id, |s| s.title().to_string()).await;
        assert_eq!(title.as_deref(), Some("title"));

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.with(&id, |_| ()).await.is_none());
    }
}
