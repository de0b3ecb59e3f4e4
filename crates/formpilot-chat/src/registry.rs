//! Session registry: the boundary the presentation layer talks to.
//!
//! Each session sits behind its own async mutex, so inputs to one session
//! are processed to completion in arrival order while other sessions run
//! independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use formpilot_core::config::FormPilotConfig;

use crate::catalog::ServiceCatalog;
use crate::controller::{DialogueController, ImageReply, TurnOutcome};
use crate::error::ChatError;
use crate::session::ConversationSession;

type SessionHandle = Arc<tokio::sync::Mutex<ConversationSession>>;

/// Owns all live sessions and the shared dialogue controller.
pub struct SessionRegistry {
    controller: DialogueController,
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
    session_timeout_minutes: u32,
}

impl SessionRegistry {
    pub fn new(controller: DialogueController, session_timeout_minutes: u32) -> Self {
        Self {
            controller,
            sessions: Mutex::new(HashMap::new()),
            session_timeout_minutes,
        }
    }

    /// Build the registry, controller and adapters from configuration.
    pub fn from_config(config: &FormPilotConfig) -> Self {
        Self::new(
            DialogueController::from_config(config),
            config.dialogue.session_timeout_minutes,
        )
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        self.controller.catalog()
    }

    /// The greeting shown to a new user.
    pub fn greeting(&self) -> String {
        self.controller.greeting()
    }

    /// Create a session with an empty transcript.
    pub fn start_session(&self) -> Result<ConversationSession, ChatError> {
        let session = ConversationSession::new();
        let snapshot = session.clone();
        self.lock_sessions()?
            .insert(session.id, Arc::new(tokio::sync::Mutex::new(session)));
        tracing::info!(session_id = %snapshot.id, "Session started");
        Ok(snapshot)
    }

    /// Submit user text to a session.
    pub async fn submit_text(&self, session_id: Uuid, text: &str) -> Result<TurnOutcome, ChatError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        self.controller.handle_text(&mut session, text).await
    }

    /// Submit an image to a session.
    pub async fn submit_image(
        &self,
        session_id: Uuid,
        image_bytes: &[u8],
    ) -> Result<ImageReply, ChatError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        self.controller.handle_image(&mut session, image_bytes).await
    }

    /// Reset a session to its initial state with a single greeting turn.
    pub async fn reset_session(&self, session_id: Uuid) -> Result<ConversationSession, ChatError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        self.controller.reset(&mut session);
        Ok(session.clone())
    }

    /// Snapshot of a session.
    pub async fn session(&self, session_id: Uuid) -> Result<ConversationSession, ChatError> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Discard a session.
    pub fn end_session(&self, session_id: Uuid) -> Result<(), ChatError> {
        match self.lock_sessions()?.remove(&session_id) {
            Some(_) => {
                tracing::info!(session_id = %session_id, "Session ended");
                Ok(())
            }
            None => Err(ChatError::SessionNotFound(session_id)),
        }
    }

    /// Drop sessions idle for longer than the configured timeout.
    ///
    /// Sessions currently processing an input are never idle and are kept.
    pub fn prune_expired(&self) -> Result<usize, ChatError> {
        let timeout = self.session_timeout_minutes;
        let mut sessions = self.lock_sessions()?;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.is_expired(timeout),
            Err(_) => true,
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, remaining = sessions.len(), "Pruned expired sessions");
        }
        Ok(pruned)
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, session_id: Uuid) -> Result<SessionHandle, ChatError> {
        self.lock_sessions()?
            .get(&session_id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(session_id))
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, SessionHandle>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::LockPoisoned(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_core::config::DialogueConfig;
    use formpilot_core::types::Stage;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(DialogueController::rule_based(DialogueConfig::default()), 30)
    }

    #[tokio::test]
    async fn test_start_and_snapshot() {
        let reg = registry();
        let s = reg.start_session().unwrap();
        assert!(s.transcript().is_empty());
        assert_eq!(reg.len(), 1);

        let snap = reg.session(s.id).await.unwrap();
        assert_eq!(snap.id, s.id);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let reg = registry();
        let id = Uuid::new_v4();
        assert!(matches!(
            reg.submit_text(id, "hi").await,
            Err(ChatError::SessionNotFound(_))
        ));
        assert!(matches!(reg.end_session(id), Err(ChatError::SessionNotFound(_))));
        assert!(matches!(reg.reset_session(id).await, Err(ChatError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let reg = registry();
        let a = reg.start_session().unwrap().id;
        let b = reg.start_session().unwrap().id;

        reg.submit_text(a, "renew my license").await.unwrap();
        let sb = reg.session(b).await.unwrap();
        assert_eq!(sb.stage, Stage::ServiceSelection);
        assert!(sb.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_reset_keeps_id() {
        let reg = registry();
        let id = reg.start_session().unwrap().id;
        reg.submit_text(id, "2").await.unwrap();
        let fresh = reg.reset_session(id).await.unwrap();
        assert_eq!(fresh.id, id);
        assert_eq!(fresh.stage, Stage::ServiceSelection);
        assert_eq!(fresh.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_end_session() {
        let reg = registry();
        let id = reg.start_session().unwrap().id;
        reg.end_session(id).unwrap();
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let reg = SessionRegistry::new(DialogueController::rule_based(DialogueConfig::default()), 1);
        let id = reg.start_session().unwrap().id;
        {
            let handle = reg.handle(id).unwrap();
            handle.lock().await.last_activity -= 300;
        }
        let fresh = reg.start_session().unwrap().id;

        assert_eq!(reg.prune_expired().unwrap(), 1);
        assert!(reg.session(fresh).await.is_ok());
        assert!(reg.session(id).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_inputs_to_one_session_are_serialized() {
        let reg = Arc::new(registry());
        let id = reg.start_session().unwrap().id;

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let reg = Arc::clone(&reg);
            tasks.push(tokio::spawn(async move {
                reg.submit_text(id, "hello").await.unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let s = reg.session(id).await.unwrap();
        assert_eq!(s.transcript().len(), 20);
        for pair in s.transcript().chunks(2) {
            assert_eq!(pair[0].role, formpilot_core::types::Role::User);
            assert_eq!(pair[1].role, formpilot_core::types::Role::Assistant);
        }
    }
}
