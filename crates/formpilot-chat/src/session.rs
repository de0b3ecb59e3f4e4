//! Per-conversation state.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use formpilot_core::types::{ImagePrediction, Role, ServiceId, Stage, Turn};

/// One user's conversation: transcript plus resolved state.
///
/// The transcript is append-only; only [`ConversationSession::reset`]
/// clears it.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSession {
    pub id: Uuid,
    transcript: Vec<Turn>,
    pub selected_service: Option<ServiceId>,
    pub ready: bool,
    pub stage: Stage,
    pub last_prediction: Option<ImagePrediction>,
    /// Epoch seconds.
    pub started_at: i64,
    /// Epoch seconds of the last accepted input.
    pub last_activity: i64,
    /// Number of user turns since the current service was selected.
    #[serde(skip)]
    user_turns_since_selection: usize,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// A fresh session with an empty transcript.
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4(),
            transcript: Vec::new(),
            selected_service: None,
            ready: false,
            stage: Stage::ServiceSelection,
            last_prediction: None,
            started_at: now,
            last_activity: now,
            user_turns_since_selection: 0,
        }
    }

    /// Return to the initial state, keeping the session id, and seed the
    /// transcript with a single greeting turn.
    pub fn reset(&mut self, greeting: &str) {
        self.transcript.clear();
        self.transcript.push(Turn::assistant(greeting));
        self.selected_service = None;
        self.ready = false;
        self.stage = Stage::ServiceSelection;
        self.last_prediction = None;
        self.user_turns_since_selection = 0;
        self.touch();
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// The last `n` turns.
    pub fn tail(&self, n: usize) -> &[Turn] {
        let start = self.transcript.len().saturating_sub(n);
        &self.transcript[start..]
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.transcript.push(Turn::user(content));
        if self.selected_service.is_some() {
            self.user_turns_since_selection += 1;
        }
        self.touch();
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.transcript.push(Turn::assistant(content));
    }

    /// Record a resolved service and enter the document check.
    pub fn select_service(&mut self, service: ServiceId) {
        self.selected_service = Some(service);
        self.ready = false;
        self.user_turns_since_selection = 0;
        self.stage = Stage::DocumentCheck;
    }

    /// Mark documents confirmed and enter the terminal stage.
    ///
    /// Ignored unless a service is selected and at least one user turn
    /// arrived after the selection.
    pub fn mark_ready(&mut self) -> bool {
        if self.selected_service.is_none() || self.user_turns_since_selection == 0 {
            return false;
        }
        self.ready = true;
        self.stage = Stage::ReadyToBook;
        true
    }

    /// The most recent `limit` user messages, oldest first.
    pub fn user_history(&self, limit: usize) -> Vec<String> {
        let users: Vec<&Turn> = self
            .transcript
            .iter()
            .filter(|t| t.role == Role::User)
            .collect();
        let start = users.len().saturating_sub(limit);
        users[start..].iter().map(|t| t.content.clone()).collect()
    }

    pub fn is_expired(&self, timeout_minutes: u32) -> bool {
        let timeout_secs = i64::from(timeout_minutes) * 60;
        Utc::now().timestamp() - self.last_activity > timeout_secs
    }

    /// Whether the structural invariants hold.
    pub fn check_invariants(&self) -> bool {
        let ready_stage_ok = self.stage != Stage::ReadyToBook
            || (self.selected_service.is_some() && self.ready);
        let ready_flag_ok = !self.ready || self.user_turns_since_selection > 0;
        ready_stage_ok && ready_flag_ok
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now().timestamp();
    }
}
