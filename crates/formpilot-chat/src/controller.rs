//! Dialogue controller: the conversation state machine.
//!
//! ```text
//! ServiceSelection --(intent resolved)--> DocumentCheck --(ready)--> ReadyToBook
//!        ^                                      ^
//!        |                                      +--(image classified)
//!        +------------------ reset ---------------------------------+
//! ```
//!
//! Every input appends the user turn and then the assistant turn before
//! returning. Adapter failures become assistant text and never change the
//! transition taken.

use serde::Serialize;

use formpilot_core::config::{DialogueConfig, FormPilotConfig, VisionConfig};
use formpilot_core::types::{ImagePrediction, ServiceDefinition, ServiceId, Stage, Turn};
use formpilot_llm::{CompletionRequest, LanguageModelAdapter};
use formpilot_vision::ImageClassifierAdapter;

use crate::catalog::ServiceCatalog;
use crate::classifier::{IntentClassifier, IntentMatch};
use crate::error::ChatError;
use crate::readiness::indicates_ready;
use crate::response;
use crate::session::ConversationSession;

/// Transcript text recorded for an image submission.
pub const IMAGE_UPLOAD_TURN: &str = "[uploaded form image]";

const ASSISTANT_ROLE: &str = "You are a helpful Florida DMV assistant. You help users understand \
     what documents they need for various DMV services.";

const ASSISTANT_GUIDANCE: &str = "Be friendly, clear, and concise. If the user mentions having \
     documents, verify they have all required documents for their selected service. If they have \
     all documents, confirm they're ready to book an appointment.";

// =============================================================================
// Outcomes
// =============================================================================

/// Where the assistant text of a turn came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// Composed from the catalog by the rule engine.
    Rules,
    /// Answered by the language model.
    LanguageModel,
    /// Language model failed; notice plus rule-based text.
    Fallback,
}

/// Result of one text input.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// The user and assistant turns appended by this input.
    pub turns: Vec<Turn>,
    pub stage: Stage,
    pub selected_service: Option<ServiceId>,
    /// Set when this input resolved a service.
    pub matched: Option<IntentMatch>,
    pub source: ReplySource,
}

impl TurnOutcome {
    /// The assistant's reply text.
    pub fn reply(&self) -> &str {
        self.turns.last().map(|t| t.content.as_str()).unwrap_or_default()
    }
}

/// How an image submission was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOutcome {
    /// Category resolved to a service; document check entered.
    Classified { low_confidence: bool },
    /// Confidence below the cutoff with re-prompting enabled; stage kept.
    LowConfidenceReprompt,
    /// Category is not a catalog identifier; stage kept.
    Unrecognized,
    /// No model artifact available.
    ModelMissing,
    /// Any other classification failure.
    Failed,
}

/// Result of one image input.
#[derive(Debug, Clone, Serialize)]
pub struct ImageReply {
    pub turns: Vec<Turn>,
    pub stage: Stage,
    pub selected_service: Option<ServiceId>,
    pub prediction: Option<ImagePrediction>,
    pub outcome: ImageOutcome,
}

/// What a text input will do, decided before the session is touched.
enum TextStep<'a> {
    Select(IntentMatch, &'a ServiceDefinition),
    Ready(&'a ServiceDefinition),
    /// Selected service is no longer in the catalog.
    Restart,
    Reply(String, ReplySource),
}

// =============================================================================
// DialogueController
// =============================================================================

/// Drives a [`ConversationSession`] through the state machine.
///
/// Holds no per-session state; sessions are passed in by reference.
#[derive(Debug, Clone)]
pub struct DialogueController {
    catalog: ServiceCatalog,
    classifier: IntentClassifier,
    language_model: LanguageModelAdapter,
    image_classifier: ImageClassifierAdapter,
    dialogue: DialogueConfig,
    min_confidence: f32,
    reprompt_below_threshold: bool,
}

impl DialogueController {
    pub fn new(
        catalog: ServiceCatalog,
        language_model: LanguageModelAdapter,
        image_classifier: ImageClassifierAdapter,
        dialogue: DialogueConfig,
        vision: &VisionConfig,
    ) -> Self {
        let classifier = IntentClassifier::for_catalog(&catalog, dialogue.strict_ordinal_shorthand);
        Self {
            catalog,
            classifier,
            language_model,
            image_classifier,
            dialogue,
            min_confidence: vision.min_confidence,
            reprompt_below_threshold: vision.reprompt_below_threshold,
        }
    }

    /// Build the controller and both adapters from configuration.
    pub fn from_config(config: &FormPilotConfig) -> Self {
        Self::new(
            ServiceCatalog::standard(),
            LanguageModelAdapter::from_config(&config.llm),
            ImageClassifierAdapter::from_config(&config.vision),
            config.dialogue.clone(),
            &config.vision,
        )
    }

    /// Rule-only controller with both adapters disabled.
    pub fn rule_based(dialogue: DialogueConfig) -> Self {
        Self::new(
            ServiceCatalog::standard(),
            LanguageModelAdapter::Disabled,
            ImageClassifierAdapter::Disabled,
            dialogue,
            &VisionConfig::default(),
        )
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn greeting(&self) -> String {
        response::greeting(&self.catalog)
    }

    /// Reinitialize the session and seed the greeting.
    pub fn reset(&self, session: &mut ConversationSession) {
        session.reset(&self.greeting());
        tracing::debug!(session_id = %session.id, "Session reset");
    }

    /// Process one text input.
    pub async fn handle_text(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<TurnOutcome, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.dialogue.max_message_length {
            return Err(ChatError::MessageTooLong(self.dialogue.max_message_length));
        }

        tracing::debug!(session_id = %session.id, stage = ?session.stage, text = %text, "Handling text input");

        let step = self.decide_text(session, text).await;

        // No await from here on: the user turn, the transition and the
        // assistant turn land together or not at all.
        session.push_user(text);
        let mut matched = None;
        let (reply, source) = match step {
            TextStep::Select(m, def) => {
                session.select_service(m.service);
                matched = Some(m);
                tracing::info!(session_id = %session.id, service = %m.service, "Service selected");
                (response::requirements(def), ReplySource::Rules)
            }
            TextStep::Ready(def) => {
                if session.mark_ready() {
                    tracing::info!(session_id = %session.id, service = %def.id, "Documents confirmed");
                    (response::completion(def), ReplySource::Rules)
                } else {
                    (response::missing_documents(def), ReplySource::Rules)
                }
            }
            TextStep::Restart => {
                tracing::warn!(session_id = %session.id, stage = ?session.stage, "Selected service missing from catalog");
                session.selected_service = None;
                session.ready = false;
                session.stage = Stage::ServiceSelection;
                (response::clarification(), ReplySource::Rules)
            }
            TextStep::Reply(reply, source) => (reply, source),
        };

        session.push_assistant(reply);
        debug_assert!(session.check_invariants());

        tracing::debug!(session_id = %session.id, stage = ?session.stage, source = ?source, "Text input handled");

        Ok(TurnOutcome {
            turns: session.tail(2).to_vec(),
            stage: session.stage,
            selected_service: session.selected_service,
            matched,
            source,
        })
    }

    /// Process one image input.
    pub async fn handle_image(
        &self,
        session: &mut ConversationSession,
        image_bytes: &[u8],
    ) -> Result<ImageReply, ChatError> {
        if image_bytes.is_empty() {
            return Err(ChatError::EmptyImage);
        }

        tracing::debug!(session_id = %session.id, bytes = image_bytes.len(), "Handling image input");

        let classified = self.image_classifier.classify(image_bytes).await;

        session.push_user(IMAGE_UPLOAD_TURN);
        let (reply, outcome, prediction) = match classified {
            Ok(prediction) => {
                session.last_prediction = Some(prediction.clone());
                let (reply, outcome) = self.apply_prediction(session, &prediction);
                (reply, outcome, Some(prediction))
            }
            Err(e) => {
                let outcome = if e.is_model_missing() {
                    ImageOutcome::ModelMissing
                } else {
                    ImageOutcome::Failed
                };
                tracing::warn!(session_id = %session.id, error = %e, "Image classification failed");
                (response::image_failure(&e), outcome, None)
            }
        };

        session.push_assistant(reply);
        debug_assert!(session.check_invariants());

        Ok(ImageReply {
            turns: session.tail(2).to_vec(),
            stage: session.stage,
            selected_service: session.selected_service,
            prediction,
            outcome,
        })
    }

    fn apply_prediction(
        &self,
        session: &mut ConversationSession,
        prediction: &ImagePrediction,
    ) -> (String, ImageOutcome) {
        let def = prediction
            .category
            .parse::<ServiceId>()
            .ok()
            .and_then(|id| self.catalog.get(id));

        let Some(def) = def else {
            tracing::info!(session_id = %session.id, category = %prediction.category, "Predicted category not in catalog");
            return (
                response::unrecognized_category(&prediction.category),
                ImageOutcome::Unrecognized,
            );
        };

        let low_confidence = prediction.confidence < self.min_confidence;
        if low_confidence && self.reprompt_below_threshold {
            tracing::info!(
                session_id = %session.id,
                confidence = prediction.confidence,
                cutoff = self.min_confidence,
                "Low-confidence prediction, asking for text"
            );
            return (
                response::low_confidence_reprompt(prediction),
                ImageOutcome::LowConfidenceReprompt,
            );
        }

        session.select_service(def.id);
        tracing::info!(
            session_id = %session.id,
            service = %def.id,
            confidence = prediction.confidence,
            "Service selected from image"
        );

        let reply = if low_confidence {
            response::low_confidence_requirements(def, prediction)
        } else {
            response::image_requirements(def, prediction)
        };
        (reply, ImageOutcome::Classified { low_confidence })
    }

    /// Run the transition table for `text` against a read-only session,
    /// including any language-model call.
    async fn decide_text<'a>(&'a self, session: &ConversationSession, text: &str) -> TextStep<'a> {
        let history = session.user_history(self.dialogue.history_window);
        let selected = session.selected_service.and_then(|id| self.catalog.get(id));

        let (context, fallback) = match (session.stage, selected) {
            (Stage::ServiceSelection, _) => match self.resolve(text) {
                Some((m, def)) => return TextStep::Select(m, def),
                None => (
                    "User is selecting a DMV service".to_string(),
                    response::clarification(),
                ),
            },
            (Stage::DocumentCheck, Some(def)) => {
                if indicates_ready(text) {
                    return TextStep::Ready(def);
                }
                (
                    format!("User needs to verify documents for {}", def.name),
                    response::missing_documents(def),
                )
            }
            (Stage::ReadyToBook, Some(def)) => (
                format!("User is ready to book appointment for {}", def.name),
                response::closing(def),
            ),
            (_, None) => return TextStep::Restart,
        };

        let (reply, source) = self.delegate(text, history, context, fallback).await;
        TextStep::Reply(reply, source)
    }

    fn resolve(&self, text: &str) -> Option<(IntentMatch, &ServiceDefinition)> {
        let m = self.classifier.classify_detailed(text)?;
        self.catalog.get(m.service).map(|def| (m, def))
    }

    /// Ask the language model when one is configured, otherwise use the
    /// rule-based reply. A failure yields a notice followed by the
    /// rule-based reply.
    async fn delegate(
        &self,
        text: &str,
        history: Vec<String>,
        context: String,
        rule_reply: String,
    ) -> (String, ReplySource) {
        if !self.language_model.is_enabled() {
            return (rule_reply, ReplySource::Rules);
        }

        let request = CompletionRequest {
            system_prompt: self.system_prompt(&context),
            user_message: text.to_string(),
            history,
        };

        match self.language_model.complete(&request).await {
            Ok(answer) => (answer, ReplySource::LanguageModel),
            Err(e) => {
                tracing::warn!(error = %e, "Language model failed, using fallback reply");
                (
                    format!("{}\n\n{}", response::language_model_notice(&e), rule_reply),
                    ReplySource::Fallback,
                )
            }
        }
    }

    fn system_prompt(&self, context: &str) -> String {
        format!(
            "{}\n\nCurrent context: {}\n\nAvailable services and their requirements:\n{}\n\n{}",
            ASSISTANT_ROLE,
            context,
            self.catalog.to_json(),
            ASSISTANT_GUIDANCE
        )
    }
}
