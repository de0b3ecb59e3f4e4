//! Conversational intent resolution and requirement verification.
//!
//! Maps free-form text or form photos to a known service, walks the user
//! through the required documents, and decides when they are ready to book.

pub mod catalog;
pub mod classifier;
pub mod controller;
pub mod error;
pub mod readiness;
pub mod registry;
pub mod response;
pub mod session;

pub use catalog::ServiceCatalog;
pub use classifier::{IntentClassifier, IntentMatch, MatchSource};
pub use controller::{
    DialogueController, ImageOutcome, ImageReply, ReplySource, TurnOutcome, IMAGE_UPLOAD_TURN,
};
pub use error::ChatError;
pub use readiness::indicates_ready;
pub use registry::SessionRegistry;
pub use session::ConversationSession;
