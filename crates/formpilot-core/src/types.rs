//! Core domain types shared across all FormPilot crates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormPilotError;

// =============================================================================
// Service identifiers and definitions
// =============================================================================

/// Stable key naming one bureaucratic service the assistant knows about.
///
/// Variant order is the catalog display order; ordinal shorthand ("1".."4")
/// maps onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    RenewLicense,
    NewLicense,
    RegisterVehicle,
    TransferTitle,
}

impl ServiceId {
    /// All identifiers in display order.
    pub const ALL: [ServiceId; 4] = [
        ServiceId::RenewLicense,
        ServiceId::NewLicense,
        ServiceId::RegisterVehicle,
        ServiceId::TransferTitle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::RenewLicense => "renew_license",
            ServiceId::NewLicense => "new_license",
            ServiceId::RegisterVehicle => "register_vehicle",
            ServiceId::TransferTitle => "transfer_title",
        }
    }

    /// 1-based position in the display order.
    pub fn ordinal(&self) -> usize {
        Self::ALL
            .iter()
            .position(|id| id == self)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    /// Look up an identifier by its 1-based display position.
    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        ordinal
            .checked_sub(1)
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceId {
    type Err = FormPilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| FormPilotError::UnknownService(s.to_string()))
    }
}

/// A labeled reference link attached to a service (form PDF, portal, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub label: String,
    pub url: String,
}

/// Everything the assistant knows about one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: ServiceId,
    /// Display name, e.g. "Renew Driver's License".
    pub name: String,
    pub description: String,
    /// Required documents, in the order they are presented to the user.
    pub requirements: Vec<String>,
    /// Procedural steps to follow once documents are ready.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<ReferenceLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Office that handles the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    /// Typical processing or queue time, free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
}

// =============================================================================
// Conversation types
// =============================================================================

/// Who authored a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Epoch seconds at insertion.
    pub created_at: i64,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Node of the conversation state machine.
///
/// ```text
/// ServiceSelection -> DocumentCheck -> ReadyToBook
///        ^_______________ reset ______________|
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    ServiceSelection,
    DocumentCheck,
    ReadyToBook,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ServiceSelection => write!(f, "service_selection"),
            Stage::DocumentCheck => write!(f, "document_check"),
            Stage::ReadyToBook => write!(f, "ready_to_book"),
        }
    }
}

// =============================================================================
// Image classification
// =============================================================================

/// Result of classifying an uploaded form image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrediction {
    /// Highest-probability category label.
    pub category: String,
    /// Probability of `category` (0.0 to 1.0).
    pub confidence: f32,
    /// Probability for every known category.
    pub distribution: BTreeMap<String, f32>,
}

impl ImagePrediction {
    /// Build a prediction from parallel label/probability slices.
    ///
    /// Returns `None` when the slices are empty or of different lengths.
    pub fn from_probabilities(labels: &[String], probabilities: &[f32]) -> Option<Self> {
        if labels.is_empty() || labels.len() != probabilities.len() {
            return None;
        }

        let (best_idx, best_prob) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |acc, (idx, p)| if p > acc.1 { (idx, p) } else { acc });

        let distribution = labels
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Some(Self {
            category: labels[best_idx].clone(),
            confidence: best_prob,
            distribution,
        })
    }

    /// Whether the distribution sums to 1.0 within `tolerance`.
    pub fn is_normalized(&self, tolerance: f32) -> bool {
        let total: f32 = self.distribution.values().sum();
        (total - 1.0).abs() <= tolerance
    }

    /// Distribution entries sorted by descending probability.
    pub fn ranked(&self) -> Vec<(&str, f32)> {
        let mut entries: Vec<(&str, f32)> = self
            .distribution
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_roundtrip_str() {
        for id in ServiceId::ALL {
            let parsed: ServiceId = id.as_str().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn test_service_id_unknown() {
        let err = "passport_renewal".parse::<ServiceId>().unwrap_err();
        assert!(matches!(err, FormPilotError::UnknownService(_)));
    }

    #[test]
    fn test_service_id_ordinals() {
        assert_eq!(ServiceId::RenewLicense.ordinal(), 1);
        assert_eq!(ServiceId::TransferTitle.ordinal(), 4);
        assert_eq!(ServiceId::from_ordinal(2), Some(ServiceId::NewLicense));
        assert_eq!(ServiceId::from_ordinal(0), None);
        assert_eq!(ServiceId::from_ordinal(5), None);
    }

    #[test]
    fn test_service_id_serde() {
        let json = serde_json::to_string(&ServiceId::RegisterVehicle).unwrap();
        assert_eq!(json, "\"register_vehicle\"");
        let back: ServiceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ServiceId::RegisterVehicle);
    }

    #[test]
    fn test_stage_default_and_display() {
        assert_eq!(Stage::default(), Stage::ServiceSelection);
        assert_eq!(Stage::ReadyToBook.to_string(), "ready_to_book");
    }

    #[test]
    fn test_turn_constructors() {
        let u = Turn::user("hello");
        let a = Turn::assistant("hi");
        assert_eq!(u.role, Role::User);
        assert_eq!(a.role, Role::Assistant);
        assert_eq!(u.content, "hello");
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_prediction_from_probabilities() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let pred = ImagePrediction::from_probabilities(&labels, &[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(pred.category, "b");
        assert!((pred.confidence - 0.7).abs() < 1e-6);
        assert!(pred.is_normalized(1e-4));
        assert_eq!(pred.ranked()[0].0, "b");
        assert_eq!(pred.ranked()[2].0, "a");
    }

    #[test]
    fn test_prediction_mismatched_lengths() {
        let labels = vec!["a".to_string()];
        assert!(ImagePrediction::from_probabilities(&labels, &[0.5, 0.5]).is_none());
        assert!(ImagePrediction::from_probabilities(&[], &[]).is_none());
    }

    #[test]
    fn test_prediction_not_normalized() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let pred = ImagePrediction::from_probabilities(&labels, &[0.9, 0.9]).unwrap();
        assert!(!pred.is_normalized(0.01));
    }
}
