//! Rule-based intent classifier.
//!
//! Maps free-form text to a service identifier in two stages:
//!
//! 1. **Keyword rules**, evaluated in order. Each rule has a trigger family
//!    and a category guard family. The first rule whose trigger fires owns
//!    this stage: it resolves when its guard also matches, otherwise the
//!    stage yields nothing and later keyword rules are not consulted.
//! 2. **Ordinal shorthand**, evaluated in catalog display order: a menu
//!    digit anywhere in the text, or a short phrase.
//!
//! All matching is case-insensitive substring matching.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use formpilot_core::types::ServiceId;

use crate::catalog::ServiceCatalog;

// =============================================================================
// Rule table (compiled once, reused across calls)
// =============================================================================

struct KeywordRule {
    name: &'static str,
    service: ServiceId,
    trigger: Regex,
    guard: Regex,
}

/// One menu position: the digit shown in the greeting and its service.
#[derive(Debug, Clone)]
struct MenuEntry {
    digit: String,
    service: ServiceId,
}

fn family(words: &[&str]) -> Regex {
    let alts: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!("(?i){}", alts.join("|"))).expect("Invalid keyword family")
}

static KEYWORD_RULES: LazyLock<Vec<KeywordRule>> = LazyLock::new(|| {
    vec![
        KeywordRule {
            name: "renewal",
            service: ServiceId::RenewLicense,
            trigger: family(&["renew", "renewal", "expir"]),
            guard: family(&["license", "driver"]),
        },
        KeywordRule {
            name: "first_license",
            service: ServiceId::NewLicense,
            trigger: family(&["first", "new", "learner", "permit"]),
            guard: family(&["license", "driver"]),
        },
        KeywordRule {
            name: "registration",
            service: ServiceId::RegisterVehicle,
            trigger: family(&["register", "registration"]),
            guard: family(&["vehicle", "car"]),
        },
        KeywordRule {
            name: "title_transfer",
            service: ServiceId::TransferTitle,
            trigger: family(&["transfer", "title", "sell", "buy"]),
            guard: family(&["vehicle", "car", "title"]),
        },
    ]
});

/// Shorthand phrase accepted for each service.
fn shorthand_phrase(service: ServiceId) -> &'static str {
    match service {
        ServiceId::RenewLicense => "renew driver",
        ServiceId::NewLicense => "first driver",
        ServiceId::RegisterVehicle => "register vehicle",
        ServiceId::TransferTitle => "transfer",
    }
}

// =============================================================================
// IntentClassifier
// =============================================================================

/// Which stage produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// A keyword rule, named by the rule.
    Keyword(&'static str),
    /// A menu digit.
    Ordinal,
    /// A shorthand phrase such as "register vehicle".
    Phrase,
}

/// A resolved intent together with how it was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntentMatch {
    pub service: ServiceId,
    pub source: MatchSource,
}

/// Deterministic text-to-service classifier.
///
/// Menu digits follow the order of the catalog the classifier was built
/// for, so "1" always means the first entry of the greeting menu.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    /// Accept a menu digit only when it is the entire trimmed input.
    pub strict_ordinal_shorthand: bool,
    menu: Vec<MenuEntry>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(false)
    }
}

impl IntentClassifier {
    /// Classifier for the standard catalog order.
    pub fn new(strict_ordinal_shorthand: bool) -> Self {
        Self::with_menu(ServiceId::ALL.iter().copied(), strict_ordinal_shorthand)
    }

    /// Classifier whose menu digits follow `catalog` display order.
    pub fn for_catalog(catalog: &ServiceCatalog, strict_ordinal_shorthand: bool) -> Self {
        Self::with_menu(catalog.iter().map(|d| d.id), strict_ordinal_shorthand)
    }

    fn with_menu(services: impl Iterator<Item = ServiceId>, strict_ordinal_shorthand: bool) -> Self {
        // Single-digit shorthand only covers the first nine entries.
        let menu = services
            .take(9)
            .enumerate()
            .map(|(idx, service)| MenuEntry {
                digit: (idx + 1).to_string(),
                service,
            })
            .collect();
        Self {
            strict_ordinal_shorthand,
            menu,
        }
    }

    /// Classify text into a service identifier, or `None` when no rule
    /// matches.
    pub fn classify(&self, text: &str) -> Option<ServiceId> {
        self.classify_detailed(text).map(|m| m.service)
    }

    /// Classify text and report which rule matched.
    pub fn classify_detailed(&self, text: &str) -> Option<IntentMatch> {
        self.match_keywords(text)
            .or_else(|| self.match_shorthand(text))
    }

    fn match_keywords(&self, text: &str) -> Option<IntentMatch> {
        let rule = KEYWORD_RULES.iter().find(|r| r.trigger.is_match(text))?;
        if rule.guard.is_match(text) {
            Some(IntentMatch {
                service: rule.service,
                source: MatchSource::Keyword(rule.name),
            })
        } else {
            tracing::trace!(rule = rule.name, "Keyword trigger fired without category guard");
            None
        }
    }

    fn match_shorthand(&self, text: &str) -> Option<IntentMatch> {
        let lower = text.to_lowercase();
        let trimmed = text.trim();

        self.menu.iter().find_map(|entry| {
            let digit_hit = if self.strict_ordinal_shorthand {
                trimmed == entry.digit
            } else {
                text.contains(entry.digit.as_str())
            };
            if digit_hit {
                Some(IntentMatch {
                    service: entry.service,
                    source: MatchSource::Ordinal,
                })
            } else if lower.contains(shorthand_phrase(entry.service)) {
                Some(IntentMatch {
                    service: entry.service,
                    source: MatchSource::Phrase,
                })
            } else {
                None
            }
        })
    }
}
