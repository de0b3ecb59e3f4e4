//! Assistant message composition.
//!
//! Builds every rule-based reply from catalog data, without requiring a
//! language model.

use formpilot_core::types::{ImagePrediction, ServiceDefinition};
use formpilot_llm::LlmError;
use formpilot_vision::VisionError;

use crate::catalog::ServiceCatalog;

/// Initial greeting with a numbered service menu in display order.
pub fn greeting(catalog: &ServiceCatalog) -> String {
    let mut text = String::from(
        "Welcome! I'm here to help you prepare for your DMV visit. \
         What brings you in today?\n\nHere are the most common services:\n\n",
    );
    for (idx, def) in catalog.iter().enumerate() {
        text.push_str(&format!("{}. **{}**\n", idx + 1, def.name));
    }
    text.push_str("\nPlease select an option or tell me what you need help with.");
    text
}

/// Requirements list for a newly selected service, ending with the
/// readiness question.
pub fn requirements(def: &ServiceDefinition) -> String {
    let mut text = format!(
        "Great! You want to **{}**.\n\n**Required Documents:**\n",
        def.name
    );
    push_numbered(&mut text, &def.requirements);
    push_visit_facts(&mut text, def);
    text.push_str(
        "\n**Do you have all these documents ready?** Let me know if you have \
         everything or if you need help obtaining any of them.",
    );
    text
}

/// Requirements list introduced by an image classification.
pub fn image_requirements(def: &ServiceDefinition, prediction: &ImagePrediction) -> String {
    format!(
        "This looks like a form for **{}** ({:.0}% confidence).\n\n{}",
        def.name,
        prediction.confidence * 100.0,
        requirements(def)
    )
}

/// Requirements list for an accepted low-confidence image classification.
pub fn low_confidence_requirements(def: &ServiceDefinition, prediction: &ImagePrediction) -> String {
    format!(
        "I'm not very confident, but this looks like a form for **{}** ({:.0}% confidence). \
         If that's wrong, just tell me which service you need.\n\n{}",
        def.name,
        prediction.confidence * 100.0,
        requirements(def)
    )
}

/// Ask for a text description instead of accepting a weak image match.
pub fn low_confidence_reprompt(prediction: &ImagePrediction) -> String {
    format!(
        "I couldn't identify this form with enough confidence ({:.0}%). \
         Could you tell me which service you need?",
        prediction.confidence * 100.0
    )
}

/// Predicted category is not a known service.
pub fn unrecognized_category(category: &str) -> String {
    format!(
        "I could not match this form (recognized as \"{}\") to one of the services I support. \
         Please describe what you need or choose an option from the menu.",
        category
    )
}

/// Completion message with next steps for the selected service.
pub fn completion(def: &ServiceDefinition) -> String {
    let mut text = format!(
        "Excellent! You're all set for **{}**.\n\nAll required documents verified. \
         Ready for your DMV visit.\n\n**Next Steps:**\n",
        def.name
    );
    push_numbered(&mut text, &def.steps);
    push_visit_facts(&mut text, def);

    if !def.links.is_empty() {
        text.push_str("\n**Useful Links:**\n");
        for link in &def.links {
            text.push_str(&format!("- [{}]({})\n", link.label, link.url));
        }
    }
    if let Some(ref note) = def.note {
        text.push_str(&format!("\n**Note:** {}\n", note));
    }

    text.push_str("\nIs there anything else you'd like to know about your visit?");
    text
}

/// No service could be determined from the text.
pub fn clarification() -> String {
    "I couldn't determine which service you need. You can pick a number from the menu \
     (1-4) or describe it, for example \"renew my driver's license\" or \"register my car\"."
        .to_string()
}

/// The user has not confirmed the documents yet.
pub fn missing_documents(def: &ServiceDefinition) -> String {
    let mut text = format!(
        "No problem. Which of these documents for **{}** are you missing?\n\n",
        def.name
    );
    push_numbered(&mut text, &def.requirements);
    text.push_str("\nOnce you have everything, just tell me you have all the documents.");
    text
}

/// Generic reply after the flow is complete.
pub fn closing(def: &ServiceDefinition) -> String {
    format!(
        "You're ready to book your appointment for **{}**. \
         Start over any time if you need help with another service.",
        def.name
    )
}

/// Notice shown when the language model could not answer.
///
/// Setup problems (disabled, missing credentials) and runtime failures
/// (timeout, network, provider errors) get different wording.
pub fn language_model_notice(err: &LlmError) -> String {
    if err.is_unavailable() {
        "The live assistant is not available right now, so I'll stick to the guided options."
            .to_string()
    } else {
        "I apologize, but I'm having trouble reaching the live assistant service at the moment."
            .to_string()
    }
}

/// Message shown when an uploaded image could not be classified.
pub fn image_failure(err: &VisionError) -> String {
    match err {
        VisionError::ModelNotFound(path) => format!(
            "Image recognition is not set up: the form classifier model was not found at `{}`. \
             Please train or install the model first, or describe the service you need.",
            path
        ),
        VisionError::Misconfigured(detail) => format!(
            "Image recognition is not set up correctly ({}). \
             Please describe the service you need instead.",
            detail
        ),
        VisionError::Disabled | VisionError::FeatureDisabled => {
            "Image recognition is not available in this installation. \
             Please describe the service you need instead."
                .to_string()
        }
        other => format!(
            "Sorry, I couldn't classify that image ({}). \
             Please try another photo or describe the service you need.",
            other
        ),
    }
}

fn push_numbered(text: &mut String, items: &[String]) {
    for (idx, item) in items.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", idx + 1, item));
    }
}

/// Agency, wait time and fee, when the service lists them.
fn push_visit_facts(text: &mut String, def: &ServiceDefinition) {
    let facts = [
        ("Agency", &def.agency),
        ("Estimated Wait", &def.estimated_wait),
        ("Fee", &def.fee),
    ];
    if facts.iter().all(|(_, value)| value.is_none()) {
        return;
    }
    text.push('\n');
    for (label, value) in facts {
        if let Some(value) = value {
            text.push_str(&format!("**{}:** {}\n", label, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_core::types::ServiceId;

    fn renew() -> ServiceDefinition {
        ServiceCatalog::standard()
            .get(ServiceId::RenewLicense)
            .unwrap()
            .clone()
    }

    #[test]
    fn test_greeting_lists_services_in_order() {
        let text = greeting(&ServiceCatalog::standard());
        let first = text.find("1. **Renew Driver's License**").unwrap();
        let fourth = text.find("4. **Transfer Vehicle Title**").unwrap();
        assert!(first < fourth);
    }

    #[test]
    fn test_requirements_numbered_and_ask() {
        let text = requirements(&renew());
        assert!(text.contains("**Renew Driver's License**"));
        assert!(text.contains("1. Current driver's license"));
        assert!(text.contains("4. Two proofs of Florida residential address"));
        assert!(text.contains("Do you have all these documents ready?"));
    }

    #[test]
    fn test_completion_includes_steps_links_and_note() {
        let def = renew();
        let text = completion(&def);
        assert!(text.contains("You're all set"));
        assert!(text.contains(&def.steps[0]));
        assert!(text.contains("https://mydmvportal.flhsmv.gov/"));
        assert!(text.contains(def.note.as_deref().unwrap()));
    }

    #[test]
    fn test_completion_and_requirements_include_agency_wait_and_fee() {
        for def in ServiceCatalog::standard().iter() {
            let agency = def.agency.as_deref().unwrap();
            let wait = def.estimated_wait.as_deref().unwrap();
            let fee = def.fee.as_deref().unwrap();

            let done = completion(def);
            assert!(done.contains(&format!("**Agency:** {}", agency)));
            assert!(done.contains(&format!("**Estimated Wait:** {}", wait)));
            assert!(done.contains(&format!("**Fee:** {}", fee)));

            assert!(requirements(def).contains(&format!("**Fee:** {}", fee)));
        }
    }

    #[test]
    fn test_visit_facts_omitted_when_absent() {
        let mut def = renew();
        def.agency = None;
        def.estimated_wait = None;
        def.fee = None;
        let text = completion(&def);
        assert!(!text.contains("**Agency:**"));
        assert!(!text.contains("**Fee:**"));
    }

    #[test]
    fn test_language_model_notice_distinguishes_categories() {
        let unavailable = language_model_notice(&LlmError::MissingCredentials("K".into()));
        let runtime = language_model_notice(&LlmError::Timeout(30));
        assert_ne!(unavailable, runtime);
        assert!(!unavailable.is_empty() && !runtime.is_empty());
    }

    #[test]
    fn test_image_failure_model_missing_is_actionable() {
        let text = image_failure(&VisionError::ModelNotFound("forms.onnx".into()));
        assert!(text.contains("forms.onnx"));
        assert!(text.contains("not set up"));

        let setup = image_failure(&VisionError::Misconfigured("no class labels configured".into()));
        assert!(setup.contains("not set up correctly"));
        assert!(!setup.contains("couldn't classify"));

        let generic = image_failure(&VisionError::Inference("shape mismatch".into()));
        assert!(generic.contains("shape mismatch"));
    }

    #[test]
    fn test_image_requirements_shows_confidence() {
        let labels = vec!["renew_license".to_string(), "new_license".to_string()];
        let pred = ImagePrediction::from_probabilities(&labels, &[0.87, 0.13]).unwrap();
        let text = image_requirements(&renew(), &pred);
        assert!(text.contains("87% confidence"));
        assert!(text.contains("Required Documents"));
    }
}
