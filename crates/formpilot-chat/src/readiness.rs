//! Document-readiness detection.
//!
//! A reply counts as "ready" only when it contains both a confirmation term
//! and a document-reference term. Either family alone is not enough.

use std::sync::LazyLock;

use regex::Regex;

static CONFIRMATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)yes|have|got|ready|all set|prepared|collected|gathered")
        .expect("Invalid confirmation regex")
});

static DOCUMENT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)documents|papers|everything|requirements|docs")
        .expect("Invalid document-reference regex")
});

/// Whether the text claims the user has the required documents.
pub fn indicates_ready(text: &str) -> bool {
    CONFIRMATION.is_match(text) && DOCUMENT_REFERENCE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_with_documents() {
        assert!(indicates_ready("Yes, I have all the documents ready"));
        assert!(indicates_ready("Yes, I have all the documents"));
        assert!(indicates_ready("got everything"));
        assert!(indicates_ready("I've GATHERED the papers"));
        assert!(indicates_ready("all set with the docs"));
    }

    #[test]
    fn test_neither_family() {
        assert!(!indicates_ready("I'm not sure"));
        assert!(!indicates_ready(""));
    }

    #[test]
    fn test_document_reference_only() {
        assert!(!indicates_ready("What documents do I need?"));
    }

    #[test]
    fn test_confirmation_only() {
        assert!(!indicates_ready("I have a car"));
        assert!(!indicates_ready("yes"));
    }
}
