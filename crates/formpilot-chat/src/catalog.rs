//! Service catalog: the fixed set of services the assistant can resolve.
//!
//! Entries are defined once and never mutated. Display order matches the
//! ordinal shorthand accepted by the intent classifier.

use std::collections::HashSet;
use std::sync::LazyLock;

use formpilot_core::types::{ReferenceLink, ServiceDefinition, ServiceId};

use crate::error::ChatError;

const DMV_PORTAL_URL: &str = "https://mydmvportal.flhsmv.gov/";

static STANDARD_CATALOG: LazyLock<ServiceCatalog> = LazyLock::new(|| ServiceCatalog {
    entries: ServiceId::ALL.iter().copied().map(standard_definition).collect(),
});

/// Read-only collection of service definitions keyed by identifier.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    entries: Vec<ServiceDefinition>,
}

impl ServiceCatalog {
    /// Build a catalog from explicit definitions, kept in the given order.
    ///
    /// Rejects duplicate identifiers.
    pub fn new(entries: Vec<ServiceDefinition>) -> Result<Self, ChatError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id) {
                return Err(ChatError::DuplicateService(entry.id.to_string()));
            }
        }
        Ok(Self { entries })
    }

    /// The built-in catalog of the four supported services.
    pub fn standard() -> Self {
        STANDARD_CATALOG.clone()
    }

    /// Look up a definition by its string identifier.
    pub fn lookup(&self, identifier: &str) -> Result<&ServiceDefinition, ChatError> {
        let id = identifier.trim();
        self.entries
            .iter()
            .find(|d| d.id.as_str() == id)
            .ok_or_else(|| ChatError::ServiceNotFound(identifier.to_string()))
    }

    pub fn get(&self, id: ServiceId) -> Option<&ServiceDefinition> {
        self.entries.iter().find(|d| d.id == id)
    }

    /// Set of valid identifiers.
    pub fn identifiers(&self) -> HashSet<ServiceId> {
        self.entries.iter().map(|d| d.id).collect()
    }

    /// Definitions in display order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ServiceDefinition> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Structured text of the whole catalog, for language-model prompts.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to serialize catalog");
            String::from("[]")
        })
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const FLHSMV_AGENCY: &str = "Florida Department of Highway Safety and Motor Vehicles (FLHSMV)";
const TAX_COLLECTOR_AGENCY: &str = "County Tax Collector Office (FLHSMV agent)";

fn portal_link() -> ReferenceLink {
    ReferenceLink {
        label: "MyDMV Portal".to_string(),
        url: DMV_PORTAL_URL.to_string(),
    }
}

fn standard_definition(id: ServiceId) -> ServiceDefinition {
    match id {
        ServiceId::RenewLicense => ServiceDefinition {
            id,
            name: "Renew Driver's License".to_string(),
            description: "Renew an expiring or expired driver's license".to_string(),
            requirements: strings(&[
                "Current driver's license (or expired within last 12 months)",
                "Proof of identity (passport, birth certificate, or permanent resident card)",
                "Proof of Social Security Number (SSN card, W-2, or paystub)",
                "Two proofs of Florida residential address (utility bill, bank statement, lease agreement)",
            ]),
            steps: strings(&[
                "Check whether your license is eligible for online renewal on the MyDMV Portal.",
                "Book an appointment if an in-office visit is required.",
                "Bring your documents and pay the renewal fee.",
                "Take a new photo and pass the vision test if requested.",
            ]),
            links: vec![portal_link()],
            note: Some("Licenses expired for more than 12 months may require retesting.".to_string()),
            agency: Some(FLHSMV_AGENCY.to_string()),
            estimated_wait: Some("Same day online; 30-60 minutes in office with an appointment".to_string()),
            fee: Some("$48 (Class E), plus office service fee where charged".to_string()),
        },
        ServiceId::NewLicense => ServiceDefinition {
            id,
            name: "Get First Driver's License".to_string(),
            description: "Apply for your first Florida driver's license".to_string(),
            requirements: strings(&[
                "Proof of identity (certified US birth certificate or valid US passport)",
                "Proof of Social Security Number",
                "Two proofs of Florida residential address",
                "Certificate of completion from Traffic Law & Substance Abuse Education course",
                "Passing score on written knowledge exam",
                "Passing score on driving skills test (if under 18, must hold learner's permit for 12 months)",
            ]),
            steps: strings(&[
                "Complete the Traffic Law & Substance Abuse Education course.",
                "Pass the written knowledge exam.",
                "Book a driving skills test appointment.",
                "Bring your documents and pay the license fee.",
            ]),
            links: vec![portal_link()],
            note: Some("Applicants under 18 need a parent or guardian consent form.".to_string()),
            agency: Some(FLHSMV_AGENCY.to_string()),
            estimated_wait: Some("Written and skills tests are booked separately; allow 1-3 weeks".to_string()),
            fee: Some("$48 (Class E), plus testing fees where charged".to_string()),
        },
        ServiceId::RegisterVehicle => ServiceDefinition {
            id,
            name: "Register a Vehicle".to_string(),
            description: "Register a new or used vehicle in Florida".to_string(),
            requirements: strings(&[
                "Proof of ownership (manufacturer's certificate of origin for new vehicles or title for used vehicles)",
                "Proof of Florida insurance",
                "Valid Florida driver's license or ID",
                "Vehicle Identification Number (VIN) verification",
                "Completed Application for Certificate of Title (Form HSMV 82040)",
                "Payment for registration fees and taxes",
            ]),
            steps: strings(&[
                "Have the VIN verified by a law enforcement officer, notary or dealer.",
                "Complete Form HSMV 82040.",
                "Visit a tax collector office with your documents.",
                "Pay registration fees and taxes and collect your plate.",
            ]),
            links: vec![portal_link()],
            note: Some("Vehicles coming from out of state must be registered within 10 days.".to_string()),
            agency: Some(TAX_COLLECTOR_AGENCY.to_string()),
            estimated_wait: Some("Same day at the tax collector office".to_string()),
            fee: Some("About $225 initial registration fee plus plate, title and county fees".to_string()),
        },
        ServiceId::TransferTitle => ServiceDefinition {
            id,
            name: "Transfer Vehicle Title".to_string(),
            description: "Transfer ownership of a vehicle".to_string(),
            requirements: strings(&[
                "Current vehicle title properly signed by seller and buyer",
                "Valid Florida driver's license or ID",
                "Proof of Florida insurance",
                "Odometer disclosure statement (if vehicle is less than 10 years old)",
                "Bill of sale or purchase agreement",
                "Payment for title transfer fees",
            ]),
            steps: strings(&[
                "Seller and buyer complete and sign the title transfer section.",
                "Fill in the odometer disclosure if required.",
                "Submit the title and documents at a tax collector office.",
                "Pay the transfer fee and receive the new title in the buyer's name.",
            ]),
            links: vec![portal_link()],
            note: Some("Both parties should be present when possible.".to_string()),
            agency: Some(TAX_COLLECTOR_AGENCY.to_string()),
            estimated_wait: Some("Same day; printed title mailed within 2 weeks".to_string()),
            fee: Some("About $75-$85 title fee plus lien and county fees".to_string()),
        },
    }
}
