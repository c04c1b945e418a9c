//! Anti-CSRF crumb state

use crate::document::RemoteDocument;

pub const CRUMB_ISSUER_PATH: &str = "crumbIssuer/api/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    /// Header name, e.g. `Jenkins-Crumb`
    pub request_field: String,
    pub value: String,
}

impl Crumb {
    /// Reads `crumb` and `crumbRequestField` from a crumb issuer document
    pub fn from_document(document: &RemoteDocument) -> Option<Self> {
        let value = document.str("crumb")?;
        let request_field = document.str("crumbRequestField")?;
        if request_field.is_empty() {
            return None;
        }

        Some(Self {
            request_field: request_field.to_string(),
            value: value.to_string(),
        })
    }

    pub fn header(&self) -> (String, String) {
        (self.request_field.clone(), self.value.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CrumbState {
    #[default]
    Disabled,
    Enabled(Crumb),
}

impl CrumbState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, CrumbState::Enabled(_))
    }

    pub fn crumb(&self) -> Option<&Crumb> {
        match self {
            CrumbState::Enabled(crumb) => Some(crumb),
            CrumbState::Disabled => None,
        }
    }
}
