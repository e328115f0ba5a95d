use crate::credentials::CredentialGate;
use crate::error::{DispatchError, ErrorClass};

/// Provider phrase for a key that cannot see the requested model.
pub const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

const CREDENTIAL_MARKERS: &[&str] = &["api key not valid", "api_key_invalid"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &DispatchError) -> ErrorClass {
        if error.message.contains(ENTITY_NOT_FOUND) {
            return ErrorClass::InvalidCredential;
        }
        let lowered = error.message.to_ascii_lowercase();
        if CREDENTIAL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return ErrorClass::InvalidCredential;
        }
        match error.status {
            Some(401) => ErrorClass::InvalidCredential,
            Some(403) if lowered.contains("permission") || lowered.contains("api key") => {
                ErrorClass::InvalidCredential
            }
            _ => ErrorClass::Generic,
        }
    }

    pub fn apply(&self, class: ErrorClass, gate: &mut CredentialGate) -> bool {
        match class {
            ErrorClass::InvalidCredential => gate.revoke(),
            ErrorClass::Generic => false,
        }
    }
}
