use std::fmt;

use lookbook_contracts::session::CredentialState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    pub label: String,
    pub message: String,
}

impl EncodeError {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not read image {}: {}", self.label, self.message)
    }
}

impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub status: Option<u16>,
    pub message: String,
}

impl DispatchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "({code}) {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DispatchError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvalidCredential,
    Generic,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::InvalidCredential => "invalid_credential",
            ErrorClass::Generic => "generic",
        }
    }
}

#[derive(Debug)]
pub enum StudioError {
    Encode(EncodeError),
    Validation(String),
    Locked(CredentialState),
    Dispatch { class: ErrorClass, error: DispatchError },
    Io(anyhow::Error),
}

impl StudioError {
    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::Encode(_) => "encode",
            StudioError::Validation(_) => "validation",
            StudioError::Locked(_) => "locked",
            StudioError::Dispatch { .. } => "dispatch",
            StudioError::Io(_) => "io",
        }
    }

    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            StudioError::Locked(_)
                | StudioError::Dispatch {
                    class: ErrorClass::InvalidCredential,
                    ..
                }
        )
    }
}

impl fmt::Display for StudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudioError::Encode(err) => write!(f, "Image upload problem: {err}"),
            StudioError::Validation(message) => write!(f, "{message}"),
            StudioError::Locked(state) => write!(
                f,
                "Generation is locked until an API key is authorized (credential state: {}).",
                state.as_str()
            ),
            StudioError::Dispatch {
                class: ErrorClass::InvalidCredential,
                error,
            } => write!(
                f,
                "The API key is invalid or has no access to the image model; select a key again. ({error})"
            ),
            StudioError::Dispatch {
                class: ErrorClass::Generic,
                error,
            } => write!(f, "Image generation failed: {error}"),
            StudioError::Io(err) => write!(f, "{err:#}"),
        }
    }
}

impl std::error::Error for StudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StudioError::Encode(err) => Some(err),
            StudioError::Dispatch { error, .. } => Some(error),
            StudioError::Io(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<EncodeError> for StudioError {
    fn from(err: EncodeError) -> Self {
        StudioError::Encode(err)
    }
}

impl From<anyhow::Error> for StudioError {
    fn from(err: anyhow::Error) -> Self {
        StudioError::Io(err)
    }
}
