use std::env;

use anyhow::{bail, Result};
use lookbook_contracts::session::CredentialState;

pub trait CredentialProvider: Send {
    fn name(&self) -> &str;
    /// `Ok(None)` means the host has no way to answer.
    fn has_authorization(&self) -> Result<Option<bool>>;
    fn request_authorization(&mut self) -> Result<()>;
    fn api_key(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvKeyProvider;

impl CredentialProvider for EnvKeyProvider {
    fn name(&self) -> &str {
        "env"
    }

    fn has_authorization(&self) -> Result<Option<bool>> {
        Ok(Some(self.api_key().is_some()))
    }

    fn request_authorization(&mut self) -> Result<()> {
        if self.api_key().is_none() {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        }
        Ok(())
    }

    fn api_key(&self) -> Option<String> {
        non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticKeyProvider {
    key: Option<String>,
    pending: Option<String>,
}

impl StaticKeyProvider {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.filter(|value| !value.trim().is_empty()),
            pending: None,
        }
    }

    pub fn offer(&mut self, key: impl Into<String>) {
        self.pending = Some(key.into());
    }
}

impl CredentialProvider for StaticKeyProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn has_authorization(&self) -> Result<Option<bool>> {
        Ok(Some(self.key.is_some()))
    }

    fn request_authorization(&mut self) -> Result<()> {
        let Some(candidate) = self.pending.take() else {
            bail!("no API key was entered");
        };
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            bail!("no API key was entered");
        }
        self.key = Some(trimmed.to_string());
        Ok(())
    }

    fn api_key(&self) -> Option<String> {
        self.key.clone()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProvider;

impl CredentialProvider for NoProvider {
    fn name(&self) -> &str {
        "none"
    }

    fn has_authorization(&self) -> Result<Option<bool>> {
        Ok(None)
    }

    fn request_authorization(&mut self) -> Result<()> {
        bail!("no credential provider is available in this environment")
    }

    fn api_key(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    Provider,
    ProviderUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialCheck {
    pub state: CredentialState,
    pub source: CheckSource,
}

pub struct CredentialGate {
    provider: Box<dyn CredentialProvider>,
    state: CredentialState,
    require_check: bool,
}

impl CredentialGate {
    pub fn new(provider: Box<dyn CredentialProvider>, require_check: bool) -> Self {
        Self {
            provider,
            state: CredentialState::Checking,
            require_check,
        }
    }

    pub fn state(&self) -> CredentialState {
        self.state
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn api_key(&self) -> Option<String> {
        self.provider.api_key()
    }

    pub fn check_authorization(&mut self) -> CredentialCheck {
        let answer = self.provider.has_authorization().ok().flatten();
        let source = match answer {
            Some(_) => CheckSource::Provider,
            None => CheckSource::ProviderUnavailable,
        };
        if self.state != CredentialState::Checking {
            return CredentialCheck {
                state: self.state,
                source,
            };
        }
        let next = match answer {
            Some(true) => CredentialState::Authorized,
            Some(false) => CredentialState::Unauthorized,
            None if self.require_check => CredentialState::Unauthorized,
            None => CredentialState::Authorized,
        };
        self.transition(next);
        CredentialCheck {
            state: self.state,
            source,
        }
    }

    pub fn request_authorization(&mut self) -> Result<CredentialState> {
        if self.state == CredentialState::Authorized {
            return Ok(self.state);
        }
        self.provider.request_authorization()?;
        self.transition(CredentialState::Authorized);
        Ok(self.state)
    }

    pub fn revoke(&mut self) -> bool {
        // Only an authorized credential can be revoked; `Checking` belongs to the check.
        if self.state != CredentialState::Authorized {
            return false;
        }
        self.transition(CredentialState::Unauthorized)
    }

    fn transition(&mut self, next: CredentialState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
