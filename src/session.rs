use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Every Google API key starts with this prefix.
const GOOGLE_API_KEY_PREFIX: &str = "AIza";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("API key is empty")]
    Empty,
    #[error("API key must not contain whitespace or control characters")]
    IllegalCharacters,
    #[error("API key must start with AIza")]
    MissingPrefix,
}

/// A validated Gemini API key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);
impl Credential {
    pub fn parse(value: &str) -> Result<Self, CredentialError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CredentialError::Empty);
        }
        if value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(CredentialError::IllegalCharacters);
        }
        if !value.starts_with(GOOGLE_API_KEY_PREFIX) {
            return Err(CredentialError::MissingPrefix);
        }

        Ok(Self(value.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Never print the key itself into logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.0.chars().take(GOOGLE_API_KEY_PREFIX.len()).collect();
        write!(f, "Credential({visible}***)")
    }
}

/// Runtime session configuration shared between the HTTP server,
/// the completion client and the relay.
#[derive(Default)]
pub struct SessionState {
    credential: RwLock<Option<Credential>>,
    relay_running: AtomicBool,
}
impl SessionState {
    pub fn new(initial: Option<Credential>) -> Self {
        Self {
            credential: RwLock::new(initial),
            relay_running: AtomicBool::new(false),
        }
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    pub async fn has_credential(&self) -> bool {
        self.credential.read().await.is_some()
    }

    /// Validates and stores a new key, replacing any previous one.
    pub async fn set_credential(&self, value: &str) -> Result<Credential, CredentialError> {
        let credential = Credential::parse(value)?;
        self.credential.write().await.replace(credential.clone());
        Ok(credential)
    }

    pub fn is_relay_running(&self) -> bool {
        self.relay_running.load(Ordering::Acquire)
    }

    /// Once set, the flag is never cleared for the rest of the process.
    pub(crate) fn mark_relay_running(&self) {
        self.relay_running.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_parsing() {
        assert_eq!(Credential::parse(""), Err(CredentialError::Empty));
        assert_eq!(Credential::parse("   \n"), Err(CredentialError::Empty));
        assert_eq!(
            Credential::parse("AIza abc"),
            Err(CredentialError::IllegalCharacters)
        );
        assert_eq!(
            Credential::parse("sk-123456"),
            Err(CredentialError::MissingPrefix)
        );

        let credential = Credential::parse("  AIzaSyExample123 \n").unwrap();
        assert_eq!(credential.expose(), "AIzaSyExample123");
    }

    #[test]
    fn test_debug_hides_key() {
        let credential = Credential::parse("AIzaSySecretValue").unwrap();
        let printed = format!("{credential:?}");
        assert!(!printed.contains("SecretValue"));
        assert!(printed.starts_with("Credential(AIza"));
    }

    #[tokio::test]
    async fn test_set_credential() {
        let state = SessionState::new(None);
        assert!(!state.has_credential().await);

        assert!(state.set_credential("").await.is_err());
        assert!(state.credential().await.is_none());

        state.set_credential("AIzaFirst").await.unwrap();
        state.set_credential("AIzaSecond").await.unwrap();
        assert_eq!(
            state.credential().await.map(|c| c.expose().to_string()),
            Some("AIzaSecond".to_string())
        );

        // A rejected value leaves the stored key untouched.
        assert_eq!(
            state.set_credential("bogus").await,
            Err(CredentialError::MissingPrefix)
        );
        assert_eq!(
            state.credential().await.map(|c| c.expose().to_string()),
            Some("AIzaSecond".to_string())
        );
    }

    #[test]
    fn test_relay_flag() {
        let state = SessionState::default();
        assert!(!state.is_relay_running());
        state.mark_relay_running();
        assert!(state.is_relay_running());
    }
}
