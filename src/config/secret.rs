//! Secure credential handling using the secrecy crate
//!
//! The service API key is the only credential geosync holds. It is wrapped in
//! `secrecy::Secret` so it is zeroed on drop, redacted in `Debug` output, and
//! only readable through an explicit `expose_secret()` call at the point the
//! `Authorization` header is built.
//!
//! # Example
//!
//! ```rust
//! use geosync::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let api_key = secret_string("my-key".to_string());
//! assert_eq!(api_key.expose_secret().as_str(), "my-key");
//!
//! // Debug output is redacted
//! assert!(!format!("{api_key:?}").contains("my-key"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl SecretValue {
    /// Borrows the secret text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Type alias for a secret string
///
/// This wraps a `SecretValue` in a `Secret` container that:
/// - Zeros the memory when dropped
/// - Prevents accidental logging via Debug
/// - Requires explicit `expose_secret()` to access
pub type SecretString = Secret<SecretValue>;

/// Helper function to create a SecretString from a String
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("api-key".to_string());
        assert_eq!(secret.expose_secret(), "api-key");
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("sensitive-key".to_string());
        let debug_output = format!("{secret:?}");

        assert!(!debug_output.contains("sensitive-key"));
        assert!(debug_output.contains("REDACTED") || debug_output.contains("Secret"));
    }

    #[test]
    fn test_secret_from_toml() {
        #[derive(Deserialize)]
        struct Service {
            api_key: SecretString,
        }

        let service: Service = toml::from_str(r#"api_key = "abc123""#).unwrap();
        assert_eq!(service.api_key.expose_secret().as_str(), "abc123");
    }
}
