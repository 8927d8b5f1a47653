use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const TOKEN_LEN: usize = 32;

/// Opaque handle tying an anonymous visitor to their (at most one) live hold.
/// Resolved to a hold only by the store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Accepts client-supplied tokens. Anything that could not have been
    /// minted by [`SessionToken::generate`] is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid = raw.len() == TOKEN_LEN && raw.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionToken {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| "malformed session token".to_string())
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({}…)", prefix)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_parse_back() {
        let token = SessionToken::generate();
        assert_eq!(token.as_str().len(), TOKEN_LEN);
        assert_eq!(SessionToken::parse(token.as_str()), Some(token.clone()));
        assert_ne!(SessionToken::generate(), token);
    }

    #[test]
    fn test_rejects_foreign_tokens() {
        assert!(SessionToken::parse("").is_none());
        assert!(SessionToken::parse("short").is_none());
        assert!(SessionToken::parse("../../../../etc/passwd-aaaaaaaaaaa").is_none());
    }

    #[test]
    fn test_deserialize_goes_through_parse() {
        use serde::de::value::{Error, StrDeserializer};
        use serde::de::IntoDeserializer;

        let token = SessionToken::generate();
        let de: StrDeserializer<'_, Error> = token.as_str().into_deserializer();
        assert_eq!(SessionToken::deserialize(de).unwrap(), token);

        let de: StrDeserializer<'_, Error> = "not-a-session".into_deserializer();
        assert!(SessionToken::deserialize(de).is_err());
    }

    #[test]
    fn test_debug_truncates_on_char_boundary() {
        let token = SessionToken("ééééééééé".to_string());
        assert_eq!(format!("{:?}", token), "SessionToken(éééééé…)");
        assert_eq!(format!("{:?}", SessionToken("ab".to_string())), "SessionToken(ab…)");
    }
}
