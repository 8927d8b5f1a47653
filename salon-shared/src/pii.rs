use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps customer contact data (email, phone, names) so it never reaches
/// log output in clear text. Serialization is transparent: API bodies and
/// database writes see the real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    /// Keeps enough of the value to correlate log lines without exposing it:
    /// `jane.doe@example.com` becomes `j***@example.com`, anything else keeps
    /// its last two characters.
    pub fn redacted(&self) -> String {
        let value = self.0.as_ref();
        if let Some((local, domain)) = value.split_once('@') {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            return format!("{first}***@{domain}");
        }

        let count = value.chars().count();
        if count <= 2 {
            return "***".to_string();
        }
        let tail: String = value.chars().skip(count - 2).collect();
        format!("***{tail}")
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Masked({})", self.redacted())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}
