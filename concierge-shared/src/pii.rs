use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for contact details that must never show up in logs.
///
/// `Debug` and `Display` print a masked form, so `tracing::info!("{:?}", contact)`
/// is safe. Serialization still carries the real value because the backend
/// and the NLU collaborator need it.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Masked<String> {
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mask(&self.0.to_string()))
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mask(&self.0.to_string()))
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

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Masked<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Keeps the last two characters so support staff can tell values apart.
fn mask(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_masked() {
        let email = Masked::new("jane.doe@example.com".to_string());
        assert_eq!(format!("{:?}", email), "****om");
        assert_eq!(format!("{}", email), "****om");

        let short = Masked::new("123".to_string());
        assert_eq!(format!("{}", short), "****");
    }

    #[test]
    fn test_serialization_keeps_real_value() {
        let phone = Masked::new("+1 876 555 0100".to_string());
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"+1 876 555 0100\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "+1 876 555 0100");
    }
}
