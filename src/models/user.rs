use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Website,
    Mobile,
    Desktop,
    Whatsapp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Website => "website",
            Platform::Mobile => "mobile",
            Platform::Desktop => "desktop",
            Platform::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsePlatformError {
    message: String,
}

impl fmt::Display for ParsePlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParsePlatformError {}

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "website" => Ok(Platform::Website),
            "mobile" => Ok(Platform::Mobile),
            "desktop" => Ok(Platform::Desktop),
            "whatsapp" => Ok(Platform::Whatsapp),
            _ =>
                Err(ParsePlatformError {
                    message: format!("Invalid platform: '{}'", s),
                }),
        }
    }
}

/// Opaque session credential handed over by the identity layer.
/// Never printed; only the wire payload sees the raw value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub credential: SessionCredential,
    pub logged_in: bool,
    pub phone_number: String,
    pub platform: Platform,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("Website".parse::<Platform>(), Ok(Platform::Website));
        assert_eq!("WHATSAPP".parse::<Platform>(), Ok(Platform::Whatsapp));
        assert!("fax".parse::<Platform>().is_err());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = SessionCredential::new("s3cret");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("s3cret"));
        assert_eq!(credential.expose(), "s3cret");
    }
}
