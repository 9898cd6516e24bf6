// ABOUTME: Validated application and deployment group names.
// ABOUTME: Names are 1-100 characters of ASCII letters, digits, '-', '_' and '.'.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("{0} name cannot be empty")]
    Empty(&'static str),

    #[error("{0} name exceeds maximum length of 100 characters")]
    TooLong(&'static str),

    #[error("invalid character in {kind} name: '{found}'")]
    InvalidChar { kind: &'static str, found: char },
}

fn validate(kind: &'static str, value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty(kind));
    }

    if value.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong(kind));
    }

    if let Some(found) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(NameError::InvalidChar { kind, found });
    }

    Ok(())
}

/// Name of the application a deployment group belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApplicationName(String);

impl ApplicationName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        validate("application", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of a deployment group, the key the registrar upserts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentGroupName(String);

impl DeploymentGroupName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        validate("deployment group", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_newtype_impls {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                $ty::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_newtype_impls!(ApplicationName);
string_newtype_impls!(DeploymentGroupName);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        assert!(DeploymentGroupName::new("books-dg").is_ok());
        assert!(DeploymentGroupName::new("Books_DG.v2").is_ok());
        assert!(ApplicationName::new("books").is_ok());
    }

    #[test]
    fn rejects_empty_and_long_names() {
        assert_eq!(
            DeploymentGroupName::new(""),
            Err(NameError::Empty("deployment group"))
        );
        let long = "a".repeat(101);
        assert_eq!(
            ApplicationName::new(&long),
            Err(NameError::TooLong("application"))
        );
    }

    #[test]
    fn rejects_spaces() {
        let err = DeploymentGroupName::new("books dg").unwrap_err();
        assert!(err.to_string().contains("' '"));
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<DeploymentGroupName, _> = serde_json::from_str("\"books\"");
        assert!(ok.is_ok());
        let bad: Result<DeploymentGroupName, _> = serde_json::from_str("\"bo/oks\"");
        assert!(bad.is_err());
    }
}
