use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique string code of a billing parameter (e.g. `fix_ctv`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterCode(String);

impl ParameterCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParameterCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for ParameterCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl AsRef<str> for ParameterCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Numeric identity of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u64);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClassId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Numeric identity of a service, assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ServiceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
