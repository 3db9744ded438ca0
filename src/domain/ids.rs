//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through a sync run. Each type
//! keeps the raw string private so the different identifiers cannot be mixed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Dataset name newtype wrapper
///
/// The operator-facing name of a synchronized dataset. It doubles as a directory
/// name, so construction normalises it into a file-system and feature-class safe
/// slug.
///
/// # Examples
///
/// ```
/// use geosync::domain::ids::DatasetName;
///
/// let name = DatasetName::new("NZ Parcels/Primary").unwrap();
/// assert_eq!(name.as_str(), "NZ_Parcels_Primary");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetName(String);

impl DatasetName {
    /// Creates a new DatasetName, slugifying the input
    ///
    /// # Returns
    ///
    /// Returns `Err` if nothing usable remains after slugifying
    pub fn new(name: impl AsRef<str>) -> Result<Self, String> {
        let slug = slugify(name.as_ref());
        if slug.is_empty() || slug == "_" {
            return Err(format!(
                "Dataset name '{}' contains no usable characters",
                name.as_ref()
            ));
        }
        Ok(Self(slug))
    }

    /// Returns the dataset name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Converts free text into a safe folder / feature class name
fn slugify(text: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("static regex"));

    let replaced: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '-' | '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' => '_',
            other => other,
        })
        .collect();
    let mut slug = invalid.replace_all(&replaced, "").into_owned();

    // Feature class names may not start with a digit
    if slug.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        slug.insert(0, '_');
    }
    slug
}

/// Remote layer identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    /// Creates a new LayerId
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Layer ID cannot be empty".to_string());
        }
        Ok(Self(id.trim().to_string()))
    }

    /// Returns the layer ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Export job identifier
///
/// The identifier returned by the remote service when an export is created.
/// It is the only handle needed to resume polling from a later invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new JobId
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Export job ID cannot be empty".to_string());
        }
        Ok(Self(id.trim().to_string()))
    }

    /// Reads a job id from a JSON value; the service reports numeric ids
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Self::new(n.to_string()).ok(),
            Value::String(s) => Self::new(s.as_str()).ok(),
            _ => None,
        }
    }

    /// Returns the job ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Value of the identity field of a feature
///
/// Identity values are integers for most layers but the service sometimes
/// delivers them as floating point numbers (`42.0`). Integral floats are
/// normalised to integers so matching agrees between full and changeset
/// payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdentityValue {
    /// Integer identity
    Integer(i64),
    /// Textual identity
    Text(String),
}

impl IdentityValue {
    /// Reads an identity value from an attribute value
    ///
    /// Returns `None` for null, boolean, array, object, or non-integral numbers.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i))
                } else {
                    let f = n.as_f64()?;
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Some(Self::Integer(f as i64))
                    } else {
                        None
                    }
                }
            }
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Converts the identity back into an attribute value
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for IdentityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for IdentityValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for IdentityValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
