//! Entity identity system using type-prefixed ULIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Entity type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityPrefix {
    /// Manufacturing job (one PO line, one part revision)
    Job,
    /// Canonical part identity (number + revision)
    Part,
    /// Job dimension (measurable characteristic)
    Dim,
    /// Material control (incoming inspection)
    Matc,
    /// External process (outsourced step)
    Extp,
    /// Measurement report
    Rpt,
    /// Single measurement within a report
    Meas,
    /// Exit control (final inspection of a lot)
    Exit,
    /// Exit control sample (one physical unit)
    Smp,
    /// Error report (nonconformance)
    Err,
}

impl EntityPrefix {
    /// Get the string representation of the prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Job => "JOB",
            EntityPrefix::Part => "PART",
            EntityPrefix::Dim => "DIM",
            EntityPrefix::Matc => "MATC",
            EntityPrefix::Extp => "EXTP",
            EntityPrefix::Rpt => "RPT",
            EntityPrefix::Meas => "MEAS",
            EntityPrefix::Exit => "EXIT",
            EntityPrefix::Smp => "SMP",
            EntityPrefix::Err => "ERR",
        }
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, IdParseError> {
        match s.to_uppercase().as_str() {
            "JOB" => Ok(EntityPrefix::Job),
            "PART" => Ok(EntityPrefix::Part),
            "DIM" => Ok(EntityPrefix::Dim),
            "MATC" => Ok(EntityPrefix::Matc),
            "EXTP" => Ok(EntityPrefix::Extp),
            "RPT" => Ok(EntityPrefix::Rpt),
            "MEAS" => Ok(EntityPrefix::Meas),
            "EXIT" => Ok(EntityPrefix::Exit),
            "SMP" => Ok(EntityPrefix::Smp),
            "ERR" => Ok(EntityPrefix::Err),
            _ => Err(IdParseError::InvalidPrefix(s.to_string())),
        }
    }
}

/// A unique entity identifier combining a type prefix and ULID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Create a new EntityId with the given prefix
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    /// Get the entity prefix
    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    /// Parse an EntityId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Parse an EntityId, additionally checking the prefix matches
    pub fn parse_expecting(s: &str, expected: EntityPrefix) -> Result<Self, IdParseError> {
        let id = Self::parse(s)?;
        if id.prefix != expected {
            return Err(IdParseError::WrongPrefix {
                expected,
                found: id.prefix,
            });
        }
        Ok(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, IdParseError> {
        let (prefix_str, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let prefix = prefix_str.parse()?;
        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { prefix, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing entity IDs
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid entity prefix: '{0}' (valid: JOB, PART, DIM, MATC, EXTP, RPT, MEAS, EXIT, SMP, ERR)")]
    InvalidPrefix(String),

    #[error("expected a {expected} id, got a {found} id")]
    WrongPrefix {
        expected: EntityPrefix,
        found: EntityPrefix,
    },

    #[error("missing '-' delimiter in entity ID: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_generation() {
        let id = EntityId::new(EntityPrefix::Job);
        assert!(id.to_string().starts_with("JOB-"));
        assert_eq!(id.to_string().len(), 30); // JOB- (4) + ULID (26) = 30
    }

    #[test]
    fn test_entity_id_roundtrip() {
        let original = EntityId::new(EntityPrefix::Err);
        let parsed = EntityId::parse(&original.to_string()).unwrap();
        assert_eq!(original, parsed);
        assert_eq!(parsed.prefix(), EntityPrefix::Err);
    }

    #[test]
    fn test_entity_id_invalid_prefix() {
        let err = EntityId::parse("XXX-01HQ3K4N5M6P7R8S9T0UVWXYZ").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidPrefix(_)));
    }

    #[test]
    fn test_entity_id_missing_delimiter() {
        let err = EntityId::parse("JOB01HQ3K4N5M6P7R8S9T0UVWXYZ").unwrap_err();
        assert!(matches!(err, IdParseError::MissingDelimiter(_)));
    }

    #[test]
    fn test_entity_id_invalid_ulid() {
        let err = EntityId::parse("JOB-notaulid").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidUlid(_, _)));
    }

    #[test]
    fn test_parse_expecting_rejects_wrong_prefix() {
        let id = EntityId::new(EntityPrefix::Part);
        let err = EntityId::parse_expecting(&id.to_string(), EntityPrefix::Job).unwrap_err();
        assert!(matches!(err, IdParseError::WrongPrefix { .. }));
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntityId::new(EntityPrefix::Smp);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
