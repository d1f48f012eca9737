//! Product SKU identifiers.
//!
//! A SKU is four uppercase ASCII letters, a dash and four ASCII digits,
//! e.g. `KASL-3423`.

use std::fmt;
use thiserror::Error;

/// Length of a well-formed SKU
const SKU_LENGTH: usize = 9;

/// Position of the separator dash
const SEPARATOR_POS: usize = 4;

/// Rejected SKU text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid Sku provided: {0}")]
pub struct InvalidSku(pub String);

/// A validated SKU identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SkuId {
    value: String,
}

impl SkuId {
    /// Validate `value` against `^[A-Z]{4}-[0-9]{4}$`.
    pub fn new(value: &str) -> Result<Self, InvalidSku> {
        let bytes = value.as_bytes();
        let well_formed = bytes.len() == SKU_LENGTH
            && bytes[..SEPARATOR_POS].iter().all(u8::is_ascii_uppercase)
            && bytes[SEPARATOR_POS] == b'-'
            && bytes[SEPARATOR_POS + 1..].iter().all(u8::is_ascii_digit);

        if well_formed {
            Ok(Self {
                value: value.to_string(),
            })
        } else {
            Err(InvalidSku(value.to_string()))
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for SkuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A stored product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sku {
    id: SkuId,
}

impl Sku {
    pub fn new(id: SkuId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &SkuId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sku() {
        let id = SkuId::new("KASL-3423").unwrap();
        assert_eq!(id.value(), "KASL-3423");
        assert_eq!(id.to_string(), "KASL-3423");
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            SkuId::new("ABCD-123"),
            Err(InvalidSku("ABCD-123".to_string()))
        );
    }

    #[test]
    fn test_too_long() {
        assert!(SkuId::new("ABCD-12345").is_err());
    }

    #[test]
    fn test_fifth_character_must_be_dash() {
        assert!(SkuId::new("ABCDE1234").is_err());
    }

    #[test]
    fn test_prefix_must_be_uppercase_letters() {
        assert!(SkuId::new("1234-1234").is_err());
        assert!(SkuId::new("abcd-1234").is_err());
    }

    #[test]
    fn test_suffix_must_be_digits() {
        assert!(SkuId::new("ABCD-ABCD").is_err());
    }

    #[test]
    fn test_non_ascii_rejected() {
        // Nine bytes, but not nine ASCII characters.
        assert!(SkuId::new("ÄBC-1234").is_err());
    }

    #[test]
    fn test_error_message() {
        let err = SkuId::new("invalid-sku").unwrap_err();
        assert_eq!(err.to_string(), "invalid Sku provided: invalid-sku");
    }
}
