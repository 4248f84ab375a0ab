use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// A numeric field as upstreams send it: a JSON string or a JSON number.
///
/// Decoding keeps the original text so the conversion to [`Decimal`] is exact.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Text(String),
    Number(serde_json::Number),
}

impl RawNumber {
    pub fn to_decimal(&self) -> Result<Decimal> {
        match self {
            RawNumber::Text(text) => parse_decimal(text),
            RawNumber::Number(number) => parse_decimal(&number.to_string()),
        }
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

pub fn parse_decimal(text: &str) -> Result<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("empty numeric value".to_string()));
    }
    let parsed = if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed)
    } else {
        Decimal::from_str(trimmed)
    };
    parsed.map_err(|err| Error::InvalidInput(format!("invalid decimal {trimmed:?}: {err}")))
}

/// Converts an optional raw field, treating absence as `None`.
pub fn optional_decimal(value: Option<&RawNumber>) -> Result<Option<Decimal>> {
    value.map(RawNumber::to_decimal).transpose()
}
