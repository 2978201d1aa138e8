//! Typed parsing of Hive asset amounts
//!
//! The condenser API reports amounts as `"12.345678 VESTS"` strings, newer
//! APIs use NAI objects (`{"amount": "12345678", "precision": 6, "nai": "@@000000037"}`).
//! Both are parsed into an [`Asset`] and checked against the denomination the
//! caller expects.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Asset denominations used by the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denom {
    /// Liquid HIVE (also the unit of Hive Power)
    Hive,
    /// Hive Backed Dollars
    Hbd,
    /// Vesting shares (stake)
    Vests,
}

impl Denom {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "HIVE" | "STEEM" | "TESTS" => Some(Denom::Hive),
            "HBD" | "SBD" | "TBD" => Some(Denom::Hbd),
            "VESTS" => Some(Denom::Vests),
            _ => None,
        }
    }

    fn from_nai(nai: &str) -> Option<Self> {
        match nai {
            "@@000000021" => Some(Denom::Hive),
            "@@000000013" => Some(Denom::Hbd),
            "@@000000037" => Some(Denom::Vests),
            _ => None,
        }
    }
}

impl fmt::Display for Denom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Denom::Hive => "HIVE",
            Denom::Hbd => "HBD",
            Denom::Vests => "VESTS",
        };
        f.write_str(symbol)
    }
}

/// An amount with its unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Asset {
    pub amount: f64,
    pub denom: Denom,
}

/// Error returned when an amount cannot be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    #[error("cannot parse amount {0:?}: expected \"<number> <SYMBOL>\"")]
    Format(String),

    #[error("cannot parse number {0:?}")]
    Number(String),

    #[error("unknown asset symbol {0:?}")]
    UnknownSymbol(String),

    #[error("expected an amount in {expected}, got {actual}")]
    UnexpectedDenom { expected: Denom, actual: Denom },
}

impl FromStr for Asset {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(number), Some(symbol), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AmountError::Format(s.to_string()));
        };

        let amount = number
            .parse::<f64>()
            .map_err(|_| AmountError::Number(number.to_string()))?;
        let denom =
            Denom::from_symbol(symbol).ok_or_else(|| AmountError::UnknownSymbol(symbol.to_string()))?;

        Ok(Asset { amount, denom })
    }
}

impl Asset {
    /// Parse an amount from a JSON value (legacy string or NAI object)
    pub fn from_json(value: &Value) -> Result<Self, AmountError> {
        match value {
            Value::String(s) => s.parse(),
            Value::Object(map) => {
                let raw = map
                    .get("amount")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AmountError::Format(value.to_string()))?;
                let precision = map
                    .get("precision")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| AmountError::Format(value.to_string()))?;
                let nai = map
                    .get("nai")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AmountError::Format(value.to_string()))?;

                let units = raw
                    .parse::<f64>()
                    .map_err(|_| AmountError::Number(raw.to_string()))?;
                let denom = Denom::from_nai(nai).ok_or_else(|| AmountError::UnknownSymbol(nai.to_string()))?;
                let precision = i32::try_from(precision).map_err(|_| AmountError::Format(value.to_string()))?;

                Ok(Asset {
                    amount: units / 10f64.powi(precision),
                    denom,
                })
            }
            other => Err(AmountError::Format(other.to_string())),
        }
    }

    /// Return the magnitude if the unit matches `expected`
    pub fn expect(self, expected: Denom) -> Result<f64, AmountError> {
        if self.denom == expected {
            Ok(self.amount)
        } else {
            Err(AmountError::UnexpectedDenom {
                expected,
                actual: self.denom,
            })
        }
    }
}

/// Parse `value` as an amount of `expected`
pub fn parse_amount(value: &Value, expected: Denom) -> Result<f64, AmountError> {
    Asset::from_json(value)?.expect(expected)
}

/// Parse a unitless number that may be sent as a string (e.g. `recent_claims`)
pub fn parse_number(value: &Value) -> Result<f64, AmountError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| AmountError::Number(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| AmountError::Number(s.clone())),
        other => Err(AmountError::Number(other.to_string())),
    }
}
