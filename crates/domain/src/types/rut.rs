//! Chilean tax identifier (RUT)
//!
//! Every identity the SII protocol exchanges (sender, company, recipient) is
//! a RUT: a numeric body plus a modulo-11 check digit. The authority expects
//! the two parts as separate fields, so the type keeps them apart.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SiiError};

/// Validated RUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rut {
    body: u32,
    check_digit: char,
}

impl Rut {
    /// Build a RUT from its parts, verifying the check digit.
    pub fn new(body: u32, check_digit: char) -> Result<Self> {
        let check_digit = check_digit.to_ascii_uppercase();
        let expected = Self::compute_check_digit(body);
        if body == 0 || check_digit != expected {
            return Err(SiiError::Config(format!(
                "invalid RUT {body}-{check_digit}: expected check digit {expected}"
            )));
        }
        Ok(Self { body, check_digit })
    }

    /// Parse `12.345.678-5`, `12345678-5` or `12345678-k`.
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned: String = raw.trim().chars().filter(|c| *c != '.').collect();
        let (body, dv) = cleaned
            .split_once('-')
            .ok_or_else(|| SiiError::Config(format!("invalid RUT '{raw}': missing '-'")))?;

        let body: u32 = body
            .parse()
            .map_err(|_| SiiError::Config(format!("invalid RUT '{raw}': body is not numeric")))?;

        let mut dv_chars = dv.chars();
        let check_digit = match (dv_chars.next(), dv_chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(SiiError::Config(format!(
                    "invalid RUT '{raw}': check digit must be a single character"
                )))
            }
        };

        Self::new(body, check_digit)
    }

    /// Modulo-11 check digit for `body`.
    pub fn compute_check_digit(body: u32) -> char {
        let mut sum = 0u32;
        let mut factor = 2u32;
        let mut remaining = body;
        while remaining > 0 {
            sum += (remaining % 10) * factor;
            remaining /= 10;
            factor = if factor == 7 { 2 } else { factor + 1 };
        }

        match 11 - (sum % 11) {
            11 => '0',
            10 => 'K',
            digit => char::from(b'0' + digit as u8),
        }
    }

    pub fn body(&self) -> u32 {
        self.body
    }

    pub fn check_digit(&self) -> char {
        self.check_digit
    }

    /// Body and check digit as the string fields the authority expects.
    pub fn split(&self) -> (String, String) {
        (self.body.to_string(), self.check_digit.to_string())
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.body, self.check_digit)
    }
}

impl FromStr for Rut {
    type Err = SiiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Rut {
    type Error = SiiError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Rut> for String {
    fn from(value: Rut) -> Self {
        value.to_string()
    }
}
