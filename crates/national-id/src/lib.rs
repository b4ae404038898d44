//! National identifier (RUT) generation for checkout form data.
//!
//! A RUT is a numeric body followed by a verification character computed with
//! a weighted mod-11 checksum. The multipliers 2..=7 are applied to the body's
//! digits starting at the least significant one and wrap around.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest body produced by the generator.
pub const MIN_BODY: u32 = 1_000_000;

/// Largest body produced by the generator.
pub const MAX_BODY: u32 = 24_999_999;

/// Verification character used when the checksum resolves to 10.
pub const TEN_CHECK: char = 'K';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RutError {
    #[error("missing '-' separator in {0:?}")]
    MissingSeparator(String),

    #[error("invalid body {0:?}")]
    InvalidBody(String),

    #[error("invalid verification character {0:?}")]
    InvalidCheck(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rut {
    pub body: u32,
    pub check: char,
}

impl Rut {
    /// Build a RUT from its body, computing the verification character.
    pub fn from_body(body: u32) -> Self {
        Self {
            body,
            check: check_digit(body),
        }
    }

    /// Whether the stored verification character matches the body.
    pub fn is_valid(&self) -> bool {
        check_digit(self.body) == self.check
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.body, self.check)
    }
}

impl FromStr for Rut {
    type Err = RutError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (body, check) = raw
            .trim()
            .rsplit_once('-')
            .ok_or_else(|| RutError::MissingSeparator(raw.to_string()))?;
        let body = body
            .replace('.', "")
            .parse::<u32>()
            .map_err(|_| RutError::InvalidBody(body.to_string()))?;
        let mut chars = check.chars();
        let check = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => c,
            (Some(c), None) if c.eq_ignore_ascii_case(&TEN_CHECK) => TEN_CHECK,
            _ => return Err(RutError::InvalidCheck(check.to_string())),
        };
        Ok(Self { body, check })
    }
}

/// Weighted mod-11 sum of the body's digits.
pub fn checksum(body: u32) -> u32 {
    let mut rest = body;
    let mut sum = 0;
    let mut multiplier = 2;
    while rest > 0 {
        sum += (rest % 10) * multiplier;
        rest /= 10;
        multiplier = if multiplier == 7 { 2 } else { multiplier + 1 };
    }
    11 - sum % 11
}

/// Map a body to its verification character.
pub fn check_digit(body: u32) -> char {
    match checksum(body) {
        11 => '0',
        10 => TEN_CHECK,
        n => char::from_digit(n, 10).unwrap_or('0'),
    }
}

/// Generate a RUT with the thread-local RNG.
pub fn generate() -> Rut {
    generate_with(&mut rand::thread_rng())
}

/// Generate a RUT from a caller-supplied RNG (seed it for reproducible runs).
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Rut {
    Rut::from_body(rng.gen_range(MIN_BODY..=MAX_BODY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn known_values() {
        assert_eq!(Rut::from_body(11_111_111).to_string(), "11111111-1");
        assert_eq!(Rut::from_body(12_345_678).to_string(), "12345678-5");
        assert_eq!(Rut::from_body(10_000_013).to_string(), "10000013-K");
        assert_eq!(Rut::from_body(10_000_004).to_string(), "10000004-0");
    }

    #[test]
    fn checksum_special_cases() {
        assert_eq!(checksum(10_000_013), 10);
        assert_eq!(check_digit(10_000_013), 'K');
        assert_eq!(checksum(10_000_004), 11);
        assert_eq!(check_digit(10_000_004), '0');
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_with(&mut StdRng::seed_from_u64(7));
        let b = generate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn parse_accepts_dots_and_lowercase_k() {
        let rut: Rut = "10.000.013-k".parse().unwrap();
        assert_eq!(rut, Rut { body: 10_000_013, check: 'K' });
        assert!(rut.is_valid());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!("123".parse::<Rut>(), Err(RutError::MissingSeparator(_))));
        assert!(matches!("abc-1".parse::<Rut>(), Err(RutError::InvalidBody(_))));
        assert!(matches!("123-X".parse::<Rut>(), Err(RutError::InvalidCheck(_))));
        assert!(matches!("123-12".parse::<Rut>(), Err(RutError::InvalidCheck(_))));
    }

    #[test]
    fn tampered_check_is_invalid() {
        let mut rut = Rut::from_body(12_345_678);
        rut.check = '4';
        assert!(!rut.is_valid());
    }
}
