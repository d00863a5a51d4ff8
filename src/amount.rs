//! Exact on-ledger token quantities.
//!
//! A `TokenAmount` is the ledger's native base-unit integer plus the token's
//! decimal precision. Arithmetic and comparisons happen on the raw integer;
//! the decimal-string form is a derived, lossy view for display only.

use alloy_primitives::utils::{format_units, parse_units, UnitsError};
use alloy_primitives::U256;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    pub raw: U256,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn zero(decimals: u8) -> Self {
        Self {
            raw: U256::ZERO,
            decimals,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Parse a human decimal string ("4.25") into base units.
    pub fn parse(amount: &str, decimals: u8) -> Result<Self, UnitsError> {
        let raw = parse_units(amount, decimals)?.get_absolute();
        Ok(Self { raw, decimals })
    }

    /// Split into two halves that sum exactly to the original.
    ///
    /// Integer division: the remainder of an odd amount lands in the first
    /// half, so `first >= second` and `first + second == raw` always.
    pub fn halves(&self) -> (U256, U256) {
        let second = self.raw / U256::from(2);
        let first = self.raw - second;
        (first, second)
    }

    /// Decimal display string with trailing fractional zeros trimmed.
    pub fn display(&self) -> String {
        match format_units(self.raw, self.decimals) {
            Ok(s) => {
                let trimmed = if s.contains('.') {
                    s.trim_end_matches('0').trim_end_matches('.')
                } else {
                    s.as_str()
                };
                if trimmed.is_empty() {
                    "0".to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Err(_) => self.raw.to_string(),
        }
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}
