//! Storage-network token amounts
//!
//! Balances, rewards and thresholds are handled as integer base units
//! ("winston", 10^-12 AR). Decimal AR strings are only parsed at the edges
//! and rendered for display.
//!
//! ## Example Usage
//!
//! ```
//! use permakey_tx::Winston;
//!
//! let threshold = Winston::from_ar("0.01").unwrap();
//! assert_eq!(threshold, Winston::from(10_000_000_000u64));
//!
//! let balance: Winston = "9999999999".parse().unwrap();
//! assert!(balance < threshold);
//! assert_eq!(balance.to_ar_string(), "0.009999999999");
//! ```

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use alloy_primitives::utils::{ParseUnits, format_units, parse_units};

use crate::error::{Result, TxError};

/// Decimal places between AR and winston.
pub const AR_DECIMALS: u8 = 12;

/// An amount in winston.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Winston(U256);

impl Winston {
    /// Zero winston.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Wraps a raw winston value.
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub const fn get(&self) -> U256 {
        self.0
    }

    /// Parses a decimal AR amount such as `"0.01"`.
    pub fn from_ar(amount: &str) -> Result<Self> {
        match parse_units(amount.trim(), AR_DECIMALS) {
            Ok(ParseUnits::U256(value)) => Ok(Self(value)),
            _ => Err(TxError::InvalidAmount(amount.to_string())),
        }
    }

    /// Renders the amount as decimal AR, with all twelve decimals.
    pub fn to_ar_string(&self) -> String {
        format_units(self.0, AR_DECIMALS).unwrap_or_else(|_| self.0.to_string())
    }
}

impl FromStr for Winston {
    type Err = TxError;

    /// Parses an integer winston string as returned by the gateway.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TxError::InvalidAmount(s.to_string()));
        }
        U256::from_str_radix(trimmed, 10)
            .map(Self)
            .map_err(|_| TxError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for Winston {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Winston {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Winston {
    fn from(value: U256) -> Self {
        Self(value)
    }
}
