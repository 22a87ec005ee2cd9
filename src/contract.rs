//! Option contract symbol codec.
//!
//! The portfolio and order pages identify option positions by a single
//! encoded symbol: underlying, two-digit-year expiration date, call/put
//! flag, then the strike times 1000 padded to eight digits. For example,
//! `AAPL240119C00150000` is the AAPL 2024-01-19 150.00 call. This encoding
//! is a de-facto wire format: decoding must recover all four fields and
//! `Display` must round-trip exactly.

use crate::error::SimError;
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Z]+)(\d{6})([CP])(\d{8})$").expect("contract symbol pattern")
    })
}

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionRight {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl OptionRight {
    /// Returns the single-letter wire flag.
    #[must_use]
    pub fn as_flag(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_flag())
    }
}

/// A decoded option contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying equity symbol.
    pub underlying: String,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Call/put flag.
    pub right: OptionRight,
    /// Strike price.
    pub strike: Decimal,
}

impl OptionContract {
    /// True when the contract expired strictly before `today`.
    ///
    /// An expired contract's market price cannot move, so resolvers
    /// short-circuit on this instead of fetching.
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration < today
    }
}

impl FromStr for OptionContract {
    type Err = SimError;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        let caps = symbol_pattern()
            .captures(symbol.trim())
            .ok_or_else(|| SimError::InvalidContractSymbol(symbol.to_string()))?;

        let expiration = NaiveDate::parse_from_str(&format!("20{}", &caps[2]), "%Y%m%d")
            .map_err(|_| SimError::InvalidContractSymbol(symbol.to_string()))?;
        let right = match &caps[3] {
            "C" => OptionRight::Call,
            _ => OptionRight::Put,
        };
        let milli: i64 = caps[4]
            .parse()
            .map_err(|_| SimError::InvalidContractSymbol(symbol.to_string()))?;

        Ok(Self {
            underlying: caps[1].to_string(),
            expiration,
            right,
            strike: Decimal::new(milli, 3).normalize(),
        })
    }
}

impl std::fmt::Display for OptionContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let milli = (self.strike * Decimal::from(1000))
            .to_i64()
            .unwrap_or_default();
        write!(
            f,
            "{}{}{}{:08}",
            self.underlying,
            self.expiration.format("%y%m%d"),
            self.right.as_flag(),
            milli
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ==================== Decoding Tests ====================

    #[test]
    fn test_parse_call_contract() {
        let contract: OptionContract = "AAPL240119C00150000".parse().unwrap();

        assert_eq!(contract.underlying, "AAPL");
        assert_eq!(
            contract.expiration,
            NaiveDate::from_ymd_opt(2024, 1, 19).unwrap()
        );
        assert_eq!(contract.right, OptionRight::Call);
        assert_eq!(contract.strike, dec!(150));
    }

    #[test]
    fn test_parse_put_contract_with_fractional_strike() {
        let contract: OptionContract = "GE250620P00012500".parse().unwrap();

        assert_eq!(contract.underlying, "GE");
        assert_eq!(contract.right, OptionRight::Put);
        assert_eq!(contract.strike, dec!(12.5));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let contract: OptionContract = " AAPL240119C00150000 ".parse().unwrap();
        assert_eq!(contract.underlying, "AAPL");
    }

    #[test]
    fn test_parse_rejects_malformed_symbols() {
        for bad in ["AAPL", "AAPL240119X00150000", "240119C00150000", "AAPL24C00150000", ""] {
            assert!(
                bad.parse::<OptionContract>().is_err(),
                "accepted malformed symbol {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_impossible_date() {
        assert!("AAPL241350C00150000".parse::<OptionContract>().is_err());
    }

    // ==================== Round-Trip Tests ====================

    #[test]
    fn test_display_round_trips() {
        for symbol in [
            "AAPL240119C00150000",
            "GE250620P00012500",
            "TMO261218C01234000",
        ] {
            let contract: OptionContract = symbol.parse().unwrap();
            assert_eq!(contract.to_string(), symbol);
        }
    }

    // ==================== Expiry Tests ====================

    #[test]
    fn test_is_expired_strictly_before_today() {
        let contract: OptionContract = "AAPL240119C00150000".parse().unwrap();

        let after = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let on = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap();

        assert!(contract.is_expired(after));
        assert!(!contract.is_expired(on));
        assert!(!contract.is_expired(before));
    }
}
