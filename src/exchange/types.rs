//! Type definitions for Binance API responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spot account information (`GET /api/v3/account`).
///
/// Only the balances are used; the remaining fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotAccountInfo {
    pub balances: Vec<SpotBalance>,
}

/// Balance of a single asset in the spot account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

impl SpotBalance {
    /// True when the asset holds anything, free or locked.
    pub fn is_nonzero(&self) -> bool {
        self.free > Decimal::ZERO || self.locked > Decimal::ZERO
    }
}

/// Futures wallet balance for one asset (`GET /fapi/v2/balance`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub available_balance: Decimal,
}

/// Futures position information (`GET /fapi/v2/positionRisk`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesPosition {
    pub symbol: String,
    /// Signed amount; negative is short.
    #[serde(with = "rust_decimal::serde::str")]
    pub position_amt: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub mark_price: Decimal,
    #[serde(rename = "unRealizedProfit", with = "rust_decimal::serde::str")]
    pub unrealized_profit: Decimal,
}

impl FuturesPosition {
    /// True when the position is open.
    pub fn is_open(&self) -> bool {
        !self.position_amt.is_zero()
    }
}

/// Latest price for a futures symbol (`GET /fapi/v1/ticker/price`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// 24-hour ticker statistics (`GET /fapi/v1/ticker/24hr`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_change: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_change_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub last_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub quote_volume: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_spot_balance_parses_text_amounts() {
        let json = r#"{"asset":"BTC","free":"0.00100000","locked":"0.00000000"}"#;
        let balance: SpotBalance = serde_json::from_str(json).unwrap();

        assert_eq!(balance.asset, "BTC");
        assert_eq!(balance.free, dec!(0.001));
        assert!(balance.is_nonzero());
    }

    #[test]
    fn test_spot_balance_zero_with_trailing_digits() {
        // "0.00000000" must compare as zero, not as a non-empty string
        let json = r#"{"asset":"ETH","free":"0.00000000","locked":"0.00000000"}"#;
        let balance: SpotBalance = serde_json::from_str(json).unwrap();
        assert!(!balance.is_nonzero());
    }

    #[test]
    fn test_position_ignores_extra_fields() {
        let json = r#"{
            "symbol":"BTCUSDT","positionAmt":"-0.010","entryPrice":"65000.0",
            "markPrice":"64000.5","unRealizedProfit":"10.00500000",
            "liquidationPrice":"0","leverage":"20","positionSide":"BOTH"
        }"#;
        let position: FuturesPosition = serde_json::from_str(json).unwrap();

        assert_eq!(position.position_amt, dec!(-0.01));
        assert_eq!(position.unrealized_profit, dec!(10.005));
        assert!(position.is_open());
    }

    #[test]
    fn test_futures_balance_missing_field_is_error() {
        let json = r#"{"asset":"USDT","balance":"100.0"}"#;
        assert!(serde_json::from_str::<FuturesBalance>(json).is_err());
    }
}
