//! Account data source abstraction.
//!
//! The poller only needs the three authenticated account reads, so it is
//! written against this trait rather than the concrete REST client. The
//! real implementation is [`BinanceClient`](super::BinanceClient); tests
//! drive the poller with [`MockAccountSource`](super::MockAccountSource).

use super::error::ApiResult;
use super::types::{FuturesBalance, FuturesPosition, SpotBalance};
use async_trait::async_trait;
use std::fmt;

/// The kinds of account data refreshed every poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataKind {
    SpotBalance,
    FuturesBalance,
    FuturesPositions,
}

impl DataKind {
    /// All kinds, in the order they are fetched.
    pub const ALL: [DataKind; 3] = [
        DataKind::SpotBalance,
        DataKind::FuturesBalance,
        DataKind::FuturesPositions,
    ];
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::SpotBalance => write!(f, "spot balance"),
            DataKind::FuturesBalance => write!(f, "futures balance"),
            DataKind::FuturesPositions => write!(f, "futures positions"),
        }
    }
}

/// Source of per-account balances and positions.
///
/// Results are already filtered: spot balances are non-zero and positions
/// are open.
#[async_trait]
pub trait AccountDataSource: Send + Sync {
    /// Spot balances with a non-zero free or locked amount.
    async fn spot_balance(&self) -> ApiResult<Vec<SpotBalance>>;

    /// Futures wallet balances, one per asset.
    async fn futures_balance(&self) -> ApiResult<Vec<FuturesBalance>>;

    /// Futures positions with a non-zero amount.
    async fn futures_positions(&self) -> ApiResult<Vec<FuturesPosition>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_kind_display() {
        assert_eq!(DataKind::SpotBalance.to_string(), "spot balance");
        assert_eq!(DataKind::ALL[2], DataKind::FuturesPositions);
    }
}
