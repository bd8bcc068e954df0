//! Events published by the poller to the display side.

use crate::exchange::{DataKind, FuturesBalance, FuturesPosition, SpotBalance};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A full replacement snapshot of one account field.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountSnapshot {
    Spot(Vec<SpotBalance>),
    Futures(Vec<FuturesBalance>),
    Positions(Vec<FuturesPosition>),
}

impl AccountSnapshot {
    /// Which account field this snapshot replaces.
    pub fn kind(&self) -> DataKind {
        match self {
            AccountSnapshot::Spot(_) => DataKind::SpotBalance,
            AccountSnapshot::Futures(_) => DataKind::FuturesBalance,
            AccountSnapshot::Positions(_) => DataKind::FuturesPositions,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AccountSnapshot::Spot(v) => v.len(),
            AccountSnapshot::Futures(v) => v.len(),
            AccountSnapshot::Positions(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summary of one pass over all accounts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    /// 1-based cycle number
    pub cycle: u64,
    /// Accounts visited this cycle
    pub accounts: usize,
    /// Fetches that produced a snapshot
    pub succeeded: usize,
    /// Fetches that produced nothing
    pub failed: usize,
    pub elapsed: Duration,
}

/// Message from the poller to whoever renders account state.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Fresh data for one account field; replaces the previous snapshot.
    Snapshot {
        account: String,
        snapshot: AccountSnapshot,
        fetched_at: DateTime<Utc>,
    },
    /// A fetch failed; the previous snapshot stays in place.
    FetchFailed {
        account: String,
        kind: DataKind,
        error: String,
    },
    /// All accounts have been visited.
    CycleComplete(CycleStats),
}
