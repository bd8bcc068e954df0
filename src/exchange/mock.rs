//! Scripted account data source for exercising the poller in tests.

use super::error::{ApiError, ApiResult};
use super::traits::{AccountDataSource, DataKind};
use super::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Scripted response for one data kind.
#[derive(Debug, Clone)]
enum Scripted<T> {
    Data(Vec<T>),
    Fail { status: u16, body: String },
}

impl<T: Clone> Scripted<T> {
    fn respond(&self) -> ApiResult<Vec<T>> {
        match self {
            Scripted::Data(data) => Ok(data.clone()),
            Scripted::Fail { status, body } => Err(ApiError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

#[derive(Debug)]
struct MockState {
    spot: Scripted<SpotBalance>,
    futures: Scripted<FuturesBalance>,
    positions: Scripted<FuturesPosition>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            spot: Scripted::Data(Vec::new()),
            futures: Scripted::Data(Vec::new()),
            positions: Scripted::Data(Vec::new()),
        }
    }
}

/// Mock source that returns whatever it was last told to, and counts calls.
///
/// Filtering is not applied; scripts are expected to hold already-filtered
/// data, the same as the real client returns.
#[derive(Debug, Default)]
pub struct MockAccountSource {
    state: Mutex<MockState>,
    calls: AtomicU64,
    calls_by_kind: Mutex<HashMap<DataKind, u64>>,
}

impl MockAccountSource {
    /// Create a mock that returns empty data for every kind.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn set_spot_balance(&self, balances: Vec<SpotBalance>) {
        self.with_state(|s| s.spot = Scripted::Data(balances));
    }

    pub fn set_futures_balance(&self, balances: Vec<FuturesBalance>) {
        self.with_state(|s| s.futures = Scripted::Data(balances));
    }

    pub fn set_futures_positions(&self, positions: Vec<FuturesPosition>) {
        self.with_state(|s| s.positions = Scripted::Data(positions));
    }

    /// Make every subsequent fetch of `kind` fail with an HTTP status.
    pub fn fail(&self, kind: DataKind, status: u16) {
        let body = format!("simulated {} failure", kind);
        self.with_state(|s| match kind {
            DataKind::SpotBalance => s.spot = Scripted::Fail { status, body },
            DataKind::FuturesBalance => s.futures = Scripted::Fail { status, body },
            DataKind::FuturesPositions => s.positions = Scripted::Fail { status, body },
        });
    }

    /// Make every fetch fail.
    pub fn fail_all(&self, status: u16) {
        for kind in DataKind::ALL {
            self.fail(kind, status);
        }
    }

    /// Total number of fetches made against this source.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of fetches made for one data kind.
    pub fn calls_for(&self, kind: DataKind) -> u64 {
        let calls = self.calls_by_kind.lock().unwrap_or_else(|e| e.into_inner());
        calls.get(&kind).copied().unwrap_or(0)
    }

    fn record(&self, kind: DataKind) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut calls = self.calls_by_kind.lock().unwrap_or_else(|e| e.into_inner());
        *calls.entry(kind).or_insert(0) += 1;
        debug!("Mock fetch: {}", kind);
    }
}

#[async_trait]
impl AccountDataSource for MockAccountSource {
    async fn spot_balance(&self) -> ApiResult<Vec<SpotBalance>> {
        self.record(DataKind::SpotBalance);
        self.with_state(|s| s.spot.respond())
    }

    async fn futures_balance(&self) -> ApiResult<Vec<FuturesBalance>> {
        self.record(DataKind::FuturesBalance);
        self.with_state(|s| s.futures.respond())
    }

    async fn futures_positions(&self) -> ApiResult<Vec<FuturesPosition>> {
        self.record(DataKind::FuturesPositions);
        self.with_state(|s| s.positions.respond())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_returns_scripted_data() {
        let mock = MockAccountSource::new();
        mock.set_spot_balance(vec![SpotBalance {
            asset: "BTC".to_string(),
            free: dec!(1),
            locked: dec!(0),
        }]);

        let spot = mock.spot_balance().await.unwrap();
        assert_eq!(spot.len(), 1);
        assert!(mock.futures_positions().await.unwrap().is_empty());
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.calls_for(DataKind::SpotBalance), 1);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockAccountSource::new();
        mock.fail(DataKind::FuturesBalance, 503);

        assert!(mock.spot_balance().await.is_ok());
        match mock.futures_balance().await {
            Err(ApiError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
