//! Periodic multi-account refresh loop.
//!
//! A single task walks every registered account in order, fetching spot
//! balances, futures balances and futures positions one after another. Each
//! successful fetch is published as a full replacement snapshot; a failed
//! fetch is published as a [`MonitorEvent::FetchFailed`] and leaves the
//! previous snapshot in place. After a pass the loop sleeps for the poll
//! interval, or until stopped.

use super::events::{AccountSnapshot, CycleStats, MonitorEvent};
use super::registry::{AccountRegistry, RegisteredAccount};
use crate::exchange::{ApiResult, DataKind};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Lifecycle of the poll loop. `Running` moves to `Stopped` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Running,
    Stopped,
}

/// Cloneable handle used to stop a running poller from another task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<watch::Sender<PollerState>>,
}

impl StopHandle {
    /// Request the poller to stop. Returns true for the call that stopped it.
    pub fn stop(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == PollerState::Running {
                *state = PollerState::Stopped;
                true
            } else {
                false
            }
        })
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }
}

/// Drives the refresh of every registered account.
pub struct Poller {
    registry: Arc<AccountRegistry>,
    interval: Duration,
    events: mpsc::UnboundedSender<MonitorEvent>,
    state_tx: Arc<watch::Sender<PollerState>>,
    state_rx: watch::Receiver<PollerState>,
    cycles: u64,
}

impl Poller {
    pub fn new(
        registry: Arc<AccountRegistry>,
        interval: Duration,
        events: mpsc::UnboundedSender<MonitorEvent>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(PollerState::Running);

        Self {
            registry,
            interval,
            events,
            state_tx: Arc::new(state_tx),
            state_rx,
            cycles: 0,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: self.state_tx.clone(),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state_rx.borrow()
    }

    fn is_running(&self) -> bool {
        self.state() == PollerState::Running
    }

    /// Run until stopped. Stopping interrupts the inter-cycle sleep.
    pub async fn run(mut self) {
        info!(
            "🚀 Polling {} accounts every {:?}",
            self.registry.len(),
            self.interval
        );

        while self.is_running() {
            let stats = self.run_once().await;

            if !self.is_running() {
                break;
            }

            if self.events.send(MonitorEvent::CycleComplete(stats)).is_err() {
                warn!("Display closed, stopping poller");
                self.stop_handle().stop();
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.state_rx.changed() => {}
            }
        }

        info!("🛑 Poller stopped after {} cycles", self.cycles);
    }

    /// Refresh every account once, in registry order.
    ///
    /// A failure in one account never skips the accounts after it. If the
    /// poller is stopped mid-cycle, no further accounts are visited.
    pub async fn run_once(&mut self) -> CycleStats {
        let started = Instant::now();
        self.cycles += 1;

        let mut stats = CycleStats {
            cycle: self.cycles,
            ..CycleStats::default()
        };

        let registry = self.registry.clone();
        for account in registry.iter() {
            if !self.is_running() {
                debug!("Stop requested, abandoning cycle #{}", stats.cycle);
                break;
            }
            self.refresh_account(account, &mut stats).await;
            stats.accounts += 1;
        }

        stats.elapsed = started.elapsed();
        info!(
            "📡 Cycle #{} done: {} accounts, {} ok, {} failed in {:?}",
            stats.cycle, stats.accounts, stats.succeeded, stats.failed, stats.elapsed
        );
        stats
    }

    async fn refresh_account(&self, account: &RegisteredAccount, stats: &mut CycleStats) {
        let source = account.source();

        let spot = source.spot_balance().await.map(AccountSnapshot::Spot);
        self.publish(account.name(), DataKind::SpotBalance, spot, stats);

        let futures = source.futures_balance().await.map(AccountSnapshot::Futures);
        self.publish(account.name(), DataKind::FuturesBalance, futures, stats);

        let positions = source
            .futures_positions()
            .await
            .map(AccountSnapshot::Positions);
        self.publish(account.name(), DataKind::FuturesPositions, positions, stats);
    }

    fn publish(
        &self,
        account: &str,
        kind: DataKind,
        result: ApiResult<AccountSnapshot>,
        stats: &mut CycleStats,
    ) {
        let event = match result {
            Ok(snapshot) => {
                stats.succeeded += 1;
                debug!(account, "{}: {} entries", kind, snapshot.len());
                MonitorEvent::Snapshot {
                    account: account.to_string(),
                    snapshot,
                    fetched_at: Utc::now(),
                }
            }
            Err(e) => {
                stats.failed += 1;
                warn!(account, error = %e, "Failed to fetch {}", kind);
                MonitorEvent::FetchFailed {
                    account: account.to_string(),
                    kind,
                    error: e.to_string(),
                }
            }
        };

        if self.events.send(event).is_err() {
            debug!("Display closed, dropping {} update for {}", kind, account);
            self.stop_handle().stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{FuturesPosition, MockAccountSource, SpotBalance};
    use rust_decimal_macros::dec;

    fn registry_of(mocks: &[(&str, Arc<MockAccountSource>)]) -> Arc<AccountRegistry> {
        let mut registry = AccountRegistry::new();
        for (name, mock) in mocks {
            registry.register(name, mock.clone()).unwrap();
        }
        Arc::new(registry)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<MonitorEvent>) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_run_once_publishes_three_snapshots_per_account() {
        let a = Arc::new(MockAccountSource::new());
        a.set_spot_balance(vec![SpotBalance {
            asset: "BTC".to_string(),
            free: dec!(0.5),
            locked: dec!(0),
        }]);
        let b = Arc::new(MockAccountSource::new());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(
            registry_of(&[("a", a.clone()), ("b", b.clone())]),
            Duration::from_secs(5),
            tx,
        );

        let stats = poller.run_once().await;

        assert_eq!(stats.cycle, 1);
        assert_eq!(stats.accounts, 2);
        assert_eq!(stats.succeeded, 6);
        assert_eq!(stats.failed, 0);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 6);
        match &events[0] {
            MonitorEvent::Snapshot {
                account, snapshot, ..
            } => {
                assert_eq!(account, "a");
                assert_eq!(snapshot.kind(), DataKind::SpotBalance);
                assert_eq!(snapshot.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_account_does_not_skip_later_accounts() {
        let broken = Arc::new(MockAccountSource::new());
        broken.fail_all(500);
        let healthy = Arc::new(MockAccountSource::new());
        healthy.set_futures_positions(vec![FuturesPosition {
            symbol: "BTCUSDT".to_string(),
            position_amt: dec!(0.01),
            entry_price: dec!(60000),
            mark_price: dec!(61000),
            unrealized_profit: dec!(10),
        }]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(
            registry_of(&[("broken", broken.clone()), ("healthy", healthy.clone())]),
            Duration::from_secs(5),
            tx,
        );

        let stats = poller.run_once().await;
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(healthy.call_count(), 3);

        let events = drain(&mut rx);
        let failures = events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::FetchFailed { account, .. } if account == "broken"))
            .count();
        assert_eq!(failures, 3);

        let healthy_positions = events.iter().any(|e| {
            matches!(
                e,
                MonitorEvent::Snapshot { account, snapshot: AccountSnapshot::Positions(p), .. }
                    if account == "healthy" && p.len() == 1
            )
        });
        assert!(healthy_positions);
    }

    #[tokio::test]
    async fn test_empty_result_is_still_published() {
        let mock = Arc::new(MockAccountSource::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new(registry_of(&[("a", mock)]), Duration::from_secs(5), tx);

        poller.run_once().await;

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            MonitorEvent::Snapshot { snapshot: AccountSnapshot::Positions(p), .. } if p.is_empty()
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cycles_follow_interval() {
        let mock = Arc::new(MockAccountSource::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = Poller::new(
            registry_of(&[("a", mock.clone())]),
            Duration::from_secs(5),
            tx,
        );
        let stop = poller.stop_handle();
        let handle = tokio::spawn(poller.run());

        // Cycles start at t=0, 5 and 10
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(mock.calls_for(DataKind::SpotBalance), 3);

        stop.stop();
        handle.await.unwrap();

        let cycles = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, MonitorEvent::CycleComplete(_)))
            .count();
        assert_eq!(cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_fetches() {
        let mock = Arc::new(MockAccountSource::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let poller = Poller::new(
            registry_of(&[("a", mock.clone())]),
            Duration::from_secs(5),
            tx,
        );
        let stop = poller.stop_handle();
        let handle = tokio::spawn(poller.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(stop.state(), PollerState::Running);

        let stopped_at = tokio::time::Instant::now();
        assert!(stop.stop());
        handle.await.unwrap();

        // The sleep is interrupted rather than waited out
        assert!(stopped_at.elapsed() < Duration::from_secs(5));
        assert_eq!(stop.state(), PollerState::Stopped);

        let calls = mock.call_count();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.call_count(), calls);
    }

    #[tokio::test]
    async fn test_stop_happens_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let poller = Poller::new(Arc::new(AccountRegistry::new()), Duration::from_secs(5), tx);
        let stop = poller.stop_handle();

        assert!(stop.stop());
        assert!(!stop.stop());
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test]
    async fn test_stopped_poller_does_not_fetch() {
        let mock = Arc::new(MockAccountSource::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let poller = Poller::new(registry_of(&[("a", mock.clone())]), Duration::from_secs(5), tx);

        poller.stop_handle().stop();
        poller.run().await;

        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_display_stops_poller() {
        let mock = Arc::new(MockAccountSource::new());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let poller = Poller::new(registry_of(&[("a", mock.clone())]), Duration::from_secs(5), tx);

        // Returns instead of looping forever
        poller.run().await;
        assert_eq!(mock.calls_for(DataKind::SpotBalance), 1);
    }
}
