//! Display-side account state and its text rendering.
//!
//! The poller never touches this state directly. It publishes
//! [`MonitorEvent`]s; [`DisplayState::apply`] folds them in, replacing a
//! whole table at a time, and [`DisplayState::render`] draws one section
//! per account.

use crate::exchange::{
    DataKind, FuturesBalance, FuturesPosition, SpotBalance, Ticker24h, TickerPrice,
};
use crate::monitor::{AccountSnapshot, CycleStats, MonitorEvent};
use crate::utils::decimal::{format_amount, format_fixed, format_percent};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;
use tokio::sync::mpsc;
use tracing::debug;

/// Last-known data for one account.
#[derive(Debug, Clone, Default)]
pub struct AccountView {
    pub name: String,
    pub spot: Vec<SpotBalance>,
    pub futures: Vec<FuturesBalance>,
    pub positions: Vec<FuturesPosition>,
    /// Time of the most recent successful fetch of any kind
    pub updated_at: Option<DateTime<Utc>>,
    /// Latest error per kind, cleared by the next success for that kind
    pub errors: BTreeMap<DataKind, String>,
}

impl AccountView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn replace(&mut self, snapshot: AccountSnapshot, fetched_at: DateTime<Utc>) {
        self.errors.remove(&snapshot.kind());
        match snapshot {
            AccountSnapshot::Spot(spot) => self.spot = spot,
            AccountSnapshot::Futures(futures) => self.futures = futures,
            AccountSnapshot::Positions(positions) => self.positions = positions,
        }
        self.updated_at = Some(fetched_at);
    }

    fn record_error(&mut self, kind: DataKind, error: String) {
        self.errors.insert(kind, error);
    }
}

/// All account views, in tab order.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    accounts: Vec<AccountView>,
    last_cycle: Option<CycleStats>,
}

impl DisplayState {
    /// Create empty views for the given accounts.
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            accounts: names.into_iter().map(AccountView::new).collect(),
            last_cycle: None,
        }
    }

    pub fn account(&self, name: &str) -> Option<&AccountView> {
        self.accounts.iter().find(|a| a.name == name)
    }

    pub fn accounts(&self) -> &[AccountView] {
        &self.accounts
    }

    pub fn last_cycle(&self) -> Option<&CycleStats> {
        self.last_cycle.as_ref()
    }

    fn account_mut(&mut self, name: &str) -> &mut AccountView {
        if let Some(index) = self.accounts.iter().position(|a| a.name == name) {
            &mut self.accounts[index]
        } else {
            self.accounts.push(AccountView::new(name));
            let last = self.accounts.len() - 1;
            &mut self.accounts[last]
        }
    }

    /// Fold one event into the state. Returns true when a cycle finished and
    /// the view should be redrawn.
    pub fn apply(&mut self, event: MonitorEvent) -> bool {
        match event {
            MonitorEvent::Snapshot {
                account,
                snapshot,
                fetched_at,
            } => {
                self.account_mut(&account).replace(snapshot, fetched_at);
                false
            }
            MonitorEvent::FetchFailed {
                account,
                kind,
                error,
            } => {
                self.account_mut(&account).record_error(kind, error);
                false
            }
            MonitorEvent::CycleComplete(stats) => {
                self.last_cycle = Some(stats);
                true
            }
        }
    }

    /// Render every account as a block of three tables.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for view in &self.accounts {
            let updated = view
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            let _ = writeln!(out, "══ {} ══ (updated {})", view.name, updated);

            let _ = writeln!(out, "  Spot balances");
            let _ = writeln!(out, "    {:<10}{:>20}{:>20}", "ASSET", "FREE", "LOCKED");
            for b in &view.spot {
                let _ = writeln!(
                    out,
                    "    {:<10}{:>20}{:>20}",
                    b.asset,
                    format_amount(b.free),
                    format_amount(b.locked)
                );
            }

            let _ = writeln!(out, "  Futures balances");
            let _ = writeln!(out, "    {:<10}{:>20}{:>20}", "ASSET", "BALANCE", "AVAILABLE");
            for b in &view.futures {
                let _ = writeln!(
                    out,
                    "    {:<10}{:>20}{:>20}",
                    b.asset,
                    format_amount(b.balance),
                    format_amount(b.available_balance)
                );
            }

            let _ = writeln!(out, "  Futures positions");
            let _ = writeln!(
                out,
                "    {:<14}{:>14}{:>16}{:>16}{:>14}",
                "SYMBOL", "AMOUNT", "ENTRY", "MARK", "UNREAL. PNL"
            );
            for p in &view.positions {
                let _ = writeln!(
                    out,
                    "    {:<14}{:>14}{:>16}{:>16}{:>14}",
                    p.symbol,
                    format_amount(p.position_amt),
                    format_amount(p.entry_price),
                    format_amount(p.mark_price),
                    format_fixed(p.unrealized_profit, 2)
                );
            }

            for (kind, error) in &view.errors {
                let _ = writeln!(out, "  ⚠ {}: {}", kind, error);
            }
            out.push('\n');
        }

        if let Some(stats) = &self.last_cycle {
            let _ = writeln!(
                out,
                "Cycle #{}: {} ok, {} failed in {:.1}s",
                stats.cycle,
                stats.succeeded,
                stats.failed,
                stats.elapsed.as_secs_f64()
            );
        }

        out
    }
}

/// Consume poller events until the channel closes, calling `on_cycle` after
/// each completed cycle. Returns the final state.
pub async fn consume(
    mut events: mpsc::UnboundedReceiver<MonitorEvent>,
    mut state: DisplayState,
    mut on_cycle: impl FnMut(&DisplayState),
) -> DisplayState {
    while let Some(event) = events.recv().await {
        if state.apply(event) {
            on_cycle(&state);
        }
    }
    debug!("Event channel closed");
    state
}

/// Render a price list.
pub fn render_prices(prices: &[TickerPrice]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16}{:>20}", "SYMBOL", "PRICE");
    for p in prices {
        let _ = writeln!(out, "{:<16}{:>20}", p.symbol, format_amount(p.price));
    }
    out
}

/// Render the top and bottom `top` tickers of a list sorted by percent change.
pub fn render_movers(tickers: &[Ticker24h], top: usize) -> String {
    let mut out = String::new();
    let row = |out: &mut String, t: &Ticker24h| {
        let _ = writeln!(
            out,
            "{:<16}{:>12}{:>20}{:>22}",
            t.symbol,
            format_percent(t.price_change_percent),
            format_amount(t.last_price),
            format_fixed(t.quote_volume, 0)
        );
    };

    let _ = writeln!(
        out,
        "{:<16}{:>12}{:>20}{:>22}",
        "SYMBOL", "24H %", "LAST", "QUOTE VOLUME"
    );
    let _ = writeln!(out, "-- Gainers");
    for t in tickers.iter().take(top) {
        row(&mut out, t);
    }
    let _ = writeln!(out, "-- Losers");
    let skip = tickers.len().saturating_sub(top).max(top.min(tickers.len()));
    for t in tickers.iter().skip(skip).rev() {
        row(&mut out, t);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn position(symbol: &str, pnl: rust_decimal::Decimal) -> FuturesPosition {
        FuturesPosition {
            symbol: symbol.to_string(),
            position_amt: dec!(-0.010),
            entry_price: dec!(65000.0),
            mark_price: dec!(64000.5),
            unrealized_profit: pnl,
        }
    }

    fn snapshot(account: &str, snapshot: AccountSnapshot) -> MonitorEvent {
        MonitorEvent::Snapshot {
            account: account.to_string(),
            snapshot,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_replaces_whole_table() {
        let mut state = DisplayState::new(vec!["main".to_string()]);
        state.apply(snapshot(
            "main",
            AccountSnapshot::Positions(vec![position("BTCUSDT", dec!(1)), position("ETHUSDT", dec!(2))]),
        ));
        state.apply(snapshot(
            "main",
            AccountSnapshot::Positions(vec![position("SOLUSDT", dec!(3))]),
        ));

        let view = state.account("main").unwrap();
        assert_eq!(view.positions.len(), 1);
        assert_eq!(view.positions[0].symbol, "SOLUSDT");
    }

    #[test]
    fn test_failure_keeps_last_known_value() {
        let mut state = DisplayState::new(vec!["main".to_string()]);
        state.apply(snapshot(
            "main",
            AccountSnapshot::Positions(vec![position("BTCUSDT", dec!(1))]),
        ));
        state.apply(MonitorEvent::FetchFailed {
            account: "main".to_string(),
            kind: DataKind::FuturesPositions,
            error: "HTTP 500: oops".to_string(),
        });

        let view = state.account("main").unwrap();
        assert_eq!(view.positions.len(), 1);
        assert_eq!(view.errors.len(), 1);

        // The next success clears the error
        state.apply(snapshot("main", AccountSnapshot::Positions(Vec::new())));
        let view = state.account("main").unwrap();
        assert!(view.positions.is_empty());
        assert!(view.errors.is_empty());
    }

    #[test]
    fn test_cycle_complete_requests_redraw() {
        let mut state = DisplayState::new(Vec::new());
        assert!(!state.apply(snapshot("late", AccountSnapshot::Spot(Vec::new()))));
        assert!(state.apply(MonitorEvent::CycleComplete(CycleStats {
            cycle: 1,
            accounts: 1,
            succeeded: 1,
            failed: 0,
            elapsed: Duration::from_millis(250),
        })));
        assert_eq!(state.accounts().len(), 1);
        assert_eq!(state.last_cycle().unwrap().cycle, 1);
    }

    #[test]
    fn test_render_formats_pnl_to_two_decimals() {
        let mut state = DisplayState::new(vec!["main".to_string()]);
        state.apply(snapshot(
            "main",
            AccountSnapshot::Positions(vec![position("BTCUSDT", dec!(10.00500000))]),
        ));
        state.apply(snapshot(
            "main",
            AccountSnapshot::Spot(vec![SpotBalance {
                asset: "BTC".to_string(),
                free: dec!(0.50000000),
                locked: dec!(0),
            }]),
        ));

        let rendered = state.render();
        assert!(rendered.contains("══ main ══"));
        assert!(rendered.contains("10.01"));
        assert!(rendered.contains("-0.01"));
        assert!(rendered.contains("0.5"));
        assert!(!rendered.contains("0.50000000"));
    }

    #[test]
    fn test_render_movers_splits_gainers_and_losers() {
        let ticker = |symbol: &str, pct| Ticker24h {
            symbol: symbol.to_string(),
            price_change: dec!(1),
            price_change_percent: pct,
            last_price: dec!(10),
            volume: dec!(100),
            quote_volume: dec!(1000),
        };
        let tickers = vec![
            ticker("AUSDT", dec!(12)),
            ticker("BUSDT", dec!(5)),
            ticker("CUSDT", dec!(0)),
            ticker("DUSDT", dec!(-4)),
            ticker("EUSDT", dec!(-9)),
        ];

        let rendered = render_movers(&tickers, 2);
        let losers = rendered.split("-- Losers").nth(1).unwrap();
        assert!(losers.contains("EUSDT") && losers.contains("DUSDT"));
        assert!(!losers.contains("CUSDT"));
        assert!(losers.find("EUSDT") < losers.find("DUSDT"));
    }

    #[tokio::test]
    async fn test_consume_redraws_per_cycle() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(snapshot("main", AccountSnapshot::Spot(Vec::new())))
            .unwrap();
        tx.send(MonitorEvent::CycleComplete(CycleStats::default()))
            .unwrap();
        tx.send(MonitorEvent::CycleComplete(CycleStats::default()))
            .unwrap();
        drop(tx);

        let mut redraws = 0;
        let state = consume(rx, DisplayState::new(vec!["main".to_string()]), |_| {
            redraws += 1
        })
        .await;

        assert_eq!(redraws, 2);
        assert!(state.account("main").unwrap().updated_at.is_some());
    }
}
