//! # Binance Account Monitor
//!
//! Polls spot balances, futures balances and futures positions for several
//! Binance accounts on a fixed interval and renders one view per account.
//!
//! ## Architecture
//!
//! - `config`: Application settings and the accounts file
//! - `exchange`: Signed Binance REST client (one per account)
//! - `monitor`: Account registry and the polling loop
//! - `display`: Snapshot-fed account views and text rendering
//! - `utils`: Decimal formatting helpers

pub mod config;
pub mod display;
pub mod exchange;
pub mod monitor;
pub mod utils;

pub use config::Config;
