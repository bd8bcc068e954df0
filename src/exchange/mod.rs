//! Binance exchange integration.
//!
//! Provides a REST client per account for:
//! - Spot balances, futures balances and futures positions (signed)
//! - Futures ticker prices and 24h statistics (public)
//!
//! Every signed request carries a fresh millisecond timestamp and an
//! HMAC-SHA256 signature of its query string.

mod client;
mod error;
pub mod mock;
mod traits;
mod types;

pub use client::{encode_params, sign_query, BinanceClient};
pub use error::{ApiError, ApiResult};
pub use mock::MockAccountSource;
pub use traits::{AccountDataSource, DataKind};
pub use types::*;
