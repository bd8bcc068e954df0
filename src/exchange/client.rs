//! Binance REST API client.

use crate::config::{AccountCredential, ExchangeConfig};
use crate::exchange::error::{ApiError, ApiResult};
use crate::exchange::traits::AccountDataSource;
use crate::exchange::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Proxy, Response, StatusCode};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const SPOT_ACCOUNT_ENDPOINT: &str = "/api/v3/account";
const FUTURES_BALANCE_ENDPOINT: &str = "/fapi/v2/balance";
const FUTURES_POSITION_RISK_ENDPOINT: &str = "/fapi/v2/positionRisk";
const FUTURES_TICKER_PRICE_ENDPOINT: &str = "/fapi/v1/ticker/price";
const FUTURES_TICKER_24H_ENDPOINT: &str = "/fapi/v1/ticker/24hr";

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Encode parameters as an `application/x-www-form-urlencoded` query string,
/// keeping the given order.
pub fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Form encoding differs from percent encoding only in spaces.
fn form_encode(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

/// HMAC-SHA256 of `query` keyed by `secret`, as lowercase hex.
pub fn sign_query(secret: &str, query: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Binance API client bound to one account's credentials and proxy.
pub struct BinanceClient {
    http: Client,
    account: String,
    api_key: String,
    secret_key: String,
    futures_base_url: String,
    spot_base_url: String,
}

impl BinanceClient {
    /// Create a client for `account`.
    ///
    /// The account's own proxy wins over `config.default_proxy`.
    pub fn new(config: &ExchangeConfig, account: &AccountCredential) -> Result<Self> {
        let proxy = account.proxy.as_deref().or(config.default_proxy.as_deref());

        let mut builder =
            Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy)
                .with_context(|| format!("Invalid proxy URL for account '{}'", account.name))?;
            builder = builder.proxy(proxy);
        }
        let http = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            account: account.name.clone(),
            api_key: account.api_key.clone(),
            secret_key: account.api_secret.clone(),
            futures_base_url: config.futures_base_url.trim_end_matches('/').to_string(),
            spot_base_url: config.spot_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client for public market data only.
    pub fn public(config: &ExchangeConfig) -> Result<Self> {
        let anonymous = AccountCredential {
            name: "public".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            proxy: None,
        };
        Self::new(config, &anonymous)
    }

    /// Name of the account this client signs for.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Generate HMAC-SHA256 signature for authenticated requests.
    fn sign(&self, query_string: &str) -> String {
        sign_query(&self.secret_key, query_string)
    }

    /// Get current timestamp in milliseconds.
    fn timestamp() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Issue a signed GET. The timestamp is taken here, right before signing.
    async fn signed_get<T: DeserializeOwned>(
        &self,
        base_url: &str,
        endpoint: &str,
        mut params: Vec<(&str, String)>,
    ) -> ApiResult<T> {
        params.push(("timestamp", Self::timestamp().to_string()));
        let query = encode_params(&params);
        let signature = self.sign(&query);

        let url = format!("{}{}?{}&signature={}", base_url, endpoint, query, signature);

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn public_get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        let url = format!("{}{}", self.futures_base_url, endpoint);
        let response = self.http.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Collapse a failed call into "no data", logging why.
    fn absent_on_error<T>(&self, what: &str, result: ApiResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) if e.is_timeout() => {
                warn!(account = %self.account, "Timed out fetching {}", what);
                None
            }
            Err(e) => {
                warn!(account = %self.account, error = %e, "Failed to fetch {}", what);
                None
            }
        }
    }

    // ==================== Account (Authenticated) ====================

    /// Spot balances holding a non-zero free or locked amount.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn fetch_spot_balance(&self) -> ApiResult<Vec<SpotBalance>> {
        let info: SpotAccountInfo = self
            .signed_get(&self.spot_base_url, SPOT_ACCOUNT_ENDPOINT, Vec::new())
            .await?;

        let balances: Vec<SpotBalance> = info
            .balances
            .into_iter()
            .filter(SpotBalance::is_nonzero)
            .collect();

        debug!("Fetched {} non-zero spot balances", balances.len());
        Ok(balances)
    }

    /// Futures wallet balances, one per asset.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn fetch_futures_balance(&self) -> ApiResult<Vec<FuturesBalance>> {
        let balances: Vec<FuturesBalance> = self
            .signed_get(&self.futures_base_url, FUTURES_BALANCE_ENDPOINT, Vec::new())
            .await?;

        debug!("Fetched {} futures balances", balances.len());
        Ok(balances)
    }

    /// Open futures positions.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn fetch_futures_positions(&self) -> ApiResult<Vec<FuturesPosition>> {
        let positions: Vec<FuturesPosition> = self
            .signed_get(
                &self.futures_base_url,
                FUTURES_POSITION_RISK_ENDPOINT,
                Vec::new(),
            )
            .await?;

        let open: Vec<FuturesPosition> = positions
            .into_iter()
            .filter(FuturesPosition::is_open)
            .collect();

        debug!("Fetched {} open futures positions", open.len());
        Ok(open)
    }

    /// Get spot balances, or `None` if the request failed.
    pub async fn get_spot_balance(&self) -> Option<Vec<SpotBalance>> {
        let result = self.fetch_spot_balance().await;
        self.absent_on_error("spot balance", result)
    }

    /// Get futures balances, or `None` if the request failed.
    pub async fn get_futures_balance(&self) -> Option<Vec<FuturesBalance>> {
        let result = self.fetch_futures_balance().await;
        self.absent_on_error("futures balance", result)
    }

    /// Get open futures positions, or `None` if the request failed.
    pub async fn get_futures_positions(&self) -> Option<Vec<FuturesPosition>> {
        let result = self.fetch_futures_positions().await;
        self.absent_on_error("futures positions", result)
    }

    // ==================== Market Data (Public) ====================

    /// Latest futures prices, restricted to `symbols` when given.
    #[instrument(skip(self))]
    pub async fn fetch_futures_prices(
        &self,
        symbols: Option<&[&str]>,
    ) -> ApiResult<Vec<TickerPrice>> {
        let prices: Vec<TickerPrice> = self.public_get(FUTURES_TICKER_PRICE_ENDPOINT).await?;

        Ok(match symbols {
            Some(wanted) => prices
                .into_iter()
                .filter(|p| wanted.contains(&p.symbol.as_str()))
                .collect(),
            None => prices,
        })
    }

    /// 24-hour tickers, biggest percent gainers first.
    #[instrument(skip(self))]
    pub async fn fetch_futures_24h_tickers(&self) -> ApiResult<Vec<Ticker24h>> {
        let mut tickers: Vec<Ticker24h> = self.public_get(FUTURES_TICKER_24H_ENDPOINT).await?;
        tickers.sort_by(|a, b| b.price_change_percent.cmp(&a.price_change_percent));
        Ok(tickers)
    }

    /// Get futures prices, or `None` if the request failed.
    pub async fn get_futures_prices(&self, symbols: Option<&[&str]>) -> Option<Vec<TickerPrice>> {
        let result = self.fetch_futures_prices(symbols).await;
        self.absent_on_error("futures prices", result)
    }

    /// Get sorted 24h tickers, or `None` if the request failed.
    pub async fn get_futures_24h_tickers(&self) -> Option<Vec<Ticker24h>> {
        let result = self.fetch_futures_24h_tickers().await;
        self.absent_on_error("24h tickers", result)
    }
}

#[async_trait]
impl AccountDataSource for BinanceClient {
    async fn spot_balance(&self) -> ApiResult<Vec<SpotBalance>> {
        self.fetch_spot_balance().await
    }

    async fn futures_balance(&self) -> ApiResult<Vec<FuturesBalance>> {
        self.fetch_futures_balance().await
    }

    async fn futures_positions(&self) -> ApiResult<Vec<FuturesPosition>> {
        self.fetch_futures_positions().await
    }
}
