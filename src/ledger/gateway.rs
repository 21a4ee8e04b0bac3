//! Signing gateway client
//!
//! The gateway holds the signing key, encodes contract calls and waits for
//! finality. This client only speaks its HTTP JSON API:
//!
//! - `GET  /accounts/{addr}/balance`
//! - `GET  /tokens/{token}/balances/{owner}`
//! - `GET  /tokens/{token}/allowances/{owner}/{spender}`
//! - `POST /tokens/{token}/approve`
//! - `POST /dex/{router}/exact-input-single`
//! - `POST /dex/{manager}/mint`
//! - `GET|POST /dex/{manager}/pools`
//! - `POST /storage/upload`
//!
//! Connection-level failures on reads are retried with a short exponential
//! backoff. Writes are submitted exactly once: a 5xx after the gateway has
//! broadcast would otherwise resubmit the same transaction.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    u128_string, ArtifactStore, BalanceReader, LedgerActions, MintParams, MintReceipt, SwapParams,
    TokenBalance, TxReceipt,
};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Header carrying the gateway API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the uploaded file name
pub const FILE_NAME_HEADER: &str = "x-file-name";

#[derive(Debug, Deserialize)]
struct NativeBalanceResponse {
    balance: String,
}

#[derive(Debug, Deserialize)]
struct TokenBalanceResponse {
    balance: String,
    symbol: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct AllowanceResponse {
    #[serde(with = "u128_string")]
    allowance: u128,
}

#[derive(Debug, Deserialize)]
struct PoolLookupResponse {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    tx_hashes: Vec<String>,
}

/// Error body returned by the gateway on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct ApproveRequest<'a> {
    spender: &'a str,
    #[serde(with = "u128_string")]
    amount: u128,
}

#[derive(Debug, Serialize)]
struct CreatePoolRequest<'a> {
    token0: &'a str,
    token1: &'a str,
    fee: u32,
    #[serde(with = "u128_string")]
    sqrt_price_x96: u128,
}

/// HTTP client for the signing gateway
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
    signer: String,
    timeout_ms: u64,
    transport_retry: Duration,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(config: &GatewayConfig, signer: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("Gateway client initialized for {}", config.url);

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            signer: signer.into(),
            timeout_ms: config.timeout_ms,
            transport_retry: Duration::from_millis(config.transport_retry_ms),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        if self.api_key.is_empty() {
            builder
        } else {
            builder.header(API_KEY_HEADER, &self.api_key)
        }
    }

    /// Send a read request built by `build`, retrying transient transport failures
    async fn send_json<T, F>(&self, what: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: self.transport_retry,
            max_elapsed_time: Some(self.transport_retry),
            ..Default::default()
        };

        retry(backoff, || async {
            match self.send_once(what, build()).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!("Transient gateway error on {}: {}", what, e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    /// Submit a write request once; re-attempts belong to the caller
    async fn submit_json<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        self.send_once(what, request).await.map_err(|e| {
            if e.is_retryable() {
                warn!("Gateway error on {} (not resubmitted): {}", what, e);
            }
            e
        })
    }

    async fn send_once<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        debug!("Gateway request: {}", what);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::GatewayTimeout(self.timeout_ms)
            } else {
                Error::Gateway(format!("{} request failed: {}", what, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(if status.is_server_error() {
                Error::Gateway(format!("{} failed with {}: {}", what, status, message))
            } else {
                Error::ExternalCall(format!("{} rejected with {}: {}", what, status, message))
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Deserialization(format!("Failed to parse {} response: {}", what, e)))
    }

    /// Check that the gateway answers, returning the round-trip latency
    pub async fn health_check(&self) -> Result<Duration> {
        let start = std::time::Instant::now();
        self.native_balance(&self.signer).await?;
        Ok(start.elapsed())
    }
}

fn parse_decimal(what: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| Error::Deserialization(format!("Invalid {} '{}': {}", what, value, e)))
}

#[async_trait]
impl BalanceReader for GatewayClient {
    async fn native_balance(&self, address: &str) -> Result<f64> {
        let path = format!("/accounts/{}/balance", address);
        let response: NativeBalanceResponse = self
            .send_json("native balance", || self.request(Method::GET, &path))
            .await?;
        parse_decimal("balance", &response.balance)
    }

    async fn token_balance(&self, token: &str, owner: &str) -> Result<TokenBalance> {
        let path = format!("/tokens/{}/balances/{}", token, owner);
        let response: TokenBalanceResponse = self
            .send_json("token balance", || self.request(Method::GET, &path))
            .await?;
        Ok(TokenBalance {
            amount: parse_decimal("token balance", &response.balance)?,
            symbol: response.symbol,
            decimals: response.decimals,
        })
    }
}

#[async_trait]
impl LedgerActions for GatewayClient {
    fn signer_address(&self) -> &str {
        &self.signer
    }

    async fn allowance(&self, token: &str, owner: &str, spender: &str) -> Result<u128> {
        let path = format!("/tokens/{}/allowances/{}/{}", token, owner, spender);
        let response: AllowanceResponse = self
            .send_json("allowance", || self.request(Method::GET, &path))
            .await?;
        Ok(response.allowance)
    }

    async fn approve(&self, token: &str, spender: &str, amount: u128) -> Result<TxReceipt> {
        let path = format!("/tokens/{}/approve", token);
        let body = ApproveRequest { spender, amount };
        self.submit_json("approve", self.request(Method::POST, &path).json(&body))
            .await
    }

    async fn swap_exact_input_single(&self, router: &str, params: &SwapParams) -> Result<TxReceipt> {
        let path = format!("/dex/{}/exact-input-single", router);
        self.submit_json("swap", self.request(Method::POST, &path).json(params))
            .await
    }

    async fn mint_position(&self, manager: &str, params: &MintParams) -> Result<MintReceipt> {
        let path = format!("/dex/{}/mint", manager);
        self.submit_json("mint", self.request(Method::POST, &path).json(params))
            .await
    }

    async fn pool_exists(&self, manager: &str, token0: &str, token1: &str, fee: u32) -> Result<bool> {
        let path = format!("/dex/{}/pools", manager);
        let fee = fee.to_string();
        let response: PoolLookupResponse = self
            .send_json("pool lookup", || {
                self.request(Method::GET, &path).query(&[
                    ("token0", token0),
                    ("token1", token1),
                    ("fee", fee.as_str()),
                ])
            })
            .await?;
        Ok(response.exists)
    }

    async fn create_pool(
        &self,
        manager: &str,
        token0: &str,
        token1: &str,
        fee: u32,
        sqrt_price_x96: u128,
    ) -> Result<TxReceipt> {
        let path = format!("/dex/{}/pools", manager);
        let body = CreatePoolRequest {
            token0,
            token1,
            fee,
            sqrt_price_x96,
        };
        self.submit_json("create pool", self.request(Method::POST, &path).json(&body))
            .await
    }
}

#[async_trait]
impl ArtifactStore for GatewayClient {
    async fn upload(&self, path: &Path) -> Result<Vec<String>> {
        info!("Starting upload: {}", path.display());

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());

        let response: UploadResponse = self
            .submit_json(
                "upload",
                self.request(Method::POST, "/storage/upload")
                    .header(FILE_NAME_HEADER, &file_name)
                    .body(bytes),
            )
            .await?;

        Ok(response.tx_hashes)
    }
}
