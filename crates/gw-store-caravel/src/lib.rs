use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use gw_api_types::{AccountId, StoreNodeConfig};
use gw_chain_client::WalletSession;
use gw_store_client::{FundReceipt, StoreConnector, UploadClient, UploadItem, UploadReceipt, UploadTag};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// HTTP connector for a Caravel upload node.
///
/// `open` issues `GET {node_url}/info` as the readiness check and verifies
/// the node accepts the configured payment token before a client is handed
/// out.
pub struct CaravelConnector {
    http: reqwest::Client,
}

impl Default for CaravelConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl CaravelConnector {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

// ── Caravel node REST API types ──────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    version: String,
    /// Payment address per accepted token symbol.
    addresses: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FundRequest {
    amount: String,
    from: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundResponse {
    tx_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    payer: String,
    content_type: String,
    data_base64: String,
    digest_sha256: String,
    tags: Vec<UploadTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    id: String,
    timestamp_epoch_ms: u128,
}

fn ensure_token_supported(node_url: &str, token: &str, info: &InfoResponse) -> Result<()> {
    if !info.addresses.contains_key(token) {
        bail!("caravel node {node_url} does not accept token `{token}`");
    }
    Ok(())
}

#[async_trait]
impl StoreConnector for CaravelConnector {
    async fn open(
        &self,
        config: &StoreNodeConfig,
        payer: Arc<dyn WalletSession>,
    ) -> Result<Arc<dyn UploadClient>> {
        config.validate()?;

        let node_url = config.node_url.trim_end_matches('/').to_owned();
        let url = format!("{node_url}/info");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("caravel info transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("caravel info HTTP {status}: {text}");
        }

        let info: InfoResponse = response.json().await.context("caravel info parse")?;
        ensure_token_supported(&node_url, &config.token, &info)?;
        debug!(node = %node_url, version = %info.version, "caravel node ready");

        Ok(Arc::new(CaravelClient {
            http: self.http.clone(),
            node_url,
            token: config.token.clone(),
            payer,
        }))
    }
}

/// Upload client bound to one node, one token, and one payer session.
pub struct CaravelClient {
    http: reqwest::Client,
    node_url: String,
    token: String,
    payer: Arc<dyn WalletSession>,
}

impl CaravelClient {
    fn payer_account(&self) -> Result<AccountId> {
        self.payer
            .account_id()
            .ok_or_else(|| anyhow!("payer session has no account; sign in first"))
    }
}

fn upload_request_body(payer: &AccountId, item: &UploadItem) -> UploadRequest {
    UploadRequest {
        payer: payer.0.clone(),
        content_type: item.content_type.clone(),
        data_base64: STANDARD.encode(&item.data),
        digest_sha256: hex_digest(&item.data),
        tags: item.tags.clone(),
    }
}

fn hex_digest(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    let mut output = String::with_capacity(hash.len() * 2);
    for byte in hash {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[async_trait]
impl UploadClient for CaravelClient {
    fn node_url(&self) -> &str {
        &self.node_url
    }

    fn token(&self) -> &str {
        &self.token
    }

    async fn price(&self, byte_len: u64) -> Result<String> {
        let url = format!("{}/price/{}/{byte_len}", self.node_url, self.token);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("caravel price transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("caravel price HTTP {status}: {text}");
        }

        let body: PriceResponse = response.json().await.context("caravel price parse")?;
        Ok(body.price)
    }

    async fn balance(&self) -> Result<String> {
        let account = self.payer_account()?;
        let url = format!(
            "{}/account/balance/{}?address={}",
            self.node_url, self.token, account.0
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("caravel balance transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("caravel balance HTTP {status}: {text}");
        }

        let body: BalanceResponse = response.json().await.context("caravel balance parse")?;
        Ok(body.balance)
    }

    async fn fund(&self, amount: &str) -> Result<FundReceipt> {
        let account = self.payer_account()?;
        let body = FundRequest {
            amount: amount.to_owned(),
            from: account.0,
        };

        let url = format!("{}/account/fund/{}", self.node_url, self.token);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("caravel fund transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("caravel fund HTTP {status}: {text}");
        }

        let confirmed: FundResponse = response.json().await.context("caravel fund parse")?;
        Ok(FundReceipt {
            tx_id: confirmed.tx_id,
            amount: body.amount,
            token: self.token.clone(),
        })
    }

    async fn upload(&self, item: UploadItem) -> Result<UploadReceipt> {
        let account = self.payer_account()?;
        let size = item.data.len() as u64;
        let body = upload_request_body(&account, &item);

        let url = format!("{}/tx/{}", self.node_url, self.token);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("caravel upload transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("caravel upload HTTP {status}: {text}");
        }

        let stored: UploadResponse = response.json().await.context("caravel upload parse")?;
        debug!(id = %stored.id, size, "caravel upload accepted");

        Ok(UploadReceipt {
            id: stored.id,
            size,
            timestamp_epoch_ms: stored.timestamp_epoch_ms,
        })
    }
}
