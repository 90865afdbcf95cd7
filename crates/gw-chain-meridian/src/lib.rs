use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use gw_api_types::{AccountId, ChainNetworkConfig, KeyStoreKind, NetworkId};
use gw_chain_client::{SignInRedirect, SignInRequest, WalletConnector, WalletSession};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// HTTP connector for a Meridian chain gateway.
///
/// `connect` issues `GET {node_url}/status` as the readiness check and
/// verifies the gateway serves the configured network before a session is
/// handed out.
pub struct MeridianConnector {
    http: reqwest::Client,
}

impl Default for MeridianConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MeridianConnector {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

// ── Meridian gateway REST API types ──────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    chain_id: String,
    latest_block_height: u64,
}

fn ensure_expected_network(expected: &NetworkId, reported: &str) -> Result<()> {
    if reported != expected.0 {
        bail!(
            "meridian gateway reports chain `{reported}` but configuration expects `{}`",
            expected.0
        );
    }
    Ok(())
}

#[async_trait]
impl WalletConnector for MeridianConnector {
    async fn connect(&self, config: &ChainNetworkConfig) -> Result<Arc<dyn WalletSession>> {
        config.validate()?;

        let url = format!("{}/status", config.node_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("meridian status transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("meridian status HTTP {status}: {text}");
        }

        let body: StatusResponse = response.json().await.context("meridian status parse")?;
        ensure_expected_network(&config.network_id, &body.chain_id)?;
        debug!(
            network = %config.network_id.0,
            height = body.latest_block_height,
            "meridian gateway ready"
        );

        let store: Arc<dyn SessionStore> = match &config.key_store {
            KeyStoreKind::InMemory => Arc::new(InMemorySessionStore::default()),
            KeyStoreKind::File { dir } => Arc::new(FileSessionStore::new(dir.clone())),
        };

        Ok(Arc::new(MeridianSession::restore(config.clone(), store)?))
    }
}

/// Wallet session for one Meridian network.
///
/// Sign-in itself happens on the hosted web wallet; the session builds the
/// authorization URL, records completions through the selected session
/// store, and answers the derived read operations locally.
pub struct MeridianSession {
    config: ChainNetworkConfig,
    store: Arc<dyn SessionStore>,
    account: RwLock<Option<AccountId>>,
}

impl MeridianSession {
    /// Build a session, restoring any account the store remembers for this
    /// network.
    pub(crate) fn restore(config: ChainNetworkConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        let account = store.load(&config.network_id)?;
        Ok(Self {
            config,
            store,
            account: RwLock::new(account),
        })
    }

    fn login_url(&self, request: &SignInRequest, request_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.wallet_url).context("meridian wallet_url parse")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("meridian wallet_url cannot be a base"))?
            .pop_if_empty()
            .push("login");

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("network", &self.config.network_id.0);
            query.append_pair("requestId", request_id);
            if let Some(title) = &request.app_title {
                query.append_pair("title", title);
            }
            if let Some(success_url) = &request.success_url {
                query.append_pair("successUrl", success_url);
            }
            if let Some(failure_url) = &request.failure_url {
                query.append_pair("failureUrl", failure_url);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl WalletSession for MeridianSession {
    fn network_id(&self) -> &NetworkId {
        &self.config.network_id
    }

    fn account_id(&self) -> Option<AccountId> {
        self.account.read().expect("session account lock").clone()
    }

    fn is_signed_in(&self) -> bool {
        self.account_id().is_some()
    }

    fn explorer_account_url(&self, account: &AccountId) -> String {
        format!(
            "{}/accounts/{}",
            self.config.explorer_url.trim_end_matches('/'),
            account.0
        )
    }

    async fn request_sign_in(&self, request: SignInRequest) -> Result<SignInRedirect> {
        let request_id = Uuid::new_v4().to_string();
        let url = self.login_url(&request, &request_id)?;
        debug!(request_id = %request_id, "meridian sign-in redirect built");

        Ok(SignInRedirect {
            url: url.into(),
            request_id,
        })
    }

    async fn complete_sign_in(&self, account: AccountId) -> Result<()> {
        self.store.save(&self.config.network_id, &account)?;
        *self.account.write().expect("session account lock") = Some(account);
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.store.clear(&self.config.network_id)?;
        *self.account.write().expect("session account lock") = None;
        Ok(())
    }
}

// ── Session stores ───────────────────────────────────────────────────

/// Persistence behind the `key_store` selector: remembers which account is
/// signed in per network.
pub trait SessionStore: Send + Sync {
    fn load(&self, network: &NetworkId) -> Result<Option<AccountId>>;
    fn save(&self, network: &NetworkId, account: &AccountId) -> Result<()>;
    fn clear(&self, network: &NetworkId) -> Result<()>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, AccountId>>,
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, network: &NetworkId) -> Result<Option<AccountId>> {
        let guard = self.entries.read().expect("session store lock");
        Ok(guard.get(&network.0).cloned())
    }

    fn save(&self, network: &NetworkId, account: &AccountId) -> Result<()> {
        let mut guard = self.entries.write().expect("session store lock");
        guard.insert(network.0.clone(), account.clone());
        Ok(())
    }

    fn clear(&self, network: &NetworkId) -> Result<()> {
        let mut guard = self.entries.write().expect("session store lock");
        guard.remove(&network.0);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    account_id: String,
}

/// One JSON file per network under `dir`.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, network: &NetworkId) -> PathBuf {
        self.dir.join(format!("session-{}.json", network.0))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, network: &NetworkId) -> Result<Option<AccountId>> {
        let path = self.path_for(network);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        let record: SessionRecord = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse session file {}", path.display()))?;
        Ok(Some(AccountId(record.account_id)))
    }

    fn save(&self, network: &NetworkId, account: &AccountId) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create session dir {}", self.dir.display()))?;

        let record = SessionRecord {
            account_id: account.0.clone(),
        };
        let path = self.path_for(network);
        fs::write(&path, serde_json::to_vec_pretty(&record)?)
            .with_context(|| format!("failed to write session file {}", path.display()))?;
        Ok(())
    }

    fn clear(&self, network: &NetworkId) -> Result<()> {
        let path = self.path_for(network);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove session file {}", path.display()))?;
        }
        Ok(())
    }
}
