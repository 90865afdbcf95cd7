//! Startup orchestration for the Gangway backend clients.
//!
//! [`Bootstrap`] owns one [`ClientSlot`] per backend client: the Meridian
//! wallet session and the Caravel upload client. Connectors are injected as
//! trait objects, so real HTTP adapters and in-process fakes wire up the same
//! way. Once the slots a module needs are ready, [`Bootstrap::launch`] hands
//! an [`AppContext`] to the application module and gets out of the way.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use gw_api_types::{AccountId, ChainNetworkConfig, StoreNodeConfig};
use gw_chain_client::{SignInRedirect, SignInRequest, WalletConnector, WalletSession};
use gw_client_slot::{ClientSlot, ReadyState, SlotError};
use gw_store_client::{FundReceipt, StoreConnector, UploadClient, UploadItem, UploadReceipt};
use thiserror::Error;
use tracing::{debug, info};

pub mod env;

pub use env::{AppConfig, EnvSnapshot};

/// Slot names, as they appear in errors and logs.
pub const WALLET_SLOT: &str = "wallet";
pub const STORAGE_SLOT: &str = "storage";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// A wallet operation failed after the session was established.
    #[error("wallet operation failed: {0}")]
    Wallet(#[source] anyhow::Error),

    /// A storage operation failed after the upload client was established.
    #[error("storage operation failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// Readiness of both slots at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootStatus {
    pub wallet: ReadyState,
    pub storage: ReadyState,
}

/// Owns the client slots and the connectors that fill them.
///
/// The wallet slot has no prerequisites. The storage slot requires a ready
/// wallet, because the upload client charges the signed-in account; calling
/// [`Bootstrap::ensure_store`] first fails with `NotInitialized` for the
/// wallet slot and leaves the storage slot untouched.
pub struct Bootstrap {
    wallet_connector: Arc<dyn WalletConnector>,
    store_connector: Arc<dyn StoreConnector>,
    wallet: ClientSlot<dyn WalletSession>,
    store: ClientSlot<dyn UploadClient>,
}

impl Bootstrap {
    pub fn new(
        wallet_connector: Arc<dyn WalletConnector>,
        store_connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            wallet_connector,
            store_connector,
            wallet: ClientSlot::new(WALLET_SLOT),
            store: ClientSlot::new(STORAGE_SLOT),
        }
    }

    /// Connect the wallet session unless one is already stored.
    ///
    /// Safe to call from any number of tasks; the slot guarantees the
    /// connector runs at most once per successful initialization, and a
    /// failed attempt leaves the slot open for retry.
    pub async fn ensure_wallet(&self, config: &ChainNetworkConfig) -> Result<(), BootstrapError> {
        self.wallet
            .ensure_initialized(|| async move {
                let session = self.wallet_connector.connect(config).await?;
                info!(
                    slot = self.wallet.name(),
                    network = %session.network_id().0,
                    account = ?session.account_id(),
                    "wallet client connected"
                );
                Ok(session)
            })
            .await?;
        Ok(())
    }

    /// Open the upload client unless one is already stored. Requires
    /// [`Bootstrap::ensure_wallet`] to have completed, since the wallet
    /// session pays for uploads.
    pub async fn ensure_store(&self, config: &StoreNodeConfig) -> Result<(), BootstrapError> {
        let payer = self.wallet.get()?;
        self.store
            .ensure_initialized(|| async move {
                let client = self.store_connector.open(config, payer).await?;
                info!(
                    slot = self.store.name(),
                    node = %config.node_url,
                    token = %config.token,
                    "upload client connected"
                );
                Ok(client)
            })
            .await?;
        Ok(())
    }

    pub fn wallet_state(&self) -> ReadyState {
        self.wallet.state()
    }

    pub fn store_state(&self) -> ReadyState {
        self.store.state()
    }

    pub fn status(&self) -> BootStatus {
        BootStatus {
            wallet: self.wallet.state(),
            storage: self.store.state(),
        }
    }

    /// The stored wallet session, or `NotInitialized`.
    pub fn session(&self) -> Result<Arc<dyn WalletSession>, BootstrapError> {
        Ok(self.wallet.get()?)
    }

    /// The stored upload client, or `NotInitialized`.
    pub fn uploader(&self) -> Result<Arc<dyn UploadClient>, BootstrapError> {
        Ok(self.store.get()?)
    }

    pub fn is_signed_in(&self) -> Result<bool, BootstrapError> {
        Ok(self.session()?.is_signed_in())
    }

    pub fn account_id(&self) -> Result<Option<AccountId>, BootstrapError> {
        Ok(self.session()?.account_id())
    }

    pub async fn request_sign_in(
        &self,
        request: SignInRequest,
    ) -> Result<SignInRedirect, BootstrapError> {
        self.session()?
            .request_sign_in(request)
            .await
            .map_err(BootstrapError::Wallet)
    }

    pub async fn complete_sign_in(&self, account: AccountId) -> Result<(), BootstrapError> {
        self.session()?
            .complete_sign_in(account)
            .await
            .map_err(BootstrapError::Wallet)
    }

    pub async fn sign_out(&self) -> Result<(), BootstrapError> {
        self.session()?.sign_out().await.map_err(BootstrapError::Wallet)
    }

    /// Quote the upload cost of `byte_len` bytes, in atomic token units.
    pub async fn upload_price(&self, byte_len: u64) -> Result<String, BootstrapError> {
        self.uploader()?
            .price(byte_len)
            .await
            .map_err(BootstrapError::Store)
    }

    pub async fn store_balance(&self) -> Result<String, BootstrapError> {
        self.uploader()?.balance().await.map_err(BootstrapError::Store)
    }

    pub async fn fund_store(&self, amount: &str) -> Result<FundReceipt, BootstrapError> {
        self.uploader()?
            .fund(amount)
            .await
            .map_err(BootstrapError::Store)
    }

    pub async fn upload(&self, item: UploadItem) -> Result<UploadReceipt, BootstrapError> {
        self.uploader()?
            .upload(item)
            .await
            .map_err(BootstrapError::Store)
    }

    /// Capture the process environment and hand control to `module`.
    pub async fn launch<M: AppModule>(self: Arc<Self>, module: M) -> Result<()> {
        let env = EnvSnapshot::capture();
        self.launch_with_env(module, env).await
    }

    /// Hand control to `module` with an explicit environment snapshot.
    ///
    /// The module decides which slots it needs and calls the `ensure_*`
    /// methods itself, so a module that never uploads never pays for a
    /// storage connection.
    pub async fn launch_with_env<M: AppModule>(
        self: Arc<Self>,
        module: M,
        env: EnvSnapshot,
    ) -> Result<()> {
        debug!(vars = env.len(), "handing control to application module");
        module.run(AppContext { env, boot: self }).await
    }
}

/// Everything a module gets at launch: the environment snapshot taken at
/// startup and the shared [`Bootstrap`].
#[derive(Clone)]
pub struct AppContext {
    pub env: EnvSnapshot,
    pub boot: Arc<Bootstrap>,
}

/// An application entrypoint driven by [`Bootstrap::launch`].
#[async_trait]
pub trait AppModule: Send + Sync {
    async fn run(&self, ctx: AppContext) -> Result<()>;
}
