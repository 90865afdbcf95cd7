use anyhow::{Result, bail};
use async_trait::async_trait;
use gw_api_types::StoreNodeConfig;
use gw_chain_client::WalletSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadTag {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadItem {
    pub data: Vec<u8>,
    pub content_type: String,
    pub tags: Vec<UploadTag>,
}

impl UploadItem {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(UploadTag {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: String,
    pub size: u64,
    pub timestamp_epoch_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FundReceipt {
    pub tx_id: String,
    /// Atomic token units, decimal string.
    pub amount: String,
    pub token: String,
}

/// Funded upload client for one storage node: the handle stored in the
/// storage slot. Amounts are atomic token units rendered as decimal strings.
#[async_trait]
pub trait UploadClient: Send + Sync {
    fn node_url(&self) -> &str;

    fn token(&self) -> &str;

    /// Quote the cost of uploading `byte_len` bytes.
    async fn price(&self, byte_len: u64) -> Result<String>;

    /// Balance the payer has loaded on the node.
    async fn balance(&self) -> Result<String>;

    async fn fund(&self, amount: &str) -> Result<FundReceipt>;

    async fn upload(&self, item: UploadItem) -> Result<UploadReceipt>;
}

/// Constructs an [`UploadClient`] against one node and waits for its
/// readiness signal. The payer session is passed in explicitly; the storage
/// slot never reaches into the wallet slot on its own.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn open(
        &self,
        config: &StoreNodeConfig,
        payer: Arc<dyn WalletSession>,
    ) -> Result<Arc<dyn UploadClient>>;
}

pub mod fake {
    //! In-process doubles for tests in dependent crates.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakeStoreConnector {
        opens: AtomicUsize,
        failures_remaining: AtomicUsize,
    }

    impl FakeStoreConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_times(failures: usize) -> Self {
            Self {
                opens: AtomicUsize::new(0),
                failures_remaining: AtomicUsize::new(failures),
            }
        }

        pub fn open_count(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StoreConnector for FakeStoreConnector {
        async fn open(
            &self,
            config: &StoreNodeConfig,
            payer: Arc<dyn WalletSession>,
        ) -> Result<Arc<dyn UploadClient>> {
            self.opens.fetch_add(1, Ordering::SeqCst);

            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                bail!("simulated node outage");
            }

            Ok(Arc::new(FakeUploadClient {
                node_url: config.node_url.clone(),
                token: config.token.clone(),
                payer,
                uploads: AtomicUsize::new(0),
            }))
        }
    }

    /// Deterministic client that still enforces the signed-in-payer rule a
    /// real node client applies to paid operations.
    pub struct FakeUploadClient {
        node_url: String,
        token: String,
        payer: Arc<dyn WalletSession>,
        uploads: AtomicUsize,
    }

    impl FakeUploadClient {
        fn require_payer(&self) -> Result<()> {
            if self.payer.account_id().is_none() {
                bail!("payer session has no account; sign in first");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UploadClient for FakeUploadClient {
        fn node_url(&self) -> &str {
            &self.node_url
        }

        fn token(&self) -> &str {
            &self.token
        }

        async fn price(&self, byte_len: u64) -> Result<String> {
            // Ten atomic units per byte keeps quotes easy to assert on.
            Ok((u128::from(byte_len) * 10).to_string())
        }

        async fn balance(&self) -> Result<String> {
            self.require_payer()?;
            Ok("1000000".to_owned())
        }

        async fn fund(&self, amount: &str) -> Result<FundReceipt> {
            self.require_payer()?;
            Ok(FundReceipt {
                tx_id: format!("fake-fund-{amount}"),
                amount: amount.to_owned(),
                token: self.token.clone(),
            })
        }

        async fn upload(&self, item: UploadItem) -> Result<UploadReceipt> {
            self.require_payer()?;
            let sequence = self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(UploadReceipt {
                id: format!("fake-upload-{sequence}"),
                size: item.data.len() as u64,
                timestamp_epoch_ms: 1_700_000_000_000,
            })
        }
    }
}
