use anyhow::{Result, bail};
use async_trait::async_trait;
use gw_api_types::{AccountId, ChainNetworkConfig, NetworkId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for an interactive sign-in flow.
///
/// The flow itself is owned by the hosted wallet; the connector only builds
/// the authorization URL the caller should open.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignInRequest {
    /// Display name the wallet shows on its authorization page.
    pub app_title: Option<String>,
    pub success_url: Option<String>,
    pub failure_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignInRedirect {
    /// Fully encoded authorization URL on the hosted wallet.
    pub url: String,
    /// Correlation id the wallet echoes back when the flow completes.
    pub request_id: String,
}

/// A live session against one chain network: the handle stored in the wallet
/// slot.
#[async_trait]
pub trait WalletSession: Send + Sync {
    fn network_id(&self) -> &NetworkId;

    /// The account the session is authorized for, if anybody signed in.
    fn account_id(&self) -> Option<AccountId>;

    fn is_signed_in(&self) -> bool;

    /// Explorer page for `account` on this session's network.
    fn explorer_account_url(&self, account: &AccountId) -> String;

    async fn request_sign_in(&self, request: SignInRequest) -> Result<SignInRedirect>;

    /// Record a completed wallet authorization for `account`.
    async fn complete_sign_in(&self, account: AccountId) -> Result<()>;

    async fn sign_out(&self) -> Result<()>;
}

/// Constructs a [`WalletSession`] and waits for the network's readiness
/// signal; the single use of this trait per process is guarded by the wallet
/// slot.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self, config: &ChainNetworkConfig) -> Result<Arc<dyn WalletSession>>;
}

pub mod fake {
    //! In-process doubles for tests in dependent crates.

    use super::*;
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts connection attempts and can be scripted to fail the first `n`
    /// of them, which is enough to exercise retry and idempotence rules.
    #[derive(Default)]
    pub struct FakeWalletConnector {
        connects: AtomicUsize,
        failures_remaining: AtomicUsize,
    }

    impl FakeWalletConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_times(failures: usize) -> Self {
            Self {
                connects: AtomicUsize::new(0),
                failures_remaining: AtomicUsize::new(failures),
            }
        }

        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WalletConnector for FakeWalletConnector {
        async fn connect(&self, config: &ChainNetworkConfig) -> Result<Arc<dyn WalletSession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);

            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                bail!("simulated gateway outage");
            }

            Ok(Arc::new(FakeWalletSession {
                network_id: config.network_id.clone(),
                wallet_url: config.wallet_url.clone(),
                explorer_url: config.explorer_url.clone(),
                account: RwLock::new(None),
            }))
        }
    }

    pub struct FakeWalletSession {
        network_id: NetworkId,
        wallet_url: String,
        explorer_url: String,
        account: RwLock<Option<AccountId>>,
    }

    #[async_trait]
    impl WalletSession for FakeWalletSession {
        fn network_id(&self) -> &NetworkId {
            &self.network_id
        }

        fn account_id(&self) -> Option<AccountId> {
            self.account.read().expect("account lock").clone()
        }

        fn is_signed_in(&self) -> bool {
            self.account_id().is_some()
        }

        fn explorer_account_url(&self, account: &AccountId) -> String {
            format!(
                "{}/accounts/{}",
                self.explorer_url.trim_end_matches('/'),
                account.0
            )
        }

        async fn request_sign_in(&self, _request: SignInRequest) -> Result<SignInRedirect> {
            Ok(SignInRedirect {
                url: format!("{}/login", self.wallet_url),
                request_id: "fake-request".to_owned(),
            })
        }

        async fn complete_sign_in(&self, account: AccountId) -> Result<()> {
            *self.account.write().expect("account lock") = Some(account);
            Ok(())
        }

        async fn sign_out(&self) -> Result<()> {
            *self.account.write().expect("account lock") = None;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeWalletConnector;
    use super::*;
    use gw_api_types::KeyStoreKind;

    fn config() -> ChainNetworkConfig {
        ChainNetworkConfig {
            network_id: NetworkId("testnet".to_owned()),
            node_url: "https://rpc.testnet.meridian.dev".to_owned(),
            wallet_url: "https://wallet.testnet.meridian.dev".to_owned(),
            helper_url: "https://helper.testnet.meridian.dev".to_owned(),
            explorer_url: "https://explorer.testnet.meridian.dev".to_owned(),
            key_store: KeyStoreKind::InMemory,
        }
    }

    #[tokio::test]
    async fn fake_fails_then_recovers() -> Result<()> {
        let connector = FakeWalletConnector::failing_times(1);

        assert!(connector.connect(&config()).await.is_err());
        let session = connector.connect(&config()).await?;

        assert_eq!(connector.connect_count(), 2);
        assert_eq!(session.network_id(), &NetworkId("testnet".to_owned()));
        Ok(())
    }

    #[tokio::test]
    async fn fake_session_sign_in_lifecycle() -> Result<()> {
        let connector = FakeWalletConnector::new();
        let session = connector.connect(&config()).await?;

        assert!(!session.is_signed_in());
        assert_eq!(session.account_id(), None);

        session
            .complete_sign_in(AccountId("alice.testnet".to_owned()))
            .await?;
        assert!(session.is_signed_in());
        assert_eq!(session.account_id(), Some(AccountId("alice.testnet".to_owned())));
        assert_eq!(
            session.explorer_account_url(&AccountId("alice.testnet".to_owned())),
            "https://explorer.testnet.meridian.dev/accounts/alice.testnet"
        );

        session.sign_out().await?;
        assert!(!session.is_signed_in());
        Ok(())
    }
}
