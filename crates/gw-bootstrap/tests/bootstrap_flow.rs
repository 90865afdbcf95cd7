//! Full launch flow against in-process fakes: environment snapshot in,
//! module drives both slots, derived operations come back unchanged.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use gw_api_types::AccountId;
use gw_bootstrap::env::{ENV_NODE_URL, ENV_STORE_TOKEN};
use gw_bootstrap::{AppConfig, AppContext, AppModule, Bootstrap, EnvSnapshot};
use gw_chain_client::fake::FakeWalletConnector;
use gw_client_slot::ReadyState;
use gw_store_client::UploadItem;
use gw_store_client::fake::FakeStoreConnector;

/// A module shaped like the real consumer: derive config from the snapshot,
/// bring up wallet then storage, sign in, upload one item.
struct PublisherModule;

#[async_trait]
impl AppModule for PublisherModule {
    async fn run(&self, ctx: AppContext) -> Result<()> {
        let config = AppConfig::from_snapshot(&ctx.env);
        anyhow::ensure!(config.chain.node_url == "https://rpc.custom.meridian.dev");
        anyhow::ensure!(config.store.token == "usdc");

        ctx.boot.ensure_wallet(&config.chain).await?;
        ctx.boot
            .complete_sign_in(AccountId("publisher.testnet".to_owned()))
            .await?;
        ctx.boot.ensure_store(&config.store).await?;

        anyhow::ensure!(ctx.boot.upload_price(64).await? == "640");

        let receipt = ctx
            .boot
            .upload(UploadItem::new(b"first post".to_vec(), "text/plain").with_tag("Kind", "post"))
            .await?;
        anyhow::ensure!(receipt.size == 10);
        Ok(())
    }
}

#[tokio::test]
async fn launch_drives_module_through_both_slots() -> Result<()> {
    let wallet = Arc::new(FakeWalletConnector::new());
    let store = Arc::new(FakeStoreConnector::new());
    let boot = Arc::new(Bootstrap::new(wallet.clone(), store.clone()));

    let env = EnvSnapshot::from_pairs([
        (ENV_NODE_URL, "https://rpc.custom.meridian.dev"),
        (ENV_STORE_TOKEN, "usdc"),
    ]);
    boot.clone().launch_with_env(PublisherModule, env).await?;

    assert_eq!(wallet.connect_count(), 1);
    assert_eq!(store.open_count(), 1);
    assert_eq!(boot.wallet_state(), ReadyState::Ready);
    assert_eq!(boot.store_state(), ReadyState::Ready);
    assert!(boot.is_signed_in()?);
    Ok(())
}

/// A failed launch must not wedge the shared [`Bootstrap`]; the next module
/// run can retry the same slot.
struct WalletOnlyModule;

#[async_trait]
impl AppModule for WalletOnlyModule {
    async fn run(&self, ctx: AppContext) -> Result<()> {
        let config = AppConfig::from_snapshot(&ctx.env);
        ctx.boot.ensure_wallet(&config.chain).await?;
        Ok(())
    }
}

#[tokio::test]
async fn failed_launch_leaves_slot_retryable() -> Result<()> {
    let wallet = Arc::new(FakeWalletConnector::failing_times(1));
    let boot = Arc::new(Bootstrap::new(
        wallet.clone(),
        Arc::new(FakeStoreConnector::new()),
    ));

    let first = boot
        .clone()
        .launch_with_env(WalletOnlyModule, EnvSnapshot::default())
        .await;
    assert!(first.is_err());
    assert_eq!(boot.wallet_state(), ReadyState::Uninitialized);

    boot.clone()
        .launch_with_env(WalletOnlyModule, EnvSnapshot::default())
        .await?;
    assert_eq!(wallet.connect_count(), 2);
    assert_eq!(boot.wallet_state(), ReadyState::Ready);
    Ok(())
}
