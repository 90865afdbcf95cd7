use std::sync::Arc;

use async_trait::async_trait;
use gw_bootstrap::{AppConfig, AppContext, AppModule, Bootstrap, BootstrapError};
use gw_chain_client::SignInRequest;
use gw_chain_meridian::MeridianConnector;
use gw_store_caravel::CaravelConnector;
use tracing::{info, warn};

/// Console shell: bring both clients up, report where they stand, and quote
/// the cost of a small upload. Configuration comes entirely from the
/// environment snapshot taken at launch.
struct ShellModule;

#[async_trait]
impl AppModule for ShellModule {
    async fn run(&self, ctx: AppContext) -> anyhow::Result<()> {
        let config = AppConfig::from_snapshot(&ctx.env);
        info!(
            network = %config.chain.network_id.0,
            gateway = %config.chain.node_url,
            store = %config.store.node_url,
            "derived client configuration"
        );

        ctx.boot.ensure_wallet(&config.chain).await?;

        if let Some(account) = ctx.boot.account_id()? {
            let session = ctx.boot.session()?;
            info!(
                account = %account.0,
                explorer = %session.explorer_account_url(&account),
                "wallet session restored"
            );
        } else {
            let redirect = ctx
                .boot
                .request_sign_in(SignInRequest {
                    app_title: Some("Gangway Shell".to_owned()),
                    ..SignInRequest::default()
                })
                .await?;
            info!(url = %redirect.url, "no session; open this URL to authorize");
        }

        ctx.boot.ensure_store(&config.store).await?;

        let status = ctx.boot.status();
        info!(wallet = %status.wallet, storage = %status.storage, "clients ready");

        match ctx.boot.upload_price(1024).await {
            Ok(price) => info!(%price, "upload quote for 1 KiB"),
            Err(BootstrapError::Slot(err)) => warn!(slot = err.slot(), "client not ready for quotes"),
            Err(err) => warn!(error = %err, "price quote failed"),
        }
        match ctx.boot.store_balance().await {
            Ok(balance) => info!(%balance, "storage balance"),
            Err(err) => warn!(error = %err, "balance query failed"),
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let boot = Arc::new(Bootstrap::new(
        Arc::new(MeridianConnector::new()),
        Arc::new(CaravelConnector::new()),
    ));

    info!("app-shell starting");
    boot.launch(ShellModule).await
}
