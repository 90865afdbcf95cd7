use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountId(pub String);

/// Account key-store backend the wallet client should use for session state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyStoreKind {
    /// Keys and session state live in process memory only.
    #[default]
    InMemory,
    /// Session state persisted as JSON files under `dir`.
    File { dir: PathBuf },
}

/// Everything the wallet connector needs to reach a chain network.
///
/// Owned by the caller; connectors read it during construction and do not
/// retain it beyond the fields they copy into the session handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainNetworkConfig {
    pub network_id: NetworkId,
    pub node_url: String,
    pub wallet_url: String,
    pub helper_url: String,
    pub explorer_url: String,
    pub key_store: KeyStoreKind,
}

/// Parameters for one storage-upload node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreNodeConfig {
    pub node_url: String,
    /// Chain token symbol the node charges uploads in, e.g. `meridian`.
    pub token: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration field `{field}` must not be empty")]
    MissingField { field: &'static str },

    #[error("configuration field `{field}` is not a valid URL: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    Ok(())
}

fn require_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    require(field, value)?;
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })?;
    Ok(())
}

impl ChainNetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("network_id", &self.network_id.0)?;
        require_url("node_url", &self.node_url)?;
        require_url("wallet_url", &self.wallet_url)?;
        require_url("helper_url", &self.helper_url)?;
        require_url("explorer_url", &self.explorer_url)?;
        Ok(())
    }
}

impl StoreNodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_url("node_url", &self.node_url)?;
        require("token", &self.token)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_config() -> ChainNetworkConfig {
        ChainNetworkConfig {
            network_id: NetworkId("testnet".to_owned()),
            node_url: "https://rpc.testnet.meridian.dev".to_owned(),
            wallet_url: "https://wallet.testnet.meridian.dev".to_owned(),
            helper_url: "https://helper.testnet.meridian.dev".to_owned(),
            explorer_url: "https://explorer.testnet.meridian.dev".to_owned(),
            key_store: KeyStoreKind::InMemory,
        }
    }

    #[test]
    fn valid_chain_config_passes() {
        assert!(chain_config().validate().is_ok());
    }

    #[test]
    fn empty_network_id_is_rejected() {
        let mut config = chain_config();
        config.network_id = NetworkId("  ".to_owned());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "network_id" }));
    }

    #[test]
    fn malformed_node_url_is_rejected() {
        let mut config = chain_config();
        config.node_url = "not a url".to_owned();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { field: "node_url", .. }));
    }

    #[test]
    fn store_config_requires_token() {
        let config = StoreNodeConfig {
            node_url: "https://devnet.caravel.store".to_owned(),
            token: String::new(),
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "token" }));
    }
}
