//! Environment capture and the mapping from environment variables to
//! client configs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use gw_api_types::{ChainNetworkConfig, KeyStoreKind, NetworkId, StoreNodeConfig};

/// Environment variables read by [`AppConfig::from_snapshot`].
pub const ENV_NETWORK_ID: &str = "MERIDIAN_NETWORK_ID";
pub const ENV_NODE_URL: &str = "MERIDIAN_NODE_URL";
pub const ENV_WALLET_URL: &str = "MERIDIAN_WALLET_URL";
pub const ENV_HELPER_URL: &str = "MERIDIAN_HELPER_URL";
pub const ENV_EXPLORER_URL: &str = "MERIDIAN_EXPLORER_URL";
pub const ENV_KEYSTORE_DIR: &str = "MERIDIAN_KEYSTORE_DIR";
pub const ENV_STORE_NODE_URL: &str = "CARAVEL_NODE_URL";
pub const ENV_STORE_TOKEN: &str = "CARAVEL_TOKEN";

/// Immutable copy of the process environment, taken once at startup.
///
/// Application modules receive the snapshot instead of reading
/// `std::env` themselves, so a module sees one consistent view even if
/// the process environment changes while it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs. Meant for tests and for
    /// embedding callers that manage configuration themselves.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Full client configuration for one launch: chain gateway plus
/// storage node, derived from an [`EnvSnapshot`] with testnet defaults
/// for anything the environment leaves unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub chain: ChainNetworkConfig,
    pub store: StoreNodeConfig,
}

impl AppConfig {
    /// Derive a config from a snapshot. Unset or blank variables fall
    /// back to the public testnet endpoints.
    pub fn from_snapshot(env: &EnvSnapshot) -> Self {
        let value = |key: &str, default: &str| -> String {
            env.get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_owned()
        };

        let network_id = NetworkId(value(ENV_NETWORK_ID, "testnet"));
        let key_store = env
            .get(ENV_KEYSTORE_DIR)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|dir| KeyStoreKind::File {
                dir: PathBuf::from(dir),
            })
            .unwrap_or_default();

        Self {
            chain: ChainNetworkConfig {
                network_id,
                node_url: value(ENV_NODE_URL, "https://rpc.testnet.meridian.dev"),
                wallet_url: value(ENV_WALLET_URL, "https://wallet.testnet.meridian.dev"),
                helper_url: value(ENV_HELPER_URL, "https://helper.testnet.meridian.dev"),
                explorer_url: value(ENV_EXPLORER_URL, "https://explorer.testnet.meridian.dev"),
                key_store,
            },
            store: StoreNodeConfig {
                node_url: value(ENV_STORE_NODE_URL, "https://devnet.caravel.store"),
                token: value(ENV_STORE_TOKEN, "meridian"),
            },
        }
    }
}
