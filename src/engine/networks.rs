use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    pub id: &'static str,
    pub label: &'static str,
    pub chain_id: u64,
    pub contract_id: &'static str,
    pub near_endpoint: &'static str,
    pub wallet_url: &'static str,
    pub explorer_url: &'static str,
}

pub const NETWORKS: &[NetworkConfig] = &[
    NetworkConfig {
        id: "local",
        label: "LocalNet",
        chain_id: 1313161556,
        contract_id: "aurora.test.near",
        near_endpoint: "http://127.0.0.1:3030",
        wallet_url: "http://127.0.0.1:4000/wallet",
        explorer_url: "http://127.0.0.1:3019",
    },
    NetworkConfig {
        id: "betanet",
        label: "BetaNet",
        chain_id: 1313161556,
        contract_id: "aurora",
        near_endpoint: "https://rpc.betanet.near.org",
        wallet_url: "https://wallet.betanet.near.org",
        explorer_url: "https://explorer.betanet.near.org",
    },
    NetworkConfig {
        id: "testnet",
        label: "TestNet",
        chain_id: 1313161555,
        contract_id: "aurora",
        near_endpoint: "https://rpc.testnet.near.org",
        wallet_url: "https://wallet.testnet.near.org",
        explorer_url: "https://explorer.testnet.near.org",
    },
    NetworkConfig {
        id: "mainnet",
        label: "MainNet",
        chain_id: 1313161554,
        contract_id: "aurora",
        near_endpoint: "https://rpc.mainnet.near.org",
        wallet_url: "https://wallet.near.org",
        explorer_url: "https://explorer.near.org",
    },
];

pub fn network_config(id: &str) -> Option<&'static NetworkConfig> {
    NETWORKS.iter().find(|network| network.id == id)
}
