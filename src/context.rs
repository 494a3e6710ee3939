use super::config::Cli;
use super::push::caip10_id;
use anyhow::Context;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;

/// Sepolia, the only network this build talks to
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Identity the relay sends notifications as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub address: Address,
    pub chain_id: u64,
}

impl ChannelIdentity {
    /// `eip155:{chain_id}:{checksummed address}`
    pub fn caip10(&self) -> String {
        caip10_id(self.chain_id, &self.address)
    }
}

#[derive(Debug, Clone)]
pub struct PushSettings {
    pub base_url: String,
    /// Verifying contract of the EIP-712 domain push payloads are signed in
    pub comm_contract: Address,
}

/// Everything the relay and the dashboard need, built once at startup and
/// handed to each component explicitly.
#[derive(Debug, Clone)]
pub struct NotifierContext {
    pub wallet: LocalWallet,
    pub channel: ChannelIdentity,
    pub contract_address: Address,
    pub rpc_url: String,
    pub push: PushSettings,
    pub report_queue_size: usize,
}

impl NotifierContext {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let wallet = cli
            .private_key
            .parse::<LocalWallet>()
            .context("PRIVATE_KEY is not a valid secp256k1 key")?
            .with_chain_id(SEPOLIA_CHAIN_ID);

        let channel = ChannelIdentity {
            address: wallet.address(),
            chain_id: SEPOLIA_CHAIN_ID,
        };

        let base_url = cli
            .push_api_url
            .clone()
            .unwrap_or_else(|| cli.push_env.base_url().to_string());

        Ok(Self {
            wallet,
            channel,
            contract_address: cli.contract_address,
            rpc_url: cli.rpc_url.clone(),
            push: PushSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                comm_contract: cli.push_comm_contract,
            },
            report_queue_size: cli.report_queue_size.max(1),
        })
    }
}
