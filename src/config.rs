//! Command-line interface for the SmartBin notifier

use super::dashboard::BinCommand;
use super::push::PushEnv;
use clap::{Parser, Subcommand};
use ethers::types::Address;

/// Default verifying contract for push payload signatures on Sepolia
pub const DEFAULT_PUSH_COMM_CONTRACT: &str = "0x0C34d54a09CFe75BCcd878A469206Ae77E0fe6e7";

#[rustfmt::skip]
#[derive(Parser, Debug)]
#[clap(about = "Relays SmartBin contract reports to Push notifications")]
pub struct Cli {
    // --------------
    // | Blockchain |
    // --------------

    /// The websocket RPC URL used for subscriptions and contract calls
    #[clap(long, env = "WEBSOCKET_SEPOLIA_RPC_URL")]
    pub rpc_url: String,
    /// The address of the deployed SmartBin contract
    #[clap(long, env = "SMARTBIN_ADDRESS")]
    pub contract_address: Address,
    /// Hex-encoded key of the channel / manager wallet
    #[clap(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    // --------
    // | Push |
    // --------

    /// The Push environment to talk to
    #[clap(long, env = "PUSH_ENV", value_enum, default_value = "staging")]
    pub push_env: PushEnv,
    /// Overrides the base URL derived from `push_env`
    #[clap(long, env = "PUSH_API_URL")]
    pub push_api_url: Option<String>,
    #[clap(long, env = "PUSH_COMM_CONTRACT", default_value = DEFAULT_PUSH_COMM_CONTRACT)]
    pub push_comm_contract: Address,

    // ---------
    // | Relay |
    // ---------

    /// How many reports may wait between the listener and the dispatcher
    #[clap(long, env = "REPORT_QUEUE_SIZE", default_value = "64")]
    pub report_queue_size: usize,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the channel registration, then relay BinReported events
    Listen,
    /// Read or write bin records on the contract
    #[clap(subcommand)]
    Bin(BinCommand),
}
