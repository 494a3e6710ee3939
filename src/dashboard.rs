//! Manager / authority operations on bin records, run from the command line

use super::context::NotifierContext;
use super::notification::render_timestamp;
use super::registry::BinRegistry;
use anyhow::Context;
use clap::{Args, Subcommand};
use ethers::middleware::SignerMiddleware;
use ethers::types::{Address, TransactionReceipt, U256};
use ethers_providers::{Middleware, Provider, Ws};
use log::info;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct BinIdArg {
    #[clap(long, value_parser = parse_bin_id)]
    pub bin_id: U256,
}

/// Bin ids are decimal; `U256::from_str` would read them as hex
fn parse_bin_id(value: &str) -> Result<U256, String> {
    U256::from_dec_str(value).map_err(|e| format!("invalid bin id {value}: {e}"))
}

/// One entry of a comma-separated address list, surrounding spaces allowed
fn parse_authority(value: &str) -> Result<Address, String> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| format!("invalid authority address {value}: {e}"))
}

#[derive(Subcommand, Debug, Clone)]
pub enum BinCommand {
    /// Create a bin (manager only)
    Add {
        #[clap(flatten)]
        bin: BinIdArg,
        #[clap(long)]
        location: String,
    },
    /// Remove a bin (manager only)
    Remove {
        #[clap(flatten)]
        bin: BinIdArg,
    },
    /// Report a bin's fullness; emits BinReported
    Report {
        #[clap(flatten)]
        bin: BinIdArg,
        #[clap(long)]
        location: String,
        #[clap(long)]
        not_full: bool,
    },
    /// Mark a bin emptied (assigned authority only)
    Empty {
        #[clap(flatten)]
        bin: BinIdArg,
    },
    /// Assign authorities to a bin (manager only)
    Assign {
        #[clap(flatten)]
        bin: BinIdArg,
        #[clap(
            long,
            value_delimiter = ',',
            value_parser = parse_authority,
            required = true,
            num_args = 1..
        )]
        authorities: Vec<Address>,
    },
    /// Print a bin record
    Show {
        #[clap(flatten)]
        bin: BinIdArg,
    },
    /// Print the authorities assigned to a bin
    Authorities {
        #[clap(flatten)]
        bin: BinIdArg,
    },
    /// Check whether an address is an assigned authority of a bin
    IsAuthority {
        #[clap(flatten)]
        bin: BinIdArg,
        #[clap(long)]
        address: Address,
    },
    /// Print the manager address
    Manager,
}

pub async fn execute(ctx: &NotifierContext, command: BinCommand) -> anyhow::Result<()> {
    let provider = Provider::<Ws>::connect(ctx.rpc_url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", ctx.rpc_url))?;
    let client = Arc::new(SignerMiddleware::new(provider, ctx.wallet.clone()));
    let registry = BinRegistry::new(ctx.contract_address, client);

    run(&registry, command).await
}

async fn run<M: Middleware + 'static>(
    registry: &BinRegistry<M>,
    command: BinCommand,
) -> anyhow::Result<()> {
    match command {
        BinCommand::Add { bin, location } => {
            let receipt = registry.add_bin(bin.bin_id, location).await?;
            print_confirmed("Bin added!", &receipt);
        }
        BinCommand::Remove { bin } => {
            let receipt = registry.remove_bin(bin.bin_id).await?;
            print_confirmed("Bin removed!", &receipt);
        }
        BinCommand::Report {
            bin,
            location,
            not_full,
        } => {
            let receipt = registry.report_bin(bin.bin_id, location, !not_full).await?;
            print_confirmed("Bin reported!", &receipt);
        }
        BinCommand::Empty { bin } => {
            let receipt = registry.empty_bin(bin.bin_id).await?;
            print_confirmed("Bin emptied!", &receipt);
        }
        BinCommand::Assign { bin, authorities } => {
            let receipt = registry.assign_authorities(bin.bin_id, authorities).await?;
            print_confirmed("Authorities assigned!", &receipt);
        }
        BinCommand::Show { bin } => {
            let record = registry.bin(bin.bin_id).await?;
            println!("ID: {}", record.id);
            println!("Location: {}", record.location);
            println!("Full: {}", if record.is_full { "Yes" } else { "No" });
            println!("Last Emptied: {}", render_last_emptied(record.last_emptied));
        }
        BinCommand::Authorities { bin } => {
            let authorities = registry.authorities(bin.bin_id).await?;
            if authorities.is_empty() {
                println!("No authorities assigned to this bin yet");
            }
            for authority in authorities {
                println!("{:?}", authority);
            }
        }
        BinCommand::IsAuthority { bin, address } => {
            println!("{}", registry.is_authority(bin.bin_id, address).await?);
        }
        BinCommand::Manager => {
            println!("{:?}", registry.manager().await?);
        }
    }
    Ok(())
}

fn print_confirmed(message: &str, receipt: &TransactionReceipt) {
    info!(
        "tx {:?} mined in block {:?}",
        receipt.transaction_hash, receipt.block_number
    );
    println!("{}", message);
}

fn render_last_emptied(last_emptied: U256) -> String {
    if last_emptied > U256::from(u64::MAX) {
        return last_emptied.to_string();
    }
    render_timestamp(last_emptied.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Command};
    use clap::{CommandFactory, Parser};

    fn parse(args: &[&str]) -> BinCommand {
        let mut full = vec![
            "smartbin-notifier",
            "--rpc-url",
            "ws://localhost:8546",
            "--contract-address",
            "0x83446652ba0CBcd4e498cBf4951d824d1996cbFf",
            "--private-key",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            "bin",
        ];
        full.extend_from_slice(args);
        match Cli::parse_from(full).command {
            Command::Bin(command) => command,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn assign_splits_comma_separated_addresses() {
        let command = parse(&[
            "assign",
            "--bin-id",
            "7",
            "--authorities",
            "0x0000000000000000000000000000000000000aaa,0x0000000000000000000000000000000000000bbb",
        ]);
        match command {
            BinCommand::Assign { bin, authorities } => {
                assert_eq!(bin.bin_id, U256::from(7));
                assert_eq!(
                    authorities,
                    vec![Address::from_low_u64_be(0xaaa), Address::from_low_u64_be(0xbbb)]
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn assign_needs_an_address() {
        let result = Cli::try_parse_from([
            "smartbin-notifier",
            "--rpc-url",
            "ws://localhost:8546",
            "--contract-address",
            "0x83446652ba0CBcd4e498cBf4951d824d1996cbFf",
            "--private-key",
            "0x01",
            "bin",
            "assign",
            "--bin-id",
            "7",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn assign_trims_spaces_around_addresses() {
        let command = parse(&[
            "assign",
            "--bin-id",
            "7",
            "--authorities",
            "0x0000000000000000000000000000000000000aaa, 0x0000000000000000000000000000000000000bbb ",
        ]);
        match command {
            BinCommand::Assign { authorities, .. } => assert_eq!(
                authorities,
                vec![Address::from_low_u64_be(0xaaa), Address::from_low_u64_be(0xbbb)]
            ),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn every_bin_subcommand_has_help() {
        let cli = Cli::command();
        let bin = cli
            .find_subcommand("bin")
            .expect("bin subcommand is registered");
        for sub in bin.get_subcommands() {
            assert!(
                sub.get_about().is_some(),
                "`bin {}` has no help line",
                sub.get_name()
            );
        }
    }

    #[test]
    fn bin_ids_are_decimal() {
        match parse(&["show", "--bin-id", "10"]) {
            BinCommand::Show { bin } => assert_eq!(bin.bin_id, U256::from(10)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn report_is_full_by_default() {
        match parse(&["report", "--bin-id", "3", "--location", "Lot A"]) {
            BinCommand::Report { not_full, .. } => assert!(!not_full),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn last_emptied_renders_like_event_time() {
        assert_eq!(
            render_last_emptied(U256::from(1_700_000_000u64)),
            "11/14/2023, 10:13:20 PM"
        );
        assert_eq!(render_last_emptied(U256::MAX), U256::MAX.to_string());
    }
}
