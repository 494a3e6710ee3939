use super::chain::smartbin::SmartBin;
use anyhow::anyhow;
use ethers_core::types::{Address, TransactionReceipt, U256};
use ethers_contract::builders::ContractCall;
use ethers_providers::Middleware;
use std::sync::Arc;

/// A bin as stored by the contract's `bins` getter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinRecord {
    pub id: U256,
    pub location: String,
    pub is_full: bool,
    /// Unix seconds, assigned by the contract
    pub last_emptied: U256,
}

impl From<(U256, String, bool, U256)> for BinRecord {
    fn from((id, location, is_full, last_emptied): (U256, String, bool, U256)) -> Self {
        Self {
            id,
            location,
            is_full,
            last_emptied,
        }
    }
}

/// Bin records and authority assignments, stored on-chain
pub struct BinRegistry<M> {
    contract: SmartBin<M>,
}

impl<M: Middleware + 'static> BinRegistry<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            contract: SmartBin::new(address, client),
        }
    }

    pub async fn add_bin(&self, bin_id: U256, location: String) -> anyhow::Result<TransactionReceipt> {
        confirm(self.contract.add_bin(bin_id, location)).await
    }

    pub async fn remove_bin(&self, bin_id: U256) -> anyhow::Result<TransactionReceipt> {
        confirm(self.contract.remove_bin(bin_id)).await
    }

    pub async fn report_bin(
        &self,
        bin_id: U256,
        location: String,
        is_full: bool,
    ) -> anyhow::Result<TransactionReceipt> {
        confirm(self.contract.report_bin(bin_id, location, is_full)).await
    }

    pub async fn empty_bin(&self, bin_id: U256) -> anyhow::Result<TransactionReceipt> {
        confirm(self.contract.empty_bin(bin_id)).await
    }

    pub async fn assign_authorities(
        &self,
        bin_id: U256,
        authorities: Vec<Address>,
    ) -> anyhow::Result<TransactionReceipt> {
        if authorities.is_empty() {
            return Err(anyhow!("at least one authority address is required"));
        }
        confirm(self.contract.assign_authority(bin_id, authorities)).await
    }

    pub async fn bin(&self, bin_id: U256) -> anyhow::Result<BinRecord> {
        Ok(self.contract.bins(bin_id).call().await?.into())
    }

    /// Full authority list in one call; the zero address never appears in it
    pub async fn authorities(&self, bin_id: U256) -> anyhow::Result<Vec<Address>> {
        let authorities = self.contract.get_assigned_authorities(bin_id).call().await?;
        Ok(authorities.into_iter().filter(|a| !a.is_zero()).collect())
    }

    pub async fn is_authority(&self, bin_id: U256, address: Address) -> anyhow::Result<bool> {
        Ok(self.contract.is_authority(bin_id, address).call().await?)
    }

    pub async fn manager(&self) -> anyhow::Result<Address> {
        Ok(self.contract.manager().call().await?)
    }
}

/// Sends the transaction and waits until it is mined
async fn confirm<M: Middleware + 'static>(
    call: ContractCall<M, ()>,
) -> anyhow::Result<TransactionReceipt> {
    let pending = call.send().await?;
    pending
        .await?
        .ok_or_else(|| anyhow!("transaction dropped before it was mined"))
}
