//! Bindings for the SmartBin contract. The listener and the dashboard both
//! generate from `abi/SmartBin.json` so they decode against the same ABI.

use ethers_core::types::{Address, U256};

ethers_contract::abigen!(SmartBin, "./abi/SmartBin.json");

pub const BIN_REPORTED_EVENT: &str = "BinReported";

/// A decoded `BinReported` occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinReport {
    pub bin_id: U256,
    pub location: String,
    pub is_full: bool,
    /// Unix seconds
    pub timestamp: u64,
    pub authorities: Vec<Address>,
}

impl TryFrom<BinReportedFilter> for BinReport {
    type Error = anyhow::Error;

    fn try_from(event: BinReportedFilter) -> anyhow::Result<Self> {
        if event.timestamp > U256::from(u64::MAX) {
            return Err(anyhow::anyhow!(
                "timestamp {} of bin {} does not fit in u64",
                event.timestamp,
                event.bin_id
            ));
        }

        Ok(Self {
            bin_id: event.bin_id,
            location: event.location,
            is_full: event.is_full,
            timestamp: event.timestamp.as_u64(),
            authorities: event.authorities,
        })
    }
}
