use super::chain::smartbin::BinReport;
use chrono::DateTime;
use ethers::types::Address;

pub const BIN_FULL_TITLE: &str = "Bin Full Alert";

/// One push to one authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub recipient: Address,
    pub title: String,
    pub body: String,
}

/// Renders unix seconds as `11/14/2023, 10:13:20 PM` in UTC. Values chrono
/// cannot represent fall back to the raw number.
pub fn render_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string())
        .unwrap_or_else(|| secs.to_string())
}

pub fn bin_full_body(report: &BinReport) -> String {
    format!(
        "Bin {} is full at {}",
        report.bin_id,
        render_timestamp(report.timestamp)
    )
}

/// Builds the requests for a report, in authority order, skipping the zero
/// address used by the contract for unfilled authority slots.
pub fn requests_for(report: &BinReport) -> Vec<NotificationRequest> {
    let body = bin_full_body(report);
    report
        .authorities
        .iter()
        .filter(|authority| !authority.is_zero())
        .map(|authority| NotificationRequest {
            recipient: *authority,
            title: BIN_FULL_TITLE.to_string(),
            body: body.clone(),
        })
        .collect()
}
