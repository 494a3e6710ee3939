use super::{caip10_id, PushError};
use crate::context::ChannelIdentity;
use crate::notification::NotificationRequest;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip712::TypedData;
use ethers::types::Address;
use ethers::utils::hex;
use serde::Serialize;

/// Notification addressed to explicit recipients
pub const DELIVERY_TYPE_TARGETED: u8 = 3;
/// Only title and body travel in the identity
pub const IDENTITY_TYPE_MINIMAL: u8 = 0;

pub const EIP712_DOMAIN_NAME: &str = "EPNS COMM V1";
const VERIFICATION_PROOF_PREFIX: &str = "eip712v2";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

/// Everything a single send carries before it is signed and encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendNotificationOptions {
    pub delivery_type: u8,
    pub identity_type: u8,
    pub notification: NotificationContent,
    pub recipient: String,
    pub channel: String,
}

impl SendNotificationOptions {
    pub fn targeted(channel: &ChannelIdentity, request: &NotificationRequest) -> Self {
        Self {
            delivery_type: DELIVERY_TYPE_TARGETED,
            identity_type: IDENTITY_TYPE_MINIMAL,
            notification: NotificationContent {
                title: request.title.clone(),
                body: request.body.clone(),
            },
            recipient: caip10_id(channel.chain_id, &request.recipient),
            channel: channel.caip10(),
        }
    }

    /// `{identity type}+{delivery type}+{title}+{body}`
    pub fn identity(&self) -> String {
        format!(
            "{}+{}+{}+{}",
            self.identity_type,
            self.delivery_type,
            self.notification.title,
            self.notification.body
        )
    }
}

/// Body of `POST /v1/payloads/`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadBody {
    pub verification_proof: String,
    pub identity: String,
    pub sender: String,
    pub source: String,
    pub recipient: String,
}

/// Name the push backend uses for the chain a channel lives on
pub fn chain_source(chain_id: u64) -> Result<&'static str, PushError> {
    match chain_id {
        1 => Ok("ETH_MAINNET"),
        11155111 => Ok("ETH_TEST_SEPOLIA"),
        other => Err(PushError::UnsupportedChain(other)),
    }
}

/// The EIP-712 document signed for a payload identity
pub fn typed_data(identity: &str, chain_id: u64, comm_contract: Address) -> Result<TypedData, PushError> {
    let document = serde_json::json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "Data": [
                { "name": "data", "type": "string" }
            ]
        },
        "primaryType": "Data",
        "domain": {
            "name": EIP712_DOMAIN_NAME,
            "chainId": chain_id,
            "verifyingContract": format!("{:?}", comm_contract)
        },
        "message": { "data": identity }
    });

    serde_json::from_value(document).map_err(PushError::signing)
}

pub async fn sign(
    options: &SendNotificationOptions,
    signer: &LocalWallet,
    chain_id: u64,
    comm_contract: Address,
) -> Result<PayloadBody, PushError> {
    let identity = options.identity();
    let document = typed_data(&identity, chain_id, comm_contract)?;
    let signature = signer
        .sign_typed_data(&document)
        .await
        .map_err(PushError::signing)?;

    Ok(PayloadBody {
        verification_proof: format!(
            "{}:0x{}",
            VERIFICATION_PROOF_PREFIX,
            hex::encode(signature.to_vec())
        ),
        identity,
        sender: options.channel.clone(),
        source: chain_source(chain_id)?.to_string(),
        recipient: options.recipient.clone(),
    })
}
