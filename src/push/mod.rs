//! Client for the Push notification backend: channel lookup and targeted
//! notification delivery.

pub mod payload;

use self::payload::SendNotificationOptions;
use crate::context::{ChannelIdentity, NotifierContext};
use crate::notification::NotificationRequest;
use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::Address;
use ethers::utils::to_checksum;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// CAIP-2 namespace of EVM chains
pub const NAMESPACE: &str = "eip155";
pub const CHANNELS_ROUTE: &str = "/v1/channels";
pub const PAYLOADS_ROUTE: &str = "/v1/payloads/";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `eip155:{chain_id}:{checksummed address}`
pub fn caip10_id(chain_id: u64, address: &Address) -> String {
    format!("{}:{}:{}", NAMESPACE, chain_id, to_checksum(address, None))
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("signing error: {0}")]
    Signing(String),
    #[error("push API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("chain {0} is not supported by the push backend")]
    UnsupportedChain(u64),
}

#[allow(clippy::needless_pass_by_value)]
impl PushError {
    pub fn http<T: ToString>(msg: T) -> Self {
        Self::Http(msg.to_string())
    }

    pub fn signing<T: ToString>(msg: T) -> Self {
        Self::Signing(msg.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PushEnv {
    Prod,
    Staging,
    Dev,
}

impl PushEnv {
    pub fn base_url(&self) -> &'static str {
        match self {
            PushEnv::Prod => "https://backend.epns.io/apis",
            PushEnv::Staging => "https://backend-staging.epns.io/apis",
            PushEnv::Dev => "https://backend-dev.epns.io/apis",
        }
    }
}

/// Directory entry of a registered channel
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[async_trait]
pub trait PushApi: Send + Sync {
    /// Looks up a channel by its CAIP-10 id, `None` when it is not registered
    async fn get_channel(&self, channel: &str) -> Result<Option<ChannelInfo>, PushError>;

    async fn send_notification(&self, request: &NotificationRequest) -> Result<(), PushError>;
}

pub struct PushClient {
    http: Client,
    base_url: String,
    signer: LocalWallet,
    channel: ChannelIdentity,
    comm_contract: Address,
}

impl PushClient {
    pub fn new(ctx: &NotifierContext) -> Result<Self, PushError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(PushError::http)?;

        Ok(Self {
            http,
            base_url: ctx.push.base_url.clone(),
            signer: ctx.wallet.clone(),
            channel: ctx.channel,
            comm_contract: ctx.push.comm_contract,
        })
    }
}

#[async_trait]
impl PushApi for PushClient {
    async fn get_channel(&self, channel: &str) -> Result<Option<ChannelInfo>, PushError> {
        let url = format!("{}{}/{}", self.base_url, CHANNELS_ROUTE, channel);
        let response = self.http.get(url).send().await.map_err(PushError::http)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        response
            .json::<Option<ChannelInfo>>()
            .await
            .map_err(PushError::http)
    }

    async fn send_notification(&self, request: &NotificationRequest) -> Result<(), PushError> {
        let options = SendNotificationOptions::targeted(&self.channel, request);
        let body = payload::sign(
            &options,
            &self.signer,
            self.channel.chain_id,
            self.comm_contract,
        )
        .await?;
        debug!("(push) sending {} to {}", body.identity, body.recipient);

        let url = format!("{}{}", self.base_url, PAYLOADS_ROUTE);
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(PushError::http)?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, PushError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(PushError::Rejected {
        status: status.as_u16(),
        message,
    })
}
