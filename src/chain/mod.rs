pub mod smartbin;

use self::smartbin::{BinReport, BinReportedFilter, SmartBin};
use crate::context::ChannelIdentity;
use crate::notification::render_timestamp;
use crate::push::{PushApi, PushError};
use async_trait::async_trait;
use ethers::types::Address;
use ethers_providers::{Middleware, PubsubClient};
use futures::stream::{BoxStream, Stream, StreamExt};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("no push channel registered for {0:?}")]
    ChannelNotRegistered(Address),
    #[error("channel lookup failed: {0}")]
    ChannelLookup(#[from] PushError),
    #[error("subscription error: {0}")]
    Subscription(String),
}

#[allow(clippy::needless_pass_by_value)]
impl ListenerError {
    pub fn subscription<T: ToString>(msg: T) -> Self {
        Self::Subscription(msg.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Connecting,
    Listening,
}

/// Somewhere `BinReported` occurrences come from
#[async_trait]
pub trait BinEventSource: Send + Sync {
    /// Resolves once the subscription handshake has succeeded. The stream
    /// ends when the underlying subscription is lost.
    async fn subscribe(&self) -> anyhow::Result<BoxStream<'static, BinReport>>;
}

/// Subscribes to `BinReported` logs of a deployed SmartBin contract
pub struct ContractEventSource<M> {
    contract: Arc<SmartBin<M>>,
    buffer: usize,
}

impl<M: Middleware> ContractEventSource<M> {
    pub fn new(address: Address, client: Arc<M>, buffer: usize) -> Self {
        Self {
            contract: Arc::new(SmartBin::new(address, client)),
            buffer: buffer.max(1),
        }
    }
}

#[async_trait]
impl<M> BinEventSource for ContractEventSource<M>
where
    M: Middleware + 'static,
    M::Provider: PubsubClient,
{
    async fn subscribe(&self) -> anyhow::Result<BoxStream<'static, BinReport>> {
        let contract = self.contract.clone();
        let (ready_sender, ready_receiver) = oneshot::channel::<anyhow::Result<()>>();
        let (report_sender, report_receiver) = mpsc::channel(self.buffer);

        // the log stream borrows the event filter, so both live in the pump task
        tokio::spawn(async move {
            let event = contract.bin_reported_filter();
            let mut logs = match event.subscribe().await {
                Ok(logs) => {
                    let _ = ready_sender.send(Ok(()));
                    logs
                }
                Err(e) => {
                    let _ = ready_sender.send(Err(e.into()));
                    return;
                }
            };

            forward_reports(logs, report_sender).await;
        });

        ready_receiver.await??;
        Ok(ReceiverStream::new(report_receiver).boxed())
    }
}

/// Decodes subscription items into reports until the subscription ends or
/// the receiving side is dropped. Items that fail to decode are skipped.
async fn forward_reports<S, E>(mut logs: S, report_sender: mpsc::Sender<BinReport>)
where
    S: Stream<Item = Result<BinReportedFilter, E>> + Unpin,
    E: Into<anyhow::Error>,
{
    while let Some(item) = logs.next().await {
        match item
            .map_err(Into::<anyhow::Error>::into)
            .and_then(BinReport::try_from)
        {
            Ok(report) => {
                if report_sender.send(report).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!("(listener) skipping undecodable BinReported log: {}", e),
        }
    }
    warn!("(listener) BinReported subscription closed");
}

pub struct ChainListener {
    channel: ChannelIdentity,
    state: ListenerState,
    report_sender: mpsc::Sender<BinReport>,
}

impl ChainListener {
    pub fn new(channel: ChannelIdentity, report_sender: mpsc::Sender<BinReport>) -> Self {
        Self {
            channel,
            state: ListenerState::Connecting,
            report_sender,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Fails with `ChannelNotRegistered` when the directory has no channel
    /// for our identity.
    pub async fn check_channel<P: PushApi + ?Sized>(&self, push: &P) -> Result<(), ListenerError> {
        info!("Checking if channel is registered...");
        match push.get_channel(&self.channel.caip10()).await? {
            Some(info) => {
                info!("Channel detected: {}", info.channel);
                Ok(())
            }
            None => {
                error!("No channel found for {:?}", self.channel.address);
                Err(ListenerError::ChannelNotRegistered(self.channel.address))
            }
        }
    }

    /// Runs the pre-flight check, then forwards every report to the
    /// dispatcher until the subscription is lost. There is no reconnection.
    pub async fn run<S, P>(&mut self, source: &S, push: &P) -> Result<(), ListenerError>
    where
        S: BinEventSource + ?Sized,
        P: PushApi + ?Sized,
    {
        self.check_channel(push).await?;

        let mut reports = source
            .subscribe()
            .await
            .map_err(ListenerError::subscription)?;
        self.state = ListenerState::Listening;
        info!("Listening for BinReported events...");

        while let Some(report) = reports.next().await {
            info!(
                "Event: Bin {} is full at {}",
                report.bin_id,
                render_timestamp(report.timestamp)
            );
            emit_report(&self.report_sender, report).await;
        }

        warn!("(listener) event stream ended, no further reports will be delivered");
        Ok(())
    }
}

async fn emit_report(sender: &mpsc::Sender<BinReport>, report: BinReport) {
    if sender.send(report).await.is_err() {
        error!("Report dropped: dispatcher receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SEPOLIA_CHAIN_ID;
    use crate::notification::NotificationRequest;
    use crate::push::ChannelInfo;
    use ethers::types::U256;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Directory {
        registered: bool,
        lookups: AtomicUsize,
    }

    impl Directory {
        fn new(registered: bool) -> Self {
            Self {
                registered,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PushApi for Directory {
        async fn get_channel(&self, channel: &str) -> Result<Option<ChannelInfo>, PushError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.registered.then(|| ChannelInfo {
                channel: channel.to_string(),
                name: None,
            }))
        }

        async fn send_notification(&self, _: &NotificationRequest) -> Result<(), PushError> {
            unreachable!("the listener never sends")
        }
    }

    struct FixedSource {
        reports: Vec<BinReport>,
        subscriptions: AtomicUsize,
    }

    impl FixedSource {
        fn new(reports: Vec<BinReport>) -> Self {
            Self {
                reports,
                subscriptions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BinEventSource for FixedSource {
        async fn subscribe(&self) -> anyhow::Result<BoxStream<'static, BinReport>> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            Ok(futures::stream::iter(self.reports.clone()).boxed())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl BinEventSource for BrokenSource {
        async fn subscribe(&self) -> anyhow::Result<BoxStream<'static, BinReport>> {
            Err(anyhow::anyhow!("websocket handshake failed"))
        }
    }

    fn channel() -> ChannelIdentity {
        ChannelIdentity {
            address: Address::from_low_u64_be(0x5e4d),
            chain_id: SEPOLIA_CHAIN_ID,
        }
    }

    fn report(bin_id: u64) -> BinReport {
        BinReport {
            bin_id: U256::from(bin_id),
            location: "Lot A".to_string(),
            is_full: true,
            timestamp: 1_700_000_000,
            authorities: vec![Address::from_low_u64_be(0xaaa)],
        }
    }

    #[tokio::test]
    async fn unregistered_channel_never_subscribes() {
        let (sender, mut receiver) = mpsc::channel(4);
        let mut listener = ChainListener::new(channel(), sender);
        let directory = Directory::new(false);
        let source = FixedSource::new(vec![report(1)]);

        let err = listener.run(&source, &directory).await.unwrap_err();

        assert!(matches!(err, ListenerError::ChannelNotRegistered(a) if a == channel().address));
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(source.subscriptions.load(Ordering::SeqCst), 0);
        assert_eq!(listener.state(), ListenerState::Connecting);
        drop(listener);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn forwards_reports_in_order() {
        let (sender, mut receiver) = mpsc::channel(4);
        let mut listener = ChainListener::new(channel(), sender);
        let source = FixedSource::new(vec![report(1), report(2), report(3)]);

        listener.run(&source, &Directory::new(true)).await.unwrap();

        assert_eq!(listener.state(), ListenerState::Listening);
        assert_eq!(source.subscriptions.load(Ordering::SeqCst), 1);
        drop(listener);
        let mut ids = vec![];
        while let Some(report) = receiver.recv().await {
            ids.push(report.bin_id.as_u64());
        }
        assert_eq!(ids, vec![1, 2, 3]);
    }

    fn reported(bin_id: u64, timestamp: U256) -> anyhow::Result<BinReportedFilter> {
        Ok(BinReportedFilter {
            bin_id: U256::from(bin_id),
            location: "Lot A".to_string(),
            is_full: true,
            timestamp,
            authorities: vec![Address::from_low_u64_be(0xaaa)],
        })
    }

    #[tokio::test]
    async fn undecodable_logs_are_skipped() {
        let logs = futures::stream::iter(vec![
            reported(1, U256::from(1_700_000_000u64)),
            Err(anyhow::anyhow!("log data does not match the ABI")),
            reported(2, U256::MAX),
            reported(3, U256::from(1_700_000_060u64)),
            reported(4, U256::from(1_700_000_120u64)),
        ]);
        let (sender, receiver) = mpsc::channel(8);

        forward_reports(logs, sender).await;

        let reports: Vec<BinReport> = ReceiverStream::new(receiver).collect().await;
        let ids: Vec<u64> = reports.iter().map(|r| r.bin_id.as_u64()).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(reports[1].timestamp, 1_700_000_060);
    }

    #[tokio::test]
    async fn forwarding_stops_once_receiver_is_gone() {
        let logs = futures::stream::repeat_with(|| reported(1, U256::from(1_700_000_000u64)));
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);

        // an endless subscription still returns
        forward_reports(logs, sender).await;
    }

    #[tokio::test]
    async fn failed_handshake_stays_connecting() {
        let (sender, _receiver) = mpsc::channel(4);
        let mut listener = ChainListener::new(channel(), sender);

        let err = listener
            .run(&BrokenSource, &Directory::new(true))
            .await
            .unwrap_err();

        assert!(matches!(err, ListenerError::Subscription(_)));
        assert_eq!(listener.state(), ListenerState::Connecting);
    }
}
