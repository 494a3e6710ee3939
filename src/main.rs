use clap::Parser;
use ethers_providers::{Provider, Ws};
use log::error;
use smartbin_notifier::{
    chain::{ChainListener, ContractEventSource, ListenerError},
    config::{Cli, Command},
    context::NotifierContext,
    dashboard,
    dispatcher::Dispatcher,
    push::{PushApi, PushClient},
};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let ctx = NotifierContext::from_cli(&cli)?;

    match cli.command {
        Command::Listen => relay(ctx).await,
        Command::Bin(command) => dashboard::execute(&ctx, command).await,
    }
}

/// Listener -> channel -> dispatcher. Runs until the subscription drops.
async fn relay(ctx: NotifierContext) -> anyhow::Result<()> {
    let push: Arc<dyn PushApi> = Arc::new(PushClient::new(&ctx)?);

    let provider = Provider::<Ws>::connect(ctx.rpc_url.as_str()).await?;
    let source =
        ContractEventSource::new(ctx.contract_address, Arc::new(provider), ctx.report_queue_size);

    let (report_sender, report_receiver) = mpsc::channel(ctx.report_queue_size);
    let dispatcher = tokio::spawn(Dispatcher::new(push.clone(), report_receiver).run());

    let mut listener = ChainListener::new(ctx.channel, report_sender);
    if let Err(e) = listener.run(&source, push.as_ref()).await {
        if matches!(e, ListenerError::ChannelNotRegistered(_)) {
            error!("Register the channel with Push before starting the relay");
        }
        return Err(e.into());
    }

    // closes the report channel so the dispatcher can drain and return
    drop(listener);
    dispatcher.await?;
    Ok(())
}
