use super::chain::smartbin::BinReport;
use super::notification::requests_for;
use super::push::PushApi;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::{select, sync::mpsc, task::JoinSet};

/// Outcome of notifying every authority of one report
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Consumes reports from the listener. Every report gets its own task, so
/// sends of different reports may interleave; sends within one report never
/// do.
pub struct Dispatcher {
    push: Arc<dyn PushApi>,
    report_receiver: mpsc::Receiver<BinReport>,
}

impl Dispatcher {
    pub fn new(push: Arc<dyn PushApi>, report_receiver: mpsc::Receiver<BinReport>) -> Self {
        Self {
            push,
            report_receiver,
        }
    }

    /// Returns once the listener side is gone and in-flight reports are done
    pub async fn run(mut self) {
        let mut in_flight = JoinSet::new();
        loop {
            select! {
                report = self.report_receiver.recv() => {
                    match report {
                        Some(report) => {
                            let push = self.push.clone();
                            in_flight.spawn(async move {
                                dispatch_report(push.as_ref(), &report).await
                            });
                        }
                        None => break,
                    }
                },
                Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_finished(finished);
                }
            }
        }

        debug!("(dispatcher) report channel closed, draining {} dispatches", in_flight.len());
        while let Some(finished) = in_flight.join_next().await {
            log_finished(finished);
        }
    }
}

fn log_finished(finished: Result<DispatchSummary, tokio::task::JoinError>) {
    match finished {
        Ok(summary) => debug!(
            "(dispatcher) report done: {} sent, {} failed",
            summary.sent, summary.failed
        ),
        Err(e) => error!("(dispatcher) dispatch task failed: {}", e),
    }
}

/// Sends one notification per non-zero authority, strictly one after the
/// other. A failed send is logged and the next recipient is still tried.
pub async fn dispatch_report<P: PushApi + ?Sized>(push: &P, report: &BinReport) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    for request in requests_for(report) {
        match push.send_notification(&request).await {
            Ok(()) => {
                info!("Notification sent to {:?}", request.recipient);
                summary.sent += 1;
            }
            Err(e) => {
                error!("Failed to notify {:?}: {}", request.recipient, e);
                summary.failed += 1;
            }
        }
    }
    summary
}
