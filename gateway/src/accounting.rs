//! Usage accounting.
//!
//! Completions push a report onto a bounded queue and move on. A single
//! background worker books each report against the ledger. Ledger failures
//! are logged and dropped; they never reach the client.

use ai4all_core::Usage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    /// Ledger units, see [`ai4all_core::usage_cost`]
    pub cost: u32,
    /// Public model id the client asked for
    pub model: String,
}

impl UsageReport {
    pub fn new(usage: Usage, model: impl Into<String>) -> Self {
        Self {
            cost: usage.cost(),
            model: model.into(),
        }
    }

    pub fn memo(&self) -> String {
        format!("inference:{}", self.model)
    }
}

#[derive(Debug, Clone)]
pub struct UsageAccountant {
    tx: mpsc::Sender<UsageReport>,
}

/// Handle on the background worker. The worker stops once every
/// [`UsageAccountant`] clone is dropped and the queue is empty.
pub struct AccountantWorker {
    handle: JoinHandle<()>,
}

impl UsageAccountant {
    pub fn spawn(ledger: Arc<dyn Ledger>, capacity: usize) -> (Self, AccountantWorker) {
        let (tx, mut rx) = mpsc::channel::<UsageReport>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                match ledger.spend(report.cost, &report.memo()).await {
                    Ok(()) => tracing::debug!(
                        model = %report.model,
                        cost = report.cost,
                        "Usage booked"
                    ),
                    Err(e) => tracing::debug!(
                        model = %report.model,
                        cost = report.cost,
                        reason = e.kind(),
                        "Usage not booked: {}",
                        e
                    ),
                }
            }
            tracing::debug!("Usage accountant stopped");
        });

        (Self { tx }, AccountantWorker { handle })
    }

    /// Queue a report without waiting. Drops it if the queue is full.
    pub fn report(&self, usage: Usage, model: &str) {
        let report = UsageReport::new(usage, model);
        if let Err(e) = self.tx.try_send(report) {
            tracing::warn!("Dropping usage report: {}", e);
        }
    }
}

impl AccountantWorker {
    /// Wait for queued reports to be booked, up to `timeout`.
    pub async fn drain(self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.handle).await.is_err() {
            tracing::warn!("Usage accountant did not drain within {:?}", timeout);
        }
    }
}
