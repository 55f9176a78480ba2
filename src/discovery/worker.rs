//! Background proposal polling.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::eventbus::EventBus;
use crate::events::ServiceProposal;
use crate::discovery::ProposalRepository;
use crate::net::{HttpClient, HttpError};
use crate::resilience::calculate_backoff;

const BACKOFF_BASE_MS: u64 = 1_000;

/// Polls the discovery API and announces what it finds.
pub struct DiscoveryWorker {
    http: Arc<HttpClient>,
    url: String,
    repository: Arc<ProposalRepository>,
    bus: EventBus,
    interval: Duration,
    stop_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryWorker {
    pub fn new(
        http: Arc<HttpClient>,
        api_address: &str,
        repository: Arc<ProposalRepository>,
        bus: EventBus,
        interval: Duration,
    ) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            http,
            url: format!("{}/proposals", api_address.trim_end_matches('/')),
            repository,
            bus,
            interval,
            stop_tx,
            task: Mutex::new(None),
        }
    }

    /// Spawn the polling loop. Calling it again while running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        let worker = self.clone();
        let shutdown = self.stop_tx.subscribe();
        *task = Some(tokio::spawn(async move { worker.run(shutdown).await }));
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(&self) {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            return;
        };
        let _ = self.stop_tx.send(());
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Discovery worker task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Fetch proposals once and announce new or changed ones.
    pub async fn poll(&self) -> Result<usize, HttpError> {
        let proposals: Vec<ServiceProposal> = self.http.get_json(&self.url).await?;
        let mut announced = 0;
        for proposal in proposals {
            if self.repository.upsert(proposal.clone()) {
                self.bus.publish(proposal);
                announced += 1;
            }
        }
        Ok(announced)
    }

    async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(url = %self.url, interval = ?self.interval, "Discovery worker starting");

        let max_backoff_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        let mut failures: u32 = 0;
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = time::sleep(delay) => {
                    match self.poll().await {
                        Ok(announced) => {
                            failures = 0;
                            tracing::debug!(
                                announced,
                                known = self.repository.len(),
                                "Proposals polled"
                            );
                            delay = self.interval;
                        }
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            delay = calculate_backoff(failures, BACKOFF_BASE_MS, max_backoff_ms);
                            tracing::warn!(error = %e, retry_in = ?delay, "Proposal poll failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Discovery worker received stop signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for DiscoveryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryWorker")
            .field("url", &self.url)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
