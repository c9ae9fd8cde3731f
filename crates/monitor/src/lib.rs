use std::time::Duration;

use anyhow::Result;
use extract::{Patterns, Scan};
use fetch::{FetchError, PageClient};
use futures::stream::{self, StreamExt};
use metrics::MonitorMetrics;
use notify::Alerter;
use state::{Observation, StateStore, TrackedItem};
use tracing::{error, info, warn};

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No page yielded a usable observation; nothing diffed, nothing
    /// committed. A first cycle ending here does not count as the
    /// baseline run.
    NoObservations,
    /// First populated cycle ever: baseline recorded, no notification.
    Initialized(usize),
    /// Every observation matched its committed entry.
    Unchanged,
    /// A change was flagged; the full n-item snapshot was sent and
    /// committed.
    Notified(usize),
}

pub struct Monitor<A> {
    items: Vec<TrackedItem>,
    client: PageClient,
    patterns: Patterns,
    max_workers: usize,
    interval: Duration,
    alerter: A,
    metrics: MonitorMetrics,
    store: StateStore,
}

impl<A: Alerter> Monitor<A> {
    pub fn new(
        items: Vec<TrackedItem>,
        client: PageClient,
        patterns: Patterns,
        max_workers: usize,
        interval: Duration,
        alerter: A,
        metrics: MonitorMetrics,
    ) -> Self {
        Self {
            items,
            client,
            patterns,
            // buffer_unordered(0) would never poll anything
            max_workers: max_workers.max(1),
            interval,
            alerter,
            metrics,
            store: StateStore::new(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run forever. A failed cycle is logged and the loop continues after
    /// the same fixed sleep; nothing in here is fatal.
    pub async fn run(mut self) -> Result<()> {
        info!(
            items = self.items.len(),
            interval_secs = self.interval.as_secs(),
            workers = self.max_workers,
            "monitor loop starting"
        );
        loop {
            match self.run_cycle().await {
                Ok(outcome) => info!(?outcome, "cycle complete"),
                Err(err) => error!(error = ?err, "cycle failed"),
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One full cycle: fan out fetch+extract for every tracked item, join,
    /// then diff/notify/commit.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.metrics.cycles.inc();
        let observations = self.observe_all().await;
        Ok(self.apply(observations).await)
    }

    /// Fetch and extract all tracked items with bounded concurrency. The
    /// collect is the cycle barrier: every result is in before the diff
    /// runs. Failures are logged here and dropped from the cycle.
    async fn observe_all(&self) -> Vec<Observation> {
        let results: Vec<(&TrackedItem, Result<Option<Observation>, FetchError>)> =
            stream::iter(self.items.iter())
                .map(|item| async move { (item, self.observe(item).await) })
                .buffer_unordered(self.max_workers)
                .collect()
                .await;

        let mut observations = Vec::with_capacity(results.len());
        for (item, result) in results {
            match result {
                Ok(Some(obs)) => observations.push(obs),
                Ok(None) => {}
                Err(err) => {
                    self.metrics.fetch_failures.inc();
                    error!(item = %item.name, url = %item.url, error = %err, "page fetch failed");
                }
            }
        }
        observations
    }

    async fn observe(&self, item: &TrackedItem) -> Result<Option<Observation>, FetchError> {
        let text = self.client.fetch_text(&item.url).await?;
        match self.patterns.scan(&text) {
            Scan::Full { stock, price } => {
                info!(item = %item.name, stock, price, "page observed");
                Ok(Some(Observation::new(item, stock, price)))
            }
            Scan::StockOnly { stock } => {
                warn!(item = %item.name, stock, "price not found on page, tracking stock only");
                Ok(Some(Observation::new(item, stock, 0.0)))
            }
            Scan::Missing { price_found } => {
                if price_found {
                    warn!(item = %item.name, "stock not found on page");
                } else {
                    warn!(item = %item.name, "stock and price not found on page");
                }
                Ok(None)
            }
        }
    }

    /// Diff the cycle's observations against the committed state and act.
    async fn apply(&mut self, mut observations: Vec<Observation>) -> CycleOutcome {
        if observations.is_empty() {
            warn!("no page yielded a usable observation, skipping cycle");
            return CycleOutcome::NoObservations;
        }

        if self.store.is_empty() {
            for obs in &observations {
                info!(item = %obs.name, stock = obs.stock, price = obs.price, "baseline recorded");
            }
            self.store.commit(&observations);
            return CycleOutcome::Initialized(observations.len());
        }

        if !snapshot_changed(&self.store, &observations) {
            return CycleOutcome::Unchanged;
        }

        observations.sort_by(|a, b| a.name.cmp(&b.name));
        info!(items = observations.len(), "change detected, sending notification");
        match self.alerter.send_snapshot(&observations).await {
            Ok(()) => {
                self.metrics.notifications.inc();
                info!("notification sent");
            }
            Err(err) => {
                self.metrics.notification_failures.inc();
                error!(error = %err, "notification delivery failed");
            }
        }
        // The commit is decided by the diff, not by delivery.
        self.store.commit(&observations);
        CycleOutcome::Notified(observations.len())
    }
}

/// True as soon as one observation differs from its committed entry: a url
/// with no prior entry, a stock difference, or a price difference (exact
/// compare; prices re-parse from the same markup, so no epsilon).
fn snapshot_changed(store: &StateStore, observations: &[Observation]) -> bool {
    observations.iter().any(|obs| match store.get(&obs.url) {
        None => true,
        Some(entry) => entry.stock != obs.stock || entry.price != obs.price,
    })
}
