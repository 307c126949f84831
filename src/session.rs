use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::broadcast;

use crate::command::Command;
use crate::error_log::{ErrorLogStore, FailureRecord};
use crate::metadata::PageMetadata;
use crate::page::{PageController, PriceApplied, PriceRequest};
use crate::price::PriceSource;
use crate::trends::TrendSource;

/// Runs the page's fetches as tokio tasks and folds their results back into
/// the controller. Results travel over the broadcast channel so a UI loop
/// can interleave them with its own events.
pub struct PageSession<M: PageMetadata> {
    page: PageController<M>,
    prices: Arc<dyn PriceSource>,
    trends: Arc<dyn TrendSource>,
    error_log: Option<ErrorLogStore>,
    tx: broadcast::Sender<Command>,
}

impl<M: PageMetadata> PageSession<M> {
    pub fn new(
        page: PageController<M>,
        prices: Arc<dyn PriceSource>,
        trends: Arc<dyn TrendSource>,
        error_log: Option<ErrorLogStore>,
        tx: broadcast::Sender<Command>,
    ) -> Self {
        PageSession {
            page,
            prices,
            trends,
            error_log,
            tx,
        }
    }

    pub fn page(&self) -> &PageController<M> {
        &self.page
    }

    pub fn mount(&mut self) {
        if !self.page.mount() {
            return;
        }
        let trends = Arc::clone(&self.trends);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = trends.fetch_trends().await;
            let _ = tx.send(Command::TrendsSettled(outcome));
        });
    }

    pub fn navigate(&mut self, raw: Option<&str>) -> bool {
        match self.page.navigate(raw) {
            Some(request) => {
                self.spawn_price_fetch(request);
                true
            }
            None => false,
        }
    }

    pub fn reload(&mut self) -> bool {
        match self.page.reload() {
            Some(request) => {
                self.spawn_price_fetch(request);
                true
            }
            None => false,
        }
    }

    fn spawn_price_fetch(&self, request: PriceRequest) {
        let prices = Arc::clone(&self.prices);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = prices.fetch_price(&request.route).await;
            let _ = tx.send(Command::PriceSettled {
                generation: request.generation,
                route: request.route,
                outcome,
            });
        });
    }

    /// Applies a settled fetch. Returns true when page state changed.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::PriceSettled {
                generation,
                route,
                outcome,
            } => {
                let failure = outcome
                    .as_ref()
                    .err()
                    .map(|err| FailureRecord::price(&route, err));
                if self.page.apply_price(generation, outcome) == PriceApplied::Stale {
                    return false;
                }
                if let Some(failure) = failure {
                    self.record_failure(&failure);
                }
                true
            }
            Command::TrendsSettled(outcome) => {
                if let Err(err) = &outcome {
                    self.record_failure(&FailureRecord::trends(err));
                }
                self.page.apply_trends(outcome);
                true
            }
            Command::Error(_) | Command::Exit => false,
        }
    }

    fn record_failure(&self, failure: &FailureRecord) {
        let Some(store) = &self.error_log else {
            return;
        };
        if let Err(err) = store.record(failure) {
            log::error!("failed to write error log: {err}");
            let _ = self
                .tx
                .send(Command::Error(format!("failed to write error log: {err}")));
        }
    }

    /// Waits until no fetch is outstanding.
    pub async fn run_until_settled(
        &mut self,
        rx: &mut broadcast::Receiver<Command>,
    ) -> Result<(), anyhow::Error> {
        while !self.page.is_settled() {
            match rx.recv().await {
                Ok(command) => {
                    self.handle(command);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(anyhow!("command channel closed before page settled"));
                }
            }
        }
        Ok(())
    }
}
