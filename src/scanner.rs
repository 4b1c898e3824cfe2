//! The refresh orchestrator: a long-running polling loop that keeps the
//! valuation cache fresh.
//!
//! One pass revalues the exchange rate first (item valuations depend on it),
//! then every configured query in a freshly shuffled order, pacing requests
//! with fixed cooldowns. Connectivity loss aborts the pass and restarts it
//! after a backoff; the loop never terminates on its own.

use rand::seq::SliceRandom;
use rand::thread_rng;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::domain::{Category, ItemValuation};
use crate::infra::config::{QueryLibrary, RecipeGroup, ScannerConfig};
use crate::infra::store::{ItemStore, PutOutcome};
use crate::infra::trade_api::TradeApiClient;
use crate::infra::valuator::{ValuateError, Valuator};
use crate::report::{build_report, ReportSink};

/// Where the orchestrator currently is in its pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Revaluing the exchange-rate item before anything else.
    Bootstrapping,
    /// Walking the shuffled query list.
    Cycling,
    /// Waiting out a connectivity failure before the next pass.
    Backoff,
}

pub struct RefreshOrchestrator<S: ReportSink> {
    api: TradeApiClient,
    queries: QueryLibrary,
    recipe_groups: Vec<RecipeGroup>,
    store: ItemStore,
    config: ScannerConfig,
    league: String,
    sink: S,
    phase: Phase,
}

impl<S: ReportSink> RefreshOrchestrator<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: TradeApiClient,
        queries: QueryLibrary,
        recipe_groups: Vec<RecipeGroup>,
        store: ItemStore,
        config: ScannerConfig,
        league: String,
        sink: S,
    ) -> Self {
        Self {
            api,
            queries,
            recipe_groups,
            store,
            config,
            league,
            sink,
            phase: Phase::Bootstrapping,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run passes forever. Each failed pass is retried from the bootstrap
    /// step after the configured backoff.
    pub async fn run(mut self) {
        loop {
            match self.run_pass().await {
                Ok(()) => info!(league = %self.league, "pass complete, starting the next one"),
                Err(error) => {
                    warn!(%error, "pass aborted, retrying after backoff");
                    self.set_phase(Phase::Backoff);
                    sleep(self.config.retry_backoff()).await;
                }
            }
        }
    }

    /// One full pass: bootstrap the exchange rate, then cycle every query.
    /// Only errors that genuinely invalidate the pass escape; per-item
    /// problems are logged and skipped.
    pub async fn run_pass(&mut self) -> Result<(), ValuateError> {
        self.set_phase(Phase::Bootstrapping);
        let rate_item = self.config.exchange_rate_item.clone();
        match self.valuate(&rate_item, Category::Currency).await {
            Ok(valuation) => self.persist(&valuation)?,
            Err(error) if error.aborts_pass() => return Err(error),
            Err(error) => {
                // Item valuations fall back to the last cached rate.
                error!(item = %rate_item, %error, "exchange rate not refreshed, continuing the pass");
            }
        }
        sleep(self.config.bootstrap_cooldown()).await;

        self.set_phase(Phase::Cycling);
        let mut names = self.queries.query_names()?;
        // Randomized order decorrelates staleness from alphabetical bias.
        names.shuffle(&mut thread_rng());

        for name in names {
            let category = if name == rate_item {
                Category::Currency
            } else {
                Category::Item
            };

            match self.valuate(&name, category).await {
                Ok(valuation) => {
                    self.persist(&valuation)?;
                }
                Err(error) if error.aborts_pass() => return Err(error),
                Err(error) => {
                    error!(item = %name, %error, "item could not be valuated, moving on");
                }
            }

            self.render_report();
            sleep(self.config.item_cooldown()).await;
        }

        Ok(())
    }

    async fn valuate(
        &self,
        name: &str,
        category: Category,
    ) -> Result<ItemValuation, ValuateError> {
        Valuator::new(&self.api, &self.queries, &self.config)
            .valuate(&self.store, name, &self.league, category)
            .await
    }

    fn persist(&mut self, valuation: &ItemValuation) -> Result<(), ValuateError> {
        match self.store.put(valuation)? {
            PutOutcome::Inserted => info!(item = %valuation.name, price = valuation.price, "added to the cache"),
            PutOutcome::Updated => info!(item = %valuation.name, price = valuation.price, "cache updated"),
            PutOutcome::Skipped => {
                warn!(item = %valuation.name, "fresh data was invalid, keeping the previous valuation")
            }
        }
        Ok(())
    }

    /// Regenerating the report can legitimately fail (the artifact may be
    /// open elsewhere); that never aborts the pass.
    fn render_report(&mut self) {
        let report = match build_report(&self.recipe_groups, &self.league, &self.store) {
            Ok(report) => report,
            Err(error) => {
                warn!(%error, "could not evaluate recipes this cycle");
                return;
            }
        };
        if let Err(error) = self.sink.render(&report) {
            warn!(%error, "report not updated this cycle, will retry on the next one");
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!(from = ?self.phase, to = ?phase, "orchestrator phase change");
            self.phase = phase;
        }
    }
}
