//! The valuation engine: one synchronous estimate per call, no internal
//! retry.
//!
//! Items are sampled on both price denominations and folded into a single
//! (price, liquidity) pair; currency instruments go through the exchange
//! market instead.

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::domain::{
    combine_branches, Category, ItemValuation, ListingSample, ERROR_REFERENCE_ID,
};
use crate::infra::config::{with_currency_filter, ConfigError, QueryLibrary, ScannerConfig};
use crate::infra::store::{ItemStore, StoreError};
use crate::infra::trade_api::{Listing, SearchPage, TradeApiClient, TradeApiError};

/// Conservative stand-in when the exchange market returns listings we cannot
/// price: keeps the downstream rate conversion from collapsing to zero.
const CURRENCY_FALLBACK_PRICE: i64 = 100;

#[derive(Debug, Error)]
pub enum ValuateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] TradeApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ValuateError {
    /// Connectivity failures unwind all the way to the orchestrator's
    /// backoff loop; everything else is handled per item.
    pub fn aborts_pass(&self) -> bool {
        matches!(self, ValuateError::Api(error) if error.is_connectivity())
    }
}

pub struct Valuator<'a> {
    api: &'a TradeApiClient,
    queries: &'a QueryLibrary,
    config: &'a ScannerConfig,
}

impl<'a> Valuator<'a> {
    pub fn new(api: &'a TradeApiClient, queries: &'a QueryLibrary, config: &'a ScannerConfig) -> Self {
        Self {
            api,
            queries,
            config,
        }
    }

    /// Build a fresh valuation for one item from live listings.
    pub async fn valuate(
        &self,
        store: &ItemStore,
        name: &str,
        league: &str,
        category: Category,
    ) -> Result<ItemValuation, ValuateError> {
        let query = self.queries.load_query(name)?;

        match category {
            Category::Item => self.valuate_item(store, name, league, &query).await,
            Category::Currency => self.valuate_currency(name, league, &query).await,
        }
    }

    async fn valuate_item(
        &self,
        store: &ItemStore,
        name: &str,
        league: &str,
        query: &serde_json::Value,
    ) -> Result<ItemValuation, ValuateError> {
        let primary = self
            .sample_branch(
                name,
                league,
                &with_currency_filter(query, &self.config.primary_denomination),
                1.0,
            )
            .await?;

        // Secondary amounts are normalized through the cached exchange rate;
        // without a usable rate the branch degrades to empty.
        let secondary = match self.exchange_rate(store, league)? {
            Some(rate) => {
                self.sample_branch(
                    name,
                    league,
                    &with_currency_filter(query, &self.config.secondary_denomination),
                    rate,
                )
                .await?
            }
            None => {
                warn!(
                    item = name,
                    rate_item = %self.config.exchange_rate_item,
                    "no cached exchange rate, skipping the secondary denomination"
                );
                Vec::new()
            }
        };

        let (price, liquidity) =
            combine_branches(&primary, &secondary, self.config.liquidity_horizon_minutes);

        // A final un-filtered search supplies the id the report links to.
        let reference_page = self.api.search(league, query).await?;
        let reference_id = match reference_page.query_id {
            Some(id) => id,
            None => {
                warn!(item = name, "primary search returned no usable result, link will be broken");
                ERROR_REFERENCE_ID.to_string()
            }
        };

        debug!(item = name, price, liquidity, "item valuated");

        Ok(ItemValuation {
            name: name.to_string(),
            league: league.to_string(),
            price,
            liquidity,
            reference_id,
            checked_at: OffsetDateTime::now_utc(),
            category: Category::Item,
        })
    }

    async fn valuate_currency(
        &self,
        name: &str,
        league: &str,
        query: &serde_json::Value,
    ) -> Result<ItemValuation, ValuateError> {
        let page = self.api.exchange_search(league, query).await?;

        let (price, liquidity, reference_id) = match page.query_id {
            Some(query_id) if !page.is_empty() => {
                let listings = self.api.fetch_listings(&page.listing_ids, &query_id).await?;
                // The least recent retrieved offer: deliberately dampens
                // wind-up pricing on the exchange market.
                let price = listings
                    .last()
                    .map(|listing| listing.amount as i64)
                    .unwrap_or(CURRENCY_FALLBACK_PRICE);
                (price, 5, query_id)
            }
            Some(query_id) => (CURRENCY_FALLBACK_PRICE, 5, query_id),
            None => {
                warn!(item = name, "exchange search returned no usable result");
                (0, 0, ERROR_REFERENCE_ID.to_string())
            }
        };

        debug!(item = name, price, liquidity, "currency valuated");

        Ok(ItemValuation {
            name: name.to_string(),
            league: league.to_string(),
            price,
            liquidity,
            reference_id,
            checked_at: OffsetDateTime::now_utc(),
            category: Category::Currency,
        })
    }

    /// Search one denomination and reduce the first 10 listings to samples,
    /// with amounts scaled into primary units.
    async fn sample_branch(
        &self,
        name: &str,
        league: &str,
        query: &serde_json::Value,
        rate: f64,
    ) -> Result<Vec<ListingSample>, ValuateError> {
        let page = self.api.search(league, query).await?;
        let Some(query_id) = branch_query_id(&page) else {
            debug!(item = name, "search yielded no listings to sample");
            return Ok(Vec::new());
        };

        let listings = self.api.fetch_listings(&page.listing_ids, query_id).await?;
        let now = OffsetDateTime::now_utc();
        Ok(listings
            .iter()
            .map(|listing| to_sample(listing, rate, now))
            .collect())
    }

    fn exchange_rate(&self, store: &ItemStore, league: &str) -> Result<Option<f64>, StoreError> {
        let rate = store
            .get(&self.config.exchange_rate_item, league)?
            .map(|valuation| valuation.price as f64)
            .filter(|&rate| rate > 0.0);
        Ok(rate)
    }
}

/// A branch is only samplable when the search produced both a query id and
/// at least one listing id. Borrows the page so it stays usable for the
/// follow-up listing fetch.
fn branch_query_id(page: &SearchPage) -> Option<&str> {
    if page.is_empty() {
        return None;
    }
    page.query_id.as_deref()
}

fn to_sample(listing: &Listing, rate: f64, now: OffsetDateTime) -> ListingSample {
    let age_minutes = (now - listing.indexed_at).whole_minutes().max(0);
    ListingSample {
        amount: listing.amount * rate,
        age_minutes,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn samples_scale_by_the_exchange_rate() {
        let listing = Listing {
            amount: 2.5,
            indexed_at: datetime!(2021-01-10 11:00:00 UTC),
        };
        let now = datetime!(2021-01-10 12:30:30 UTC);

        let sample = to_sample(&listing, 60.0, now);
        assert_eq!(sample.amount, 150.0);
        assert_eq!(sample.age_minutes, 90);
    }

    #[test]
    fn branch_query_id_leaves_the_page_intact_for_the_fetch() {
        let page = SearchPage {
            query_id: Some("abc123".to_string()),
            listing_ids: vec!["l1".to_string(), "l2".to_string()],
        };

        let query_id = branch_query_id(&page);
        assert_eq!(query_id, Some("abc123"));
        // The listing ids must still be addressable after extracting the id.
        assert_eq!(page.listing_ids.len(), 2);
    }

    #[test]
    fn branch_without_id_or_listings_is_not_samplable() {
        let no_id = SearchPage {
            query_id: None,
            listing_ids: vec!["l1".to_string()],
        };
        let no_listings = SearchPage {
            query_id: Some("abc123".to_string()),
            listing_ids: Vec::new(),
        };

        assert_eq!(branch_query_id(&no_id), None);
        assert_eq!(branch_query_id(&no_listings), None);
    }

    #[test]
    fn future_timestamps_clamp_to_zero_age() {
        let listing = Listing {
            amount: 1.0,
            indexed_at: datetime!(2021-01-10 13:00:00 UTC),
        };
        let now = datetime!(2021-01-10 12:00:00 UTC);

        assert_eq!(to_sample(&listing, 1.0, now).age_minutes, 0);
    }
}
