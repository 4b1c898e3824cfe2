//! Thin asynchronous client for the official trade API.
//!
//! - Search + fetch for the two trade sub-markets (item search and currency
//!   exchange) plus league discovery.
//! - A response missing the expected `result` collection is tolerated and
//!   degrades to an empty page with a warning; only transport failures are
//!   returned as errors.

use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://www.pathofexile.com/api/trade/";
const USER_AGENT: &str = "recipe-value-scanner/1.0.0";

/// Upstream caps listing detail requests at 10 ids per call.
pub const MAX_FETCH_LISTINGS: usize = 10;

#[derive(Debug, Error)]
pub enum TradeApiError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
}

impl TradeApiError {
    /// Transport-level failures abort the whole refresh pass; everything
    /// else is handled closer to the call site.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TradeApiError::Http(_))
    }
}

/// One page of search results: the upstream query id plus the ordered
/// listing ids that matched. An invalid response keeps whatever id was
/// present and carries no listings.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchPage {
    pub query_id: Option<String>,
    pub listing_ids: Vec<String>,
}

impl SearchPage {
    pub fn is_empty(&self) -> bool {
        self.listing_ids.is_empty()
    }
}

/// Listing detail reduced to the two fields the valuation math needs.
#[derive(Clone, Debug, PartialEq)]
pub struct Listing {
    pub amount: f64,
    pub indexed_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct TradeApiClient {
    http: Client,
    base_url: Url,
}

impl TradeApiClient {
    pub fn new() -> Result<Self, TradeApiError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base: &str) -> Result<Self, TradeApiError> {
        let base_url = Url::parse(base)?;
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, base_url })
    }

    /// Resolve the league the scanner runs against: the first entry of the
    /// upstream league list, looked up once at startup.
    pub async fn current_league(&self) -> Result<String, TradeApiError> {
        let url = self.url("data/leagues")?;
        let response: LeaguesDto = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|league| league.id)
            .ok_or_else(|| TradeApiError::Api("league list was empty".into()))
    }

    /// Item-market search. The query document is opaque to the client.
    pub async fn search(
        &self,
        league: &str,
        query: &serde_json::Value,
    ) -> Result<SearchPage, TradeApiError> {
        let url = self.url(&format!("search/{league}"))?;
        self.post_search(url, query).await
    }

    /// Currency-exchange search, same shape as `search` on a different
    /// endpoint.
    pub async fn exchange_search(
        &self,
        league: &str,
        query: &serde_json::Value,
    ) -> Result<SearchPage, TradeApiError> {
        let url = self.url(&format!("exchange/{league}"))?;
        self.post_search(url, query).await
    }

    /// Fetch listing detail for up to [`MAX_FETCH_LISTINGS`] ids. Listings
    /// without a usable price or timestamp are dropped.
    pub async fn fetch_listings(
        &self,
        listing_ids: &[String],
        query_id: &str,
    ) -> Result<Vec<Listing>, TradeApiError> {
        if listing_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = listing_ids
            .iter()
            .take(MAX_FETCH_LISTINGS)
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        let mut url = self.url(&format!("fetch/{ids}"))?;
        url.query_pairs_mut().append_pair("query", query_id);

        let response: FetchDto = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(entries) = response.result else {
            warn!(query_id, "fetch response missing the result collection, treating it as empty");
            return Ok(Vec::new());
        };

        Ok(entries
            .into_iter()
            .filter_map(Listing::from_dto)
            .collect())
    }

    async fn post_search(
        &self,
        url: Url,
        query: &serde_json::Value,
    ) -> Result<SearchPage, TradeApiError> {
        let response: SearchDto = self
            .http
            .post(url)
            .json(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let SearchDto { id, result } = response;
        if result.is_none() {
            warn!("search response missing the result collection, treating it as empty");
        }

        Ok(SearchPage {
            query_id: id,
            listing_ids: result.unwrap_or_default(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

#[derive(Debug, Deserialize)]
struct LeaguesDto {
    #[serde(default)]
    result: Option<Vec<LeagueDto>>,
}

#[derive(Debug, Deserialize)]
struct LeagueDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchDto {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct FetchDto {
    #[serde(default)]
    result: Option<Vec<FetchEntryDto>>,
}

#[derive(Debug, Deserialize)]
struct FetchEntryDto {
    #[serde(default)]
    listing: Option<ListingDto>,
}

#[derive(Debug, Deserialize)]
struct ListingDto {
    #[serde(default)]
    price: Option<PriceDto>,
    #[serde(default)]
    indexed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    #[serde(default)]
    amount: Option<f64>,
}

impl Listing {
    fn from_dto(entry: FetchEntryDto) -> Option<Self> {
        let listing = entry.listing?;
        let amount = listing.price.and_then(|price| price.amount)?;
        let indexed_at = parse_timestamp(listing.indexed.as_deref())?;
        Some(Listing { amount, indexed_at })
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<OffsetDateTime> {
    let value = raw?;
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(timestamp = value, %error, "listing carried an unparseable timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listings_without_price_or_timestamp_are_dropped() {
        let complete = FetchEntryDto {
            listing: Some(ListingDto {
                price: Some(PriceDto { amount: Some(4.5) }),
                indexed: Some("2021-01-10T12:00:00Z".to_string()),
            }),
        };
        let priceless = FetchEntryDto {
            listing: Some(ListingDto {
                price: None,
                indexed: Some("2021-01-10T12:00:00Z".to_string()),
            }),
        };
        let dateless = FetchEntryDto {
            listing: Some(ListingDto {
                price: Some(PriceDto { amount: Some(1.0) }),
                indexed: None,
            }),
        };

        assert_eq!(Listing::from_dto(complete).map(|l| l.amount), Some(4.5));
        assert!(Listing::from_dto(priceless).is_none());
        assert!(Listing::from_dto(dateless).is_none());
    }

    #[test]
    fn search_page_without_results_is_empty() {
        let page = SearchPage {
            query_id: Some("abc".to_string()),
            listing_ids: Vec::new(),
        };
        assert!(page.is_empty());
    }
}
