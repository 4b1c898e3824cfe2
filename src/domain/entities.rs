use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const TRADE_SITE_BASE: &str = "https://www.pathofexile.com/trade";

/// Sentinel reference id used when the primary search returned nothing usable.
pub const ERROR_REFERENCE_ID: &str = "Error";

/// Which of the two trade sub-markets an item is priced on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Item,
    Currency,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Item => "item",
            Category::Currency => "currency",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "item" => Some(Category::Item),
            "currency" => Some(Category::Currency),
            _ => None,
        }
    }
}

/// Cached market estimate for one item within one league.
///
/// `price` is in primary-denomination units; 0 means "unknown". `liquidity`
/// is a 0..=5 score derived from listing recency (0 worst, 5 best).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemValuation {
    pub name: String,
    pub league: String,
    pub price: i64,
    pub liquidity: u8,
    /// Upstream query id, kept so a search link can be regenerated later.
    pub reference_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub category: Category,
}

impl ItemValuation {
    /// Zero-valued placeholder for items that are not in the cache yet.
    pub fn unknown(name: &str, league: &str) -> Self {
        Self {
            name: name.to_string(),
            league: league.to_string(),
            price: 0,
            liquidity: 0,
            reference_id: ERROR_REFERENCE_ID.to_string(),
            checked_at: OffsetDateTime::UNIX_EPOCH,
            category: Category::Item,
        }
    }

    /// Link back to the upstream search this valuation was built from.
    pub fn search_link(&self) -> String {
        match self.category {
            Category::Item => format!(
                "{TRADE_SITE_BASE}/search/{}/{}",
                self.league, self.reference_id
            ),
            Category::Currency => format!(
                "{TRADE_SITE_BASE}/exchange/{}/{}",
                self.league, self.reference_id
            ),
        }
    }
}
