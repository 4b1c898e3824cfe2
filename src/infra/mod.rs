pub mod config;
pub mod store;
pub mod trade_api;
pub mod valuator;

pub use config::{load_recipe_groups, with_currency_filter, ConfigError, QueryLibrary, RecipeGroup, ScannerConfig};
pub use store::{ItemStore, PutOutcome, StoreError};
pub use trade_api::{Listing, SearchPage, TradeApiClient, TradeApiError, MAX_FETCH_LISTINGS};
pub use valuator::{ValuateError, Valuator};
