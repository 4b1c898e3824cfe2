//! Domain logic for item valuation and recipe profitability lives here.

pub mod entities;
pub mod recipe;
pub mod valuation;

pub use entities::{Category, ItemValuation, ERROR_REFERENCE_ID};
pub use recipe::{evaluate, rank_by_profit, Recipe, RecipeDefinition, ValuationSource};
pub use valuation::{
    branch_stats, combine_branches, liquidity_bucket, BranchStats, ListingSample,
    DEFAULT_LIQUIDITY_HORIZON_MINUTES,
};
