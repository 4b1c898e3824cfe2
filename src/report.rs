//! The seam towards the report renderer.
//!
//! Rendering itself (spreadsheets, UIs) lives outside this crate; the core
//! only guarantees fully populated valuations and recipes ranked by profit.

use thiserror::Error;
use tracing::info;

use crate::domain::{evaluate, rank_by_profit, Recipe};
use crate::infra::config::RecipeGroup;
use crate::infra::store::{ItemStore, StoreError};

#[derive(Debug, Error)]
pub enum ReportError {
    /// The output artifact is locked or in use elsewhere. Retryable: the
    /// next cycle simply tries again.
    #[error("report output is in use: {0}")]
    Conflict(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One evaluated recipe group, already ranked by descending profit.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedGroup {
    pub name: String,
    pub recipes: Vec<Recipe>,
}

/// Evaluate every configured recipe group against the current cache and
/// rank each group by profit. Pure over the cache, no network access.
pub fn build_report(
    groups: &[RecipeGroup],
    league: &str,
    store: &ItemStore,
) -> Result<Vec<RankedGroup>, StoreError> {
    let mut ranked = Vec::with_capacity(groups.len());
    for group in groups {
        let mut recipes = Vec::with_capacity(group.recipes.len());
        for (name, definition) in &group.recipes {
            recipes.push(evaluate(name, league, definition, store)?);
        }
        ranked.push(RankedGroup {
            name: group.name.clone(),
            recipes: rank_by_profit(recipes),
        });
    }
    Ok(ranked)
}

/// Consumer of the ranked recipes. Real deployments plug a spreadsheet or
/// web renderer in here; tests plug in fakes.
pub trait ReportSink {
    fn render(&mut self, report: &[RankedGroup]) -> Result<(), ReportError>;
}

/// Default sink: logs the ranked groups. Keeps the scanner observable even
/// with no external renderer attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn render(&mut self, report: &[RankedGroup]) -> Result<(), ReportError> {
        for group in report {
            for recipe in &group.recipes {
                info!(
                    group = %group.name,
                    recipe = %recipe.name,
                    cost = recipe.cost,
                    revenue = recipe.revenue,
                    profit = recipe.profit,
                    roi = recipe.roi,
                    "recipe evaluated"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ItemValuation, RecipeDefinition};

    use time::macros::datetime;

    fn stored(name: &str, price: i64) -> ItemValuation {
        ItemValuation {
            name: name.to_string(),
            league: "Ritual".to_string(),
            price,
            liquidity: 3,
            reference_id: "q".to_string(),
            checked_at: datetime!(2021-01-10 12:00:00 UTC),
            category: Category::Item,
        }
    }

    fn recipe(components: &[(&str, f64)], results: &[(&str, f64)]) -> RecipeDefinition {
        RecipeDefinition {
            components: components.iter().map(|&(n, q)| (n.to_string(), q)).collect(),
            results: results.iter().map(|&(n, q)| (n.to_string(), q)).collect(),
            wiki: "https://wiki.example".to_string(),
        }
    }

    #[test]
    fn groups_are_ranked_independently() {
        let mut store = ItemStore::open_in_memory().unwrap();
        store.put(&stored("a", 10)).unwrap();
        store.put(&stored("b", 50)).unwrap();
        store.put(&stored("c", 100)).unwrap();

        let groups = vec![RecipeGroup {
            name: "vendor_recipes".to_string(),
            recipes: vec![
                ("small".to_string(), recipe(&[("a", 1.0)], &[("b", 1.0)])),
                ("large".to_string(), recipe(&[("a", 1.0)], &[("c", 1.0)])),
            ],
        }];

        let report = build_report(&groups, "Ritual", &store).unwrap();
        assert_eq!(report.len(), 1);
        let names: Vec<&str> = report[0].recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["large", "small"]);
        assert_eq!(report[0].recipes[0].profit, 90.0);
    }
}
