//! Recipe evaluation: composing cached item valuations into cost, revenue,
//! profit and ROI figures.

use serde::Deserialize;
use tracing::warn;

use super::entities::ItemValuation;

/// How the Recipe Evaluator reads valuations. Implemented by the sqlite
/// item store; tests substitute an in-memory source.
pub trait ValuationSource {
    type Error: std::error::Error;

    fn valuation(&self, name: &str, league: &str) -> Result<Option<ItemValuation>, Self::Error>;
}

/// A recipe as configured externally: flat lists of (item name, quantity)
/// pairs plus a wiki reference. Never persisted.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RecipeDefinition {
    pub components: Vec<(String, f64)>,
    pub results: Vec<(String, f64)>,
    pub wiki: String,
}

/// An evaluated recipe, built on demand from the current cache contents.
#[derive(Clone, Debug, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub league: String,
    pub wiki: String,
    pub components: Vec<(ItemValuation, f64)>,
    pub results: Vec<(ItemValuation, f64)>,
    pub cost: f64,
    pub revenue: f64,
    pub profit: f64,
    /// `100 * profit / cost`, rounded to one decimal; 0 when cost is 0.
    pub roi: f64,
}

/// Evaluate one recipe against the cache. Items missing from the cache count
/// as a zero valuation (which silently depresses that line) rather than
/// failing the recipe.
pub fn evaluate<S: ValuationSource>(
    name: &str,
    league: &str,
    definition: &RecipeDefinition,
    source: &S,
) -> Result<Recipe, S::Error> {
    let mut cost = 0.0;
    let mut components = Vec::with_capacity(definition.components.len());
    for (item_name, quantity) in &definition.components {
        let valuation = resolve(source, item_name, league)?;
        cost += valuation.price as f64 * quantity;
        components.push((valuation, *quantity));
    }

    let mut revenue = 0.0;
    let mut results = Vec::with_capacity(definition.results.len());
    for (item_name, quantity) in &definition.results {
        let valuation = resolve(source, item_name, league)?;
        revenue += valuation.price as f64 * quantity;
        results.push((valuation, *quantity));
    }

    let profit = revenue - cost;
    let roi = if cost == 0.0 {
        0.0
    } else {
        (1000.0 * profit / cost).round() / 10.0
    };

    Ok(Recipe {
        name: name.to_string(),
        league: league.to_string(),
        wiki: definition.wiki.clone(),
        components,
        results,
        cost,
        revenue,
        profit,
        roi,
    })
}

fn resolve<S: ValuationSource>(
    source: &S,
    name: &str,
    league: &str,
) -> Result<ItemValuation, S::Error> {
    match source.valuation(name, league)? {
        Some(valuation) => Ok(valuation),
        None => {
            warn!(item = name, league, "item not in the cache yet, counting it as worthless");
            Ok(ItemValuation::unknown(name, league))
        }
    }
}

/// Order recipes by descending profit. The sort is stable, so recipes with
/// equal profit keep their input order.
pub fn rank_by_profit(mut recipes: Vec<Recipe>) -> Vec<Recipe> {
    recipes.sort_by(|a, b| {
        b.profit
            .partial_cmp(&a.profit)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recipes
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::convert::Infallible;

    use time::OffsetDateTime;

    use super::*;
    use crate::domain::entities::Category;

    struct MapSource(HashMap<String, ItemValuation>);

    impl ValuationSource for MapSource {
        type Error = Infallible;

        fn valuation(
            &self,
            name: &str,
            _league: &str,
        ) -> Result<Option<ItemValuation>, Self::Error> {
            Ok(self.0.get(name).cloned())
        }
    }

    fn valuation(name: &str, price: i64, liquidity: u8) -> ItemValuation {
        ItemValuation {
            name: name.to_string(),
            league: "Ritual".to_string(),
            price,
            liquidity,
            reference_id: "q".to_string(),
            checked_at: OffsetDateTime::UNIX_EPOCH,
            category: Category::Item,
        }
    }

    fn source(entries: &[(&str, i64)]) -> MapSource {
        MapSource(
            entries
                .iter()
                .map(|&(name, price)| (name.to_string(), valuation(name, price, 3)))
                .collect(),
        )
    }

    fn definition(components: &[(&str, f64)], results: &[(&str, f64)]) -> RecipeDefinition {
        RecipeDefinition {
            components: components
                .iter()
                .map(|&(n, q)| (n.to_string(), q))
                .collect(),
            results: results.iter().map(|&(n, q)| (n.to_string(), q)).collect(),
            wiki: "https://wiki.example/recipe".to_string(),
        }
    }

    #[test]
    fn cached_component_and_missing_result() {
        // 2x item at 50 -> 1x unknown item: cost 100, revenue 0.
        let source = source(&[("x", 50)]);
        let def = definition(&[("x", 2.0)], &[("y", 1.0)]);
        let recipe = evaluate("vendor", "Ritual", &def, &source).unwrap();

        assert_eq!(recipe.cost, 100.0);
        assert_eq!(recipe.revenue, 0.0);
        assert_eq!(recipe.profit, -100.0);
        assert_eq!(recipe.roi, -100.0);
    }

    #[test]
    fn roi_is_zero_when_cost_is_zero() {
        let source = source(&[("y", 500)]);
        let def = definition(&[("missing", 3.0)], &[("y", 1.0)]);
        let recipe = evaluate("freebie", "Ritual", &def, &source).unwrap();

        assert_eq!(recipe.cost, 0.0);
        assert_eq!(recipe.revenue, 500.0);
        assert_eq!(recipe.roi, 0.0);
    }

    #[test]
    fn roi_rounds_to_one_decimal() {
        // profit 1 over cost 3 -> 33.333..% -> 33.3
        let source = source(&[("a", 3), ("b", 4)]);
        let def = definition(&[("a", 1.0)], &[("b", 1.0)]);
        let recipe = evaluate("third", "Ritual", &def, &source).unwrap();

        assert_eq!(recipe.roi, 33.3);
    }

    #[test]
    fn profitability_is_linear_in_quantities() {
        let source = source(&[("a", 7), ("b", 13)]);
        let base = definition(&[("a", 2.0)], &[("b", 3.0)]);
        let scaled = definition(&[("a", 6.0)], &[("b", 9.0)]);

        let base = evaluate("base", "Ritual", &base, &source).unwrap();
        let scaled = evaluate("scaled", "Ritual", &scaled, &source).unwrap();

        assert_eq!(scaled.cost, base.cost * 3.0);
        assert_eq!(scaled.revenue, base.revenue * 3.0);
        assert_eq!(scaled.profit, base.profit * 3.0);
        assert_eq!(scaled.roi, base.roi);
    }

    #[test]
    fn ranking_is_stable_for_equal_profit() {
        let source = source(&[("a", 10), ("b", 20)]);
        let def = definition(&[("a", 1.0)], &[("b", 1.0)]);

        let first = evaluate("first", "Ritual", &def, &source).unwrap();
        let second = evaluate("second", "Ritual", &def, &source).unwrap();
        let mut third = evaluate("third", "Ritual", &def, &source).unwrap();
        third.profit = 100.0;

        let ranked = rank_by_profit(vec![first, second, third]);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["third", "first", "second"]);
    }
}
