//! Listing statistics: turning raw trade listings into a (price, liquidity)
//! estimate.
//!
//! Everything in here is pure; fetching and caching live in `infra`.

/// Age horizon after which an item counts as fully illiquid: 5 days.
pub const DEFAULT_LIQUIDITY_HORIZON_MINUTES: i64 = 5 * 24 * 60;

/// One observed trade offer, reduced to the two values the estimator needs.
/// Built transiently from at most 10 upstream listings per denomination and
/// discarded once the valuation is computed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ListingSample {
    /// Offer amount, already converted into primary-denomination units.
    pub amount: f64,
    /// Whole minutes since the listing was indexed upstream.
    pub age_minutes: i64,
}

/// Raw per-denomination statistics before cross-branch fallback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BranchStats {
    /// `(mean + median) / 2` over the sample amounts, not yet rounded.
    pub raw_price: f64,
    /// `(mean + median) / 2` over the sample ages in minutes.
    pub combined_age: f64,
}

/// Compute the price/age statistics for one denomination branch.
/// Returns `None` for an empty branch (price and liquidity both degrade
/// to zero there).
pub fn branch_stats(samples: &[ListingSample]) -> Option<BranchStats> {
    if samples.is_empty() {
        return None;
    }

    let mut amounts: Vec<f64> = samples.iter().map(|s| s.amount).collect();
    amounts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let amount_mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    let amount_median = amounts[amounts.len() / 2];

    let mut ages: Vec<i64> = samples.iter().map(|s| s.age_minutes).collect();
    ages.sort_unstable();
    let age_mean = ages.iter().sum::<i64>() / ages.len() as i64;
    let age_median = ages[ages.len() / 2];

    Some(BranchStats {
        raw_price: (amount_mean + amount_median) / 2.0,
        combined_age: (age_mean + age_median) as f64 / 2.0,
    })
}

/// Map a combined listing age onto the 0..=5 liquidity ladder.
///
/// The horizon is split into 5 equal buckets; anything at or beyond the
/// horizon scores 0, near-zero ages score 5.
pub fn liquidity_bucket(combined_age: f64, horizon_minutes: i64) -> u8 {
    let bucket_width = horizon_minutes as f64 / 5.0;
    let bucket = (combined_age / bucket_width) as i64;
    (5 - bucket.min(5)) as u8
}

/// Fold the two denomination branches into the final reported estimate.
///
/// A branch with no price adopts the other branch's price, and likewise for
/// liquidity; price fallback runs first and the two are independent. After
/// fallback each branch price is rounded up on its own, then the cheaper
/// price and the better liquidity win.
pub fn combine_branches(
    primary: &[ListingSample],
    secondary: &[ListingSample],
    horizon_minutes: i64,
) -> (i64, u8) {
    let primary_stats = branch_stats(primary);
    let secondary_stats = branch_stats(secondary);

    let mut primary_price = primary_stats.map(|s| s.raw_price).unwrap_or(0.0);
    let mut secondary_price = secondary_stats.map(|s| s.raw_price).unwrap_or(0.0);
    let mut primary_liquidity = primary_stats
        .map(|s| liquidity_bucket(s.combined_age, horizon_minutes))
        .unwrap_or(0);
    let mut secondary_liquidity = secondary_stats
        .map(|s| liquidity_bucket(s.combined_age, horizon_minutes))
        .unwrap_or(0);

    if primary_price == 0.0 {
        primary_price = secondary_price;
    }
    if secondary_price == 0.0 {
        secondary_price = primary_price;
    }
    let primary_price = primary_price.ceil() as i64;
    let secondary_price = secondary_price.ceil() as i64;

    if primary_liquidity == 0 {
        primary_liquidity = secondary_liquidity;
    }
    if secondary_liquidity == 0 {
        secondary_liquidity = primary_liquidity;
    }

    (
        primary_price.min(secondary_price),
        primary_liquidity.max(secondary_liquidity),
    )
}
