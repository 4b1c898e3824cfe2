//! Persistent item valuation cache backed by sqlite.
//!
//! Access is strictly sequential (the orchestrator is single-threaded), so a
//! single long-lived connection is enough; the upsert runs inside its own
//! transaction.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::{Category, ItemValuation, ValuationSource};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored timestamp could not be parsed: {0}")]
    TimestampParse(#[from] time::error::Parse),
    #[error("timestamp could not be formatted: {0}")]
    TimestampFormat(#[from] time::error::Format),
    #[error("stored category {0:?} is unknown")]
    UnknownCategory(String),
}

/// What `put` did with the incoming valuation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Updated,
    /// The incoming price was 0 and a previous nonzero valuation exists;
    /// stale-but-valid beats fresh-but-invalid.
    Skipped,
}

pub struct ItemStore {
    conn: Connection,
}

impl ItemStore {
    /// Open (and if needed create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Volatile store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                name TEXT NOT NULL,
                league TEXT NOT NULL,
                price INTEGER NOT NULL,
                reference_id TEXT NOT NULL,
                liquidity INTEGER NOT NULL,
                checked_at TEXT NOT NULL,
                category TEXT NOT NULL,
                PRIMARY KEY (name, league)
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Look up the last computed valuation for `(name, league)`.
    pub fn get(&self, name: &str, league: &str) -> Result<Option<ItemValuation>, StoreError> {
        self.conn
            .query_row(
                "SELECT name, league, price, reference_id, liquidity, checked_at, category
                 FROM items WHERE name = ?1 AND league = ?2",
                params![name, league],
                row_to_valuation,
            )
            .optional()?
            .transpose()
    }

    /// Transactional upsert keyed by `(name, league)`. A zero price never
    /// overwrites an existing row.
    pub fn put(&mut self, valuation: &ItemValuation) -> Result<PutOutcome, StoreError> {
        let checked_at = valuation.checked_at.format(&Rfc3339)?;
        let tx = self.conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT price FROM items WHERE name = ?1 AND league = ?2",
                params![valuation.name, valuation.league],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match exists {
            None => {
                tx.execute(
                    "INSERT INTO items (name, league, price, reference_id, liquidity, checked_at, category)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        valuation.name,
                        valuation.league,
                        valuation.price,
                        valuation.reference_id,
                        valuation.liquidity,
                        checked_at,
                        valuation.category.as_str(),
                    ],
                )?;
                PutOutcome::Inserted
            }
            Some(_) if valuation.price == 0 => PutOutcome::Skipped,
            Some(_) => {
                tx.execute(
                    "UPDATE items
                     SET price = ?3, reference_id = ?4, liquidity = ?5, checked_at = ?6, category = ?7
                     WHERE name = ?1 AND league = ?2",
                    params![
                        valuation.name,
                        valuation.league,
                        valuation.price,
                        valuation.reference_id,
                        valuation.liquidity,
                        checked_at,
                        valuation.category.as_str(),
                    ],
                )?;
                PutOutcome::Updated
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Number of cached valuations, mostly for logging.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ValuationSource for ItemStore {
    type Error = StoreError;

    fn valuation(&self, name: &str, league: &str) -> Result<Option<ItemValuation>, StoreError> {
        self.get(name, league)
    }
}

fn row_to_valuation(row: &Row<'_>) -> rusqlite::Result<Result<ItemValuation, StoreError>> {
    let name: String = row.get(0)?;
    let league: String = row.get(1)?;
    let price: i64 = row.get(2)?;
    let reference_id: String = row.get(3)?;
    let liquidity: u8 = row.get(4)?;
    let checked_at: String = row.get(5)?;
    let category: String = row.get(6)?;

    Ok(build_valuation(
        name,
        league,
        price,
        reference_id,
        liquidity,
        checked_at,
        category,
    ))
}

fn build_valuation(
    name: String,
    league: String,
    price: i64,
    reference_id: String,
    liquidity: u8,
    checked_at: String,
    category: String,
) -> Result<ItemValuation, StoreError> {
    let checked_at = OffsetDateTime::parse(&checked_at, &Rfc3339)?;
    let category =
        Category::parse(&category).ok_or_else(|| StoreError::UnknownCategory(category.clone()))?;

    Ok(ItemValuation {
        name,
        league,
        price,
        liquidity,
        reference_id,
        checked_at,
        category,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn valuation(name: &str, price: i64) -> ItemValuation {
        ItemValuation {
            name: name.to_string(),
            league: "Ritual".to_string(),
            price,
            liquidity: 4,
            reference_id: "query1".to_string(),
            checked_at: datetime!(2021-01-10 12:00:00 UTC),
            category: Category::Item,
        }
    }

    #[test]
    fn missing_key_reads_as_none() {
        let store = ItemStore::open_in_memory().unwrap();
        assert!(store.get("chisel", "Ritual").unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut store = ItemStore::open_in_memory().unwrap();
        let valuation = valuation("chisel", 3);

        assert_eq!(store.put(&valuation).unwrap(), PutOutcome::Inserted);
        assert_eq!(store.get("chisel", "Ritual").unwrap(), Some(valuation));
    }

    #[test]
    fn repeated_put_is_idempotent() {
        let mut store = ItemStore::open_in_memory().unwrap();
        let valuation = valuation("chisel", 3);

        assert_eq!(store.put(&valuation).unwrap(), PutOutcome::Inserted);
        assert_eq!(store.put(&valuation).unwrap(), PutOutcome::Updated);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get("chisel", "Ritual").unwrap(), Some(valuation));
    }

    #[test]
    fn zero_price_never_overwrites_a_nonzero_row() {
        let mut store = ItemStore::open_in_memory().unwrap();
        let good = valuation("chisel", 3);
        let mut bad = valuation("chisel", 0);
        bad.liquidity = 0;

        store.put(&good).unwrap();
        assert_eq!(store.put(&bad).unwrap(), PutOutcome::Skipped);
        assert_eq!(store.get("chisel", "Ritual").unwrap(), Some(good));
    }

    #[test]
    fn zero_price_still_inserts_when_key_is_absent() {
        let mut store = ItemStore::open_in_memory().unwrap();
        let unknown = valuation("chisel", 0);

        assert_eq!(store.put(&unknown).unwrap(), PutOutcome::Inserted);
        assert_eq!(store.get("chisel", "Ritual").unwrap(), Some(unknown));
    }

    #[test]
    fn valuations_are_scoped_per_league() {
        let mut store = ItemStore::open_in_memory().unwrap();
        let ritual = valuation("chisel", 3);
        let mut standard = valuation("chisel", 9);
        standard.league = "Standard".to_string();

        store.put(&ritual).unwrap();
        store.put(&standard).unwrap();

        assert_eq!(store.get("chisel", "Ritual").unwrap(), Some(ritual));
        assert_eq!(store.get("chisel", "Standard").unwrap(), Some(standard));
    }
}
