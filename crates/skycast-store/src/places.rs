//! Saved place registry.
//!
//! Invariants, enforced inside one transaction per operation:
//! - at most [`MAX_PLACES`] places
//! - exactly one primary place whenever the registry is non-empty
//! - ids are unique; re-adding an id updates it in place

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use skycast_weather::Place;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Maximum number of saved places
pub const MAX_PLACES: usize = 10;

/// A registered place and whether it is the primary one.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedPlace {
    pub place: Place,
    pub is_primary: bool,
}

const SELECT_PLACES: &str = "SELECT id, name, lat, lon, is_primary FROM places";

// Primary first, then insertion order
const ORDER_PLACES: &str = "ORDER BY is_primary DESC, created_at ASC, rowid ASC";

fn row_to_saved_place(row: &rusqlite::Row) -> rusqlite::Result<SavedPlace> {
    Ok(SavedPlace {
        place: Place {
            id: row.get(0)?,
            name: row.get(1)?,
            lat: row.get(2)?,
            lon: row.get(3)?,
        },
        is_primary: row.get::<_, i32>(4)? != 0,
    })
}

fn place_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM places WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// SQLite-backed place registry.
#[derive(Debug, Clone)]
pub struct PlaceRegistry {
    db: Database,
}

impl PlaceRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All places, primary first, remaining in insertion order.
    pub async fn list(&self) -> StoreResult<Vec<SavedPlace>> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("{} {}", SELECT_PLACES, ORDER_PLACES))?;
                let rows = stmt.query_map([], row_to_saved_place)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<SavedPlace>> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("{} WHERE id = ?1", SELECT_PLACES),
                        params![id],
                        row_to_saved_place,
                    )
                    .optional()?)
            })
            .await
    }

    pub async fn primary(&self) -> StoreResult<Option<SavedPlace>> {
        self.db
            .call(|conn| {
                Ok(conn
                    .query_row(
                        &format!("{} WHERE is_primary = 1", SELECT_PLACES),
                        [],
                        row_to_saved_place,
                    )
                    .optional()?)
            })
            .await
    }

    pub async fn count(&self) -> StoreResult<usize> {
        self.db
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
    }

    /// Add or update a place.
    ///
    /// A new id fails with `CapacityExceeded` once [`MAX_PLACES`] are saved.
    /// The first place becomes primary. Updating an existing id keeps its
    /// primary status and position.
    pub async fn add(&self, place: Place) -> StoreResult<()> {
        self.db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let exists = place_exists(&tx, &place.id)?;
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;

                if !exists && count as usize >= MAX_PLACES {
                    return Err(StoreError::CapacityExceeded { max: MAX_PLACES });
                }

                tx.execute(
                    r#"
                    INSERT INTO places (id, name, lat, lon, is_primary, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        lat = excluded.lat,
                        lon = excluded.lon
                    "#,
                    params![
                        place.id,
                        place.name,
                        place.lat,
                        place.lon,
                        (count == 0) as i32,
                        Utc::now().timestamp_millis(),
                    ],
                )?;
                tx.commit()?;

                if exists {
                    tracing::debug!("Updated place {}", place.id);
                } else {
                    tracing::info!("Added place {} ({})", place.name, place.id);
                }
                Ok(())
            })
            .await
    }

    /// Remove a place and, through the foreign keys, its cached weather.
    ///
    /// Removing an unknown id is a no-op and returns `false`. When the
    /// primary place is removed the earliest-inserted remaining place
    /// becomes primary.
    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let was_primary: Option<bool> = tx
                    .query_row(
                        "SELECT is_primary FROM places WHERE id = ?1",
                        params![id],
                        |row| row.get::<_, i32>(0).map(|v| v != 0),
                    )
                    .optional()?;

                let Some(was_primary) = was_primary else {
                    tracing::debug!("Remove of unknown place {} ignored", id);
                    return Ok(false);
                };

                tx.execute("DELETE FROM places WHERE id = ?1", params![id])?;

                if was_primary {
                    tx.execute(
                        r#"
                        UPDATE places SET is_primary = 1
                        WHERE rowid = (SELECT rowid FROM places ORDER BY created_at ASC, rowid ASC LIMIT 1)
                        "#,
                        [],
                    )?;
                }
                tx.commit()?;

                tracing::info!("Removed place {}", id);
                Ok(true)
            })
            .await
    }

    /// Make `id` the only primary place.
    pub async fn set_primary(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                if !place_exists(&tx, &id)? {
                    return Err(StoreError::PlaceNotFound(id));
                }

                tx.execute("UPDATE places SET is_primary = 0 WHERE is_primary = 1", [])?;
                tx.execute("UPDATE places SET is_primary = 1 WHERE id = ?1", params![id])?;
                tx.commit()?;

                tracing::info!("Primary place set to {}", id);
                Ok(())
            })
            .await
    }

    /// Record that the first-run defaults were considered.
    ///
    /// Returns `true` only for the first call against a database, so a
    /// registry the user emptied is not filled again.
    pub async fn claim_first_run(&self) -> StoreResult<bool> {
        self.db
            .call(|conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO app_state (key, value) VALUES ('first_run', ?1)",
                    params![Utc::now().timestamp_millis().to_string()],
                )?;
                Ok(inserted == 1)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: &str) -> Place {
        Place::new(id, format!("Place {}", id), 10.0, 20.0)
    }

    fn registry() -> PlaceRegistry {
        PlaceRegistry::new(Database::in_memory().unwrap())
    }

    fn ids(places: &[SavedPlace]) -> Vec<&str> {
        places.iter().map(|p| p.place.id.as_str()).collect()
    }

    fn assert_single_primary(places: &[SavedPlace]) {
        let primaries = places.iter().filter(|p| p.is_primary).count();
        if places.is_empty() {
            assert_eq!(primaries, 0);
        } else {
            assert_eq!(primaries, 1, "expected one primary in {:?}", places);
            assert!(places[0].is_primary, "primary must be listed first");
        }
    }

    #[tokio::test]
    async fn test_first_place_becomes_primary() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();

        let places = registry.list().await.unwrap();
        assert_eq!(ids(&places), vec!["p1"]);
        assert!(places[0].is_primary);
    }

    #[tokio::test]
    async fn test_later_places_are_not_primary() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();
        registry.add(place("p2")).await.unwrap();
        registry.add(place("p3")).await.unwrap();

        let places = registry.list().await.unwrap();
        assert_eq!(ids(&places), vec!["p1", "p2", "p3"]);
        assert_single_primary(&places);
    }

    #[tokio::test]
    async fn test_add_upserts_existing_id() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();
        registry.add(place("p2")).await.unwrap();
        registry.set_primary("p2").await.unwrap();

        registry
            .add(Place::new("p1", "Renamed", 1.0, 2.0))
            .await
            .unwrap();

        let places = registry.list().await.unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(ids(&places), vec!["p2", "p1"]);
        assert_eq!(places[1].place.name, "Renamed");
        assert!(!places[1].is_primary);
    }

    #[tokio::test]
    async fn test_capacity_exceeded() {
        let registry = registry();
        for i in 0..MAX_PLACES {
            registry.add(place(&format!("p{}", i))).await.unwrap();
        }

        let err = registry.add(place("p10")).await.unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { max: MAX_PLACES }));

        let places = registry.list().await.unwrap();
        assert_eq!(places.len(), MAX_PLACES);
        assert!(places.iter().all(|p| p.place.id != "p10"));
    }

    #[tokio::test]
    async fn test_upsert_allowed_at_capacity() {
        let registry = registry();
        for i in 0..MAX_PLACES {
            registry.add(place(&format!("p{}", i))).await.unwrap();
        }

        registry
            .add(Place::new("p3", "Updated", 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(registry.count().await.unwrap(), MAX_PLACES);
    }

    #[tokio::test]
    async fn test_remove_primary_promotes_earliest_remaining() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();
        registry.add(place("p2")).await.unwrap();
        registry.add(place("p3")).await.unwrap();

        assert!(registry.remove("p1").await.unwrap());

        let places = registry.list().await.unwrap();
        assert_eq!(ids(&places), vec!["p2", "p3"]);
        assert!(places[0].is_primary);
    }

    #[tokio::test]
    async fn test_remove_non_primary_keeps_primary() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();
        registry.add(place("p2")).await.unwrap();
        registry.add(place("p3")).await.unwrap();
        registry.set_primary("p3").await.unwrap();

        registry.remove("p2").await.unwrap();

        let primary = registry.primary().await.unwrap().unwrap();
        assert_eq!(primary.place.id, "p3");
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();

        assert!(!registry.remove("missing").await.unwrap());
        assert_eq!(registry.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_last_place_leaves_no_primary() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();
        registry.remove("p1").await.unwrap();

        assert!(registry.primary().await.unwrap().is_none());
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_primary_unknown_id() {
        let registry = registry();
        registry.add(place("p1")).await.unwrap();

        let err = registry.set_primary("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::PlaceNotFound(id) if id == "missing"));
        assert_eq!(registry.primary().await.unwrap().unwrap().place.id, "p1");
    }

    #[tokio::test]
    async fn test_primary_invariant_over_operation_sequence() {
        let registry = registry();
        let steps: &[(&str, &str)] = &[
            ("add", "a"),
            ("add", "b"),
            ("add", "c"),
            ("remove", "a"),
            ("add", "d"),
            ("primary", "d"),
            ("remove", "d"),
            ("remove", "b"),
            ("add", "a"),
            ("remove", "zzz"),
            ("remove", "c"),
        ];

        for (op, id) in steps {
            match *op {
                "add" => registry.add(place(id)).await.unwrap(),
                "remove" => {
                    registry.remove(id).await.unwrap();
                }
                "primary" => registry.set_primary(id).await.unwrap(),
                _ => unreachable!(),
            }
            assert_single_primary(&registry.list().await.unwrap());
        }

        assert_eq!(ids(&registry.list().await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_single_primary() {
        let registry = registry();
        for id in ["p1", "p2", "p3", "p4"] {
            registry.add(place(id)).await.unwrap();
        }

        let writer = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let id = format!("p{}", i % 4 + 1);
                    registry.set_primary(&id).await.unwrap();
                }
            })
        };

        let reader = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let places = registry.list().await.unwrap();
                    assert_eq!(places.iter().filter(|p| p.is_primary).count(), 1);
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_first_run_is_claimed_once() {
        let registry = registry();
        assert!(registry.claim_first_run().await.unwrap());
        assert!(!registry.claim_first_run().await.unwrap());

        registry.add(place("p1")).await.unwrap();
        registry.remove("p1").await.unwrap();
        assert!(!registry.claim_first_run().await.unwrap());
    }
}
