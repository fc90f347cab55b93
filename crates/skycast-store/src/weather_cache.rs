//! Cached weather bundles keyed by place.
//!
//! A bundle is split over `weather_now`, `weather_hourly` and `weather_daily`
//! and always replaced as a whole inside one transaction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use skycast_weather::{Place, WeatherBundle, WeatherCondition, WeatherDaily, WeatherHourly, WeatherNow};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// A stored bundle and the moment it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedWeather {
    pub bundle: WeatherBundle,
    pub cached_at: DateTime<Utc>,
}

fn from_millis(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", millis)))
}

/// SQLite-backed weather cache.
#[derive(Debug, Clone)]
pub struct WeatherCacheStore {
    db: Database,
}

impl WeatherCacheStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Read the full cached bundle for a place.
    pub async fn get(&self, place_id: &str) -> StoreResult<Option<CachedWeather>> {
        let place_id = place_id.to_string();
        self.db
            .call(move |conn| {
                // Deferred transaction gives one consistent snapshot of all three tables
                let tx = conn.transaction()?;
                let cached = read_bundle(&tx, &place_id)?;
                tx.commit()?;
                Ok(cached)
            })
            .await
    }

    /// Replace the cached bundle for `place_id`, stamped now.
    ///
    /// Returns `false` without writing when the place is not registered.
    pub async fn put(&self, bundle: &WeatherBundle, place_id: &str) -> StoreResult<bool> {
        self.put_at(bundle, place_id, Utc::now()).await
    }

    /// Replace the cached bundle for `place_id` with an explicit timestamp.
    pub async fn put_at(
        &self,
        bundle: &WeatherBundle,
        place_id: &str,
        cached_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let bundle = bundle.clone();
        let place_id = place_id.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let registered: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM places WHERE id = ?1",
                    params![place_id],
                    |row| row.get(0),
                )?;
                if registered == 0 {
                    tracing::debug!("Skipping cache write for unregistered place {}", place_id);
                    return Ok(false);
                }

                delete_rows(&tx, &place_id)?;
                write_bundle(&tx, &place_id, &bundle, cached_at.timestamp_millis())?;
                tx.commit()?;

                tracing::debug!(
                    "Cached weather for {} ({} hourly, {} daily)",
                    place_id,
                    bundle.hourly.len(),
                    bundle.daily.len()
                );
                Ok(true)
            })
            .await
    }

    /// Remove cached weather for a place. Idempotent.
    pub async fn delete(&self, place_id: &str) -> StoreResult<()> {
        let place_id = place_id.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                delete_rows(&tx, &place_id)?;
                tx.commit()?;
                Ok(())
            })
            .await
    }

    pub async fn cached_at(&self, place_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let place_id = place_id.to_string();
        self.db
            .call(move |conn| {
                let millis: Option<i64> = conn
                    .query_row(
                        "SELECT cached_at FROM weather_now WHERE place_id = ?1",
                        params![place_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                millis.map(from_millis).transpose()
            })
            .await
    }

    /// Age of the cached bundle, clamped to zero for future timestamps.
    pub async fn cache_age(&self, place_id: &str) -> StoreResult<Option<Duration>> {
        let cached_at = self.cached_at(place_id).await?;
        Ok(cached_at.map(|at| (Utc::now() - at).to_std().unwrap_or(Duration::ZERO)))
    }
}

fn delete_rows(tx: &Transaction, place_id: &str) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM weather_now WHERE place_id = ?1", params![place_id])?;
    tx.execute("DELETE FROM weather_hourly WHERE place_id = ?1", params![place_id])?;
    tx.execute("DELETE FROM weather_daily WHERE place_id = ?1", params![place_id])?;
    Ok(())
}

fn write_bundle(
    tx: &Transaction,
    place_id: &str,
    bundle: &WeatherBundle,
    cached_at: i64,
) -> rusqlite::Result<()> {
    let now = &bundle.now;
    tx.execute(
        r#"
        INSERT INTO weather_now
            (place_id, temp_c, condition, icon, humidity, wind_kph, feels_like_c, dt, cached_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            place_id,
            now.temp_c,
            now.condition.as_str(),
            now.icon,
            now.humidity,
            now.wind_kph,
            now.feels_like_c,
            now.dt.timestamp_millis(),
            cached_at,
        ],
    )?;

    let mut hourly = tx.prepare(
        "INSERT INTO weather_hourly (place_id, dt, temp_c, icon, precip_mm, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for entry in &bundle.hourly {
        hourly.execute(params![
            place_id,
            entry.dt.timestamp_millis(),
            entry.temp_c,
            entry.icon,
            entry.precip_mm,
            cached_at,
        ])?;
    }

    let mut daily = tx.prepare(
        "INSERT INTO weather_daily (place_id, dt, min_c, max_c, icon, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for entry in &bundle.daily {
        daily.execute(params![
            place_id,
            entry.dt.timestamp_millis(),
            entry.min_c,
            entry.max_c,
            entry.icon,
            cached_at,
        ])?;
    }

    Ok(())
}

struct NowRow {
    temp_c: f64,
    condition: String,
    icon: String,
    humidity: u8,
    wind_kph: f64,
    feels_like_c: f64,
    dt: i64,
    cached_at: i64,
}

fn read_bundle(conn: &Connection, place_id: &str) -> StoreResult<Option<CachedWeather>> {
    let place: Option<Place> = conn
        .query_row(
            "SELECT id, name, lat, lon FROM places WHERE id = ?1",
            params![place_id],
            |row| {
                Ok(Place {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    lat: row.get(2)?,
                    lon: row.get(3)?,
                })
            },
        )
        .optional()?;
    let Some(place) = place else {
        return Ok(None);
    };

    let now_row: Option<NowRow> = conn
        .query_row(
            r#"
            SELECT temp_c, condition, icon, humidity, wind_kph, feels_like_c, dt, cached_at
            FROM weather_now WHERE place_id = ?1
            "#,
            params![place_id],
            |row| {
                Ok(NowRow {
                    temp_c: row.get(0)?,
                    condition: row.get(1)?,
                    icon: row.get(2)?,
                    humidity: row.get(3)?,
                    wind_kph: row.get(4)?,
                    feels_like_c: row.get(5)?,
                    dt: row.get(6)?,
                    cached_at: row.get(7)?,
                })
            },
        )
        .optional()?;
    let Some(now_row) = now_row else {
        return Ok(None);
    };

    let condition: WeatherCondition = now_row.condition.parse().map_err(StoreError::Corrupt)?;
    let now = WeatherNow {
        temp_c: now_row.temp_c,
        condition,
        icon: now_row.icon,
        humidity: now_row.humidity,
        wind_kph: now_row.wind_kph,
        feels_like_c: now_row.feels_like_c,
        dt: from_millis(now_row.dt)?,
    };

    let mut stmt = conn.prepare(
        "SELECT dt, temp_c, icon, precip_mm FROM weather_hourly
         WHERE place_id = ?1 ORDER BY dt ASC",
    )?;
    let hourly_rows = stmt
        .query_map(params![place_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let hourly = hourly_rows
        .into_iter()
        .map(|(dt, temp_c, icon, precip_mm)| {
            Ok(WeatherHourly {
                dt: from_millis(dt)?,
                temp_c,
                icon,
                precip_mm,
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT dt, min_c, max_c, icon FROM weather_daily
         WHERE place_id = ?1 ORDER BY dt ASC",
    )?;
    let daily_rows = stmt
        .query_map(params![place_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let daily = daily_rows
        .into_iter()
        .map(|(dt, min_c, max_c, icon)| {
            Ok(WeatherDaily {
                dt: from_millis(dt)?,
                min_c,
                max_c,
                icon,
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Some(CachedWeather {
        bundle: WeatherBundle {
            now,
            hourly,
            daily,
            place,
        },
        cached_at: from_millis(now_row.cached_at)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::PlaceRegistry;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn bundle(place: &Place, temp_c: f64, hours: usize, days: usize) -> WeatherBundle {
        WeatherBundle {
            now: WeatherNow {
                temp_c,
                condition: WeatherCondition::Cloudy,
                icon: "04d".into(),
                humidity: 70,
                wind_kph: 12.5,
                feels_like_c: temp_c - 2.0,
                dt: at(12),
            },
            hourly: (0..hours)
                .map(|i| WeatherHourly {
                    dt: at(12) + chrono::Duration::hours(3 * i as i64),
                    temp_c: temp_c + i as f64,
                    icon: "04d".into(),
                    precip_mm: 0.5,
                })
                .collect(),
            daily: (0..days)
                .map(|i| WeatherDaily {
                    dt: at(0) + chrono::Duration::days(i as i64),
                    min_c: temp_c - 5.0,
                    max_c: temp_c + 5.0,
                    icon: "10d".into(),
                })
                .collect(),
            place: place.clone(),
        }
    }

    async fn setup(place: &Place) -> (PlaceRegistry, WeatherCacheStore) {
        let db = Database::in_memory().unwrap();
        let registry = PlaceRegistry::new(db.clone());
        registry.add(place.clone()).await.unwrap();
        (registry, WeatherCacheStore::new(db))
    }

    async fn row_count(store: &WeatherCacheStore, table: &'static str, place_id: &str) -> i64 {
        let place_id = place_id.to_string();
        store
            .db
            .call(move |conn| {
                Ok(conn.query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE place_id = ?1", table),
                    params![place_id],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get_returns_bundle() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;
        let written = bundle(&place, 10.0, 8, 5);

        assert!(store.put_at(&written, "p1", at(13)).await.unwrap());

        let cached = store.get("p1").await.unwrap().unwrap();
        assert_eq!(cached.bundle, written);
        assert_eq!(cached.cached_at, at(13));
    }

    #[tokio::test]
    async fn test_put_overwrites_wholesale() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;

        store.put(&bundle(&place, 10.0, 8, 7), "p1").await.unwrap();
        let second = bundle(&place, 20.0, 3, 2);
        store.put(&second, "p1").await.unwrap();

        let cached = store.get("p1").await.unwrap().unwrap();
        assert_eq!(cached.bundle, second);
        assert_eq!(row_count(&store, "weather_hourly", "p1").await, 3);
        assert_eq!(row_count(&store, "weather_daily", "p1").await, 2);
    }

    #[tokio::test]
    async fn test_get_orders_entries_by_time() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;
        let mut written = bundle(&place, 10.0, 4, 3);
        written.hourly.reverse();
        written.daily.reverse();

        store.put(&written, "p1").await.unwrap();

        let cached = store.get("p1").await.unwrap().unwrap().bundle;
        assert!(cached.hourly.windows(2).all(|w| w[0].dt < w[1].dt));
        assert!(cached.daily.windows(2).all(|w| w[0].dt < w[1].dt));
    }

    #[tokio::test]
    async fn test_put_for_unregistered_place_is_skipped() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;
        let other = Place::new("p2", "Portland", 45.5, -122.7);

        assert!(!store.put(&bundle(&other, 10.0, 8, 5), "p2").await.unwrap());
        assert!(store.get("p2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;

        assert!(store.get("p1").await.unwrap().is_none());
        assert!(store.cache_age("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;
        store.put(&bundle(&place, 10.0, 8, 5), "p1").await.unwrap();

        store.delete("p1").await.unwrap();
        store.delete("p1").await.unwrap();

        assert!(store.get("p1").await.unwrap().is_none());
        assert_eq!(row_count(&store, "weather_hourly", "p1").await, 0);
    }

    #[tokio::test]
    async fn test_removing_place_cascades_to_weather() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (registry, store) = setup(&place).await;
        store.put(&bundle(&place, 10.0, 8, 7), "p1").await.unwrap();

        registry.remove("p1").await.unwrap();

        assert!(store.get("p1").await.unwrap().is_none());
        for table in ["weather_now", "weather_hourly", "weather_daily"] {
            assert_eq!(row_count(&store, table, "p1").await, 0, "{} not emptied", table);
        }
    }

    #[tokio::test]
    async fn test_cache_age_reflects_timestamp() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;
        let written_at = Utc::now() - chrono::Duration::minutes(20);

        store
            .put_at(&bundle(&place, 10.0, 8, 5), "p1", written_at)
            .await
            .unwrap();

        let age = store.cache_age("p1").await.unwrap().unwrap();
        assert!(age >= Duration::from_secs(20 * 60));
        assert!(age < Duration::from_secs(21 * 60));
    }

    #[tokio::test]
    async fn test_unknown_condition_is_corrupt() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;
        store.put(&bundle(&place, 10.0, 1, 1), "p1").await.unwrap();

        store
            .db
            .call(|conn| {
                conn.execute("UPDATE weather_now SET condition = 'hail'", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get("p1").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_mix_bundles() {
        let place = Place::new("p1", "Seattle", 47.6, -122.3);
        let (_, store) = setup(&place).await;
        let a = bundle(&place, 1.0, 8, 7);
        let b = bundle(&place, 2.0, 4, 3);

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let (a, b) = (a.clone(), b.clone());
            handles.push(tokio::spawn(async move {
                let written = if i % 2 == 0 { &a } else { &b };
                store.put(written, "p1").await.unwrap();
                let read = store.get("p1").await.unwrap().unwrap().bundle;
                assert!(read == a || read == b);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
