//! libSQL backend — async `EventStore` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::events::model::{EventCategory, HistoryEvent, Team};
use crate::store::migrations;
use crate::store::traits::EventStore;

const EVENT_COLUMNS: &str =
    "id, team_id, event_month, event_day, event_year, title, description, image_url, category";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Row mapping helpers ─────────────────────────────────────────────

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a HistoryEvent. Column order matches EVENT_COLUMNS.
fn row_to_event(row: &libsql::Row) -> Result<HistoryEvent, libsql::Error> {
    let category_str: String = row.get(8)?;
    let image_url: Option<String> = row.get(7).ok();
    Ok(HistoryEvent {
        id: Some(row.get::<i64>(0)?),
        team_id: row.get(1)?,
        month: row.get::<i64>(2)? as u32,
        day: row.get::<i64>(3)? as u32,
        year: row.get::<i64>(4)? as i32,
        title: row.get(5)?,
        description: row.get(6)?,
        image_url,
        category: EventCategory::parse_lenient(&category_str),
    })
}

fn row_to_team(row: &libsql::Row) -> Result<Team, libsql::Error> {
    let logo_url: Option<String> = row.get(3).ok();
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        logo_url,
    })
}

async fn collect_events(mut rows: libsql::Rows, what: &str) -> Result<Vec<HistoryEvent>, DatabaseError> {
    let mut events = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{what}: {e}")))?
    {
        let event = row_to_event(&row)
            .map_err(|e| DatabaseError::Query(format!("{what} row parse: {e}")))?;
        events.push(event);
    }
    Ok(events)
}

#[async_trait]
impl EventStore for LibSqlBackend {
    async fn insert_event(&self, event: &HistoryEvent) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO history_events (team_id, event_month, event_day, event_year, title, description, image_url, category) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.team_id,
                event.month as i64,
                event.day as i64,
                event.year as i64,
                event.title.as_str(),
                event.description.as_str(),
                opt_text(event.image_url.as_deref()),
                event.category.as_str(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_event: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!(event_id = id, team_id = event.team_id, year = event.year, "Event inserted");
        Ok(id)
    }

    async fn events_by_date(
        &self,
        month: u32,
        day: u32,
    ) -> Result<Vec<HistoryEvent>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM history_events \
                     WHERE event_month = ?1 AND event_day = ?2 ORDER BY event_year"
                ),
                params![month as i64, day as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("events_by_date: {e}")))?;
        collect_events(rows, "events_by_date").await
    }

    async fn events_by_team_and_date(
        &self,
        team_id: i64,
        month: u32,
        day: u32,
    ) -> Result<Vec<HistoryEvent>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM history_events \
                     WHERE team_id = ?1 AND event_month = ?2 AND event_day = ?3 \
                     ORDER BY event_year"
                ),
                params![team_id, month as i64, day as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("events_by_team_and_date: {e}")))?;
        collect_events(rows, "events_by_team_and_date").await
    }

    async fn delete_by_team_and_date(
        &self,
        team_id: i64,
        month: u32,
        day: u32,
    ) -> Result<u64, DatabaseError> {
        let removed = self
            .conn()
            .execute(
                "DELETE FROM history_events \
                 WHERE team_id = ?1 AND event_month = ?2 AND event_day = ?3",
                params![team_id, month as i64, day as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_by_team_and_date: {e}")))?;
        debug!(team_id, month, day, removed, "Events deleted");
        Ok(removed)
    }

    async fn team(&self, team_id: i64) -> Result<Option<Team>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, display_name, logo_url FROM teams WHERE id = ?1",
                params![team_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("team: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let team = row_to_team(&row)
                    .map_err(|e| DatabaseError::Query(format!("team row parse: {e}")))?;
                Ok(Some(team))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("team: {e}"))),
        }
    }

    async fn list_teams(&self) -> Result<Vec<Team>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, display_name, logo_url FROM teams ORDER BY id",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_teams: {e}")))?;

        let mut teams = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_teams: {e}")))?
        {
            let team = row_to_team(&row)
                .map_err(|e| DatabaseError::Query(format!("list_teams row parse: {e}")))?;
            teams.push(team);
        }
        Ok(teams)
    }

    async fn insert_team(&self, team: &Team) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO teams (name, display_name, logo_url) VALUES (?1, ?2, ?3)",
            params![
                team.name.as_str(),
                team.display_name.as_str(),
                opt_text(team.logo_url.as_deref()),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_team: {e}")))?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store_with_team() -> (LibSqlBackend, i64) {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let team = Team {
            id: 0,
            name: "Arsenal".into(),
            display_name: "Arsenal".into(),
            logo_url: None,
        };
        let team_id = store.insert_team(&team).await.unwrap();
        (store, team_id)
    }

    fn make_event(team_id: i64, year: i32) -> HistoryEvent {
        HistoryEvent::new(
            team_id,
            5,
            12,
            year,
            format!("Event {year}"),
            "Something happened",
            EventCategory::Match,
        )
    }

    #[tokio::test]
    async fn insert_and_query_by_team_and_date() {
        let (store, team_id) = memory_store_with_team().await;

        store.insert_event(&make_event(team_id, 1999)).await.unwrap();
        store.insert_event(&make_event(team_id, 1958)).await.unwrap();

        let events = store.events_by_team_and_date(team_id, 5, 12).await.unwrap();
        assert_eq!(events.len(), 2);
        // Ordered by year
        assert_eq!(events[0].year, 1958);
        assert_eq!(events[1].year, 1999);
        assert!(events[0].id.is_some());

        // Different date is empty
        let events = store.events_by_team_and_date(team_id, 5, 13).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn events_by_date_spans_teams() {
        let (store, team_id) = memory_store_with_team().await;
        let other = Team {
            id: 0,
            name: "Chelsea".into(),
            display_name: "Chelsea".into(),
            logo_url: None,
        };
        let other_id = store.insert_team(&other).await.unwrap();

        store.insert_event(&make_event(team_id, 1999)).await.unwrap();
        store.insert_event(&make_event(other_id, 2005)).await.unwrap();

        let events = store.events_by_date(5, 12).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn delete_by_team_and_date_only_touches_that_slot() {
        let (store, team_id) = memory_store_with_team().await;

        store.insert_event(&make_event(team_id, 1999)).await.unwrap();
        store.insert_event(&make_event(team_id, 2005)).await.unwrap();
        let mut off_date = make_event(team_id, 2010);
        off_date.day = 13;
        store.insert_event(&off_date).await.unwrap();

        let removed = store.delete_by_team_and_date(team_id, 5, 12).await.unwrap();
        assert_eq!(removed, 2);

        assert!(store.events_by_team_and_date(team_id, 5, 12).await.unwrap().is_empty());
        assert_eq!(store.events_by_team_and_date(team_id, 5, 13).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn team_lookup_and_listing() {
        let (store, team_id) = memory_store_with_team().await;

        let team = store.team(team_id).await.unwrap().unwrap();
        assert_eq!(team.name, "Arsenal");

        assert!(store.team(9999).await.unwrap().is_none());
        assert_eq!(store.list_teams().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn category_roundtrips_through_db() {
        let (store, team_id) = memory_store_with_team().await;
        let mut event = make_event(team_id, 1975);
        event.category = EventCategory::Transfer;
        event.image_url = Some("https://example.com/img.jpg".into());
        store.insert_event(&event).await.unwrap();

        let events = store.events_by_team_and_date(team_id, 5, 12).await.unwrap();
        assert_eq!(events[0].category, EventCategory::Transfer);
        assert_eq!(events[0].image_url.as_deref(), Some("https://example.com/img.jpg"));
    }

    #[tokio::test]
    async fn local_file_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("club-history.db");

        {
            let store = LibSqlBackend::new_local(&path).await.unwrap();
            let team = Team {
                id: 0,
                name: "Leeds".into(),
                display_name: "Leeds United".into(),
                logo_url: None,
            };
            let team_id = store.insert_team(&team).await.unwrap();
            store.insert_event(&make_event(team_id, 1992)).await.unwrap();
        }

        // Re-open — migrations are idempotent and data survives.
        let store = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(store.list_teams().await.unwrap().len(), 1);
        assert_eq!(store.events_by_date(5, 12).await.unwrap().len(), 1);
    }
}
