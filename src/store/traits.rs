//! `EventStore` trait — single async interface for all persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::events::model::{HistoryEvent, Team};

/// Backend-agnostic store covering teams and history events.
///
/// The store does not enforce year uniqueness within a (team, month, day)
/// slot; callers that insert are responsible for deduplication.
#[async_trait]
pub trait EventStore: Send + Sync {
    // ── History events ──────────────────────────────────────────────

    /// Insert a new history event. Returns the generated row ID.
    async fn insert_event(&self, event: &HistoryEvent) -> Result<i64, DatabaseError>;

    /// All events on a calendar (month, day), across teams.
    async fn events_by_date(&self, month: u32, day: u32)
    -> Result<Vec<HistoryEvent>, DatabaseError>;

    /// All events for one team on a calendar (month, day).
    async fn events_by_team_and_date(
        &self,
        team_id: i64,
        month: u32,
        day: u32,
    ) -> Result<Vec<HistoryEvent>, DatabaseError>;

    /// Delete all events for one team on a calendar (month, day).
    /// Returns the number of rows removed.
    async fn delete_by_team_and_date(
        &self,
        team_id: i64,
        month: u32,
        day: u32,
    ) -> Result<u64, DatabaseError>;

    // ── Teams ───────────────────────────────────────────────────────

    /// Look up a team by ID.
    async fn team(&self, team_id: i64) -> Result<Option<Team>, DatabaseError>;

    /// All known teams.
    async fn list_teams(&self) -> Result<Vec<Team>, DatabaseError>;

    /// Insert a new team. Returns the generated row ID.
    async fn insert_team(&self, team: &Team) -> Result<i64, DatabaseError>;
}
