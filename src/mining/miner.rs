//! The `EventMiner` trait — boundary between the refresh runner and the
//! generative source.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::events::model::{EventCategory, Team};

/// A candidate history event returned by the generative source, before
/// year-level deduplication by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvent {
    pub year: i32,
    pub title: String,
    pub description: String,
    /// Only present when the URL survived validation and the image probe.
    pub image_url: Option<String>,
    pub category: EventCategory,
}

/// Mines candidate events for one team, one calendar date, one year window.
///
/// Implementations must never fail because the source produced garbage —
/// an unusable response is an empty list. Returning `Err` is reserved for
/// faults the runner should treat as fatal to the run.
#[async_trait]
pub trait EventMiner: Send + Sync {
    async fn fetch_candidates(
        &self,
        team: &Team,
        month: u32,
        day: u32,
        start_year: i32,
        end_year: i32,
        excluded_years: &[i32],
    ) -> Result<Vec<CandidateEvent>, LlmError>;
}
