//! Chunked refresh runner — drives one task through the mining window.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, Local};
use tracing::{debug, error, info};

use crate::config::MiningConfig;
use crate::error::Error;
use crate::events::model::{HistoryEvent, Team};
use crate::mining::EventMiner;
use crate::store::EventStore;
use crate::tasks::model::{RefreshMode, TaskHandle, TaskStatus};

/// Runs refresh tasks against the event store and the generative miner.
///
/// Each run owns exactly one [`TaskHandle`] for its duration and is the
/// only writer to it. Two runs for the same team are not serialized
/// against each other; a full-mode delete can interleave with an
/// incremental-mode insert. Known limitation, kept as-is.
pub struct RefreshRunner {
    store: Arc<dyn EventStore>,
    miner: Arc<dyn EventMiner>,
    config: MiningConfig,
}

impl RefreshRunner {
    pub fn new(
        store: Arc<dyn EventStore>,
        miner: Arc<dyn EventMiner>,
        config: MiningConfig,
    ) -> Self {
        Self {
            store,
            miner,
            config,
        }
    }

    /// Fire-and-forget: spawn the refresh for today's date and return
    /// immediately. Progress is observed through the task handle only.
    pub fn spawn(self: Arc<Self>, task: Arc<TaskHandle>, team: Team) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let today = Local::now().date_naive();
            self.run(&task, &team, today.month(), today.day()).await;
        })
    }

    /// Execute one refresh to completion or failure. The date is explicit
    /// so tests can pin it; [`RefreshRunner::spawn`] passes today.
    pub async fn run(&self, task: &TaskHandle, team: &Team, month: u32, day: u32) {
        task.set_status(TaskStatus::Running).await;
        info!(
            task_id = %task.id(),
            team = %team.display_name,
            mode = %task.mode(),
            month,
            day,
            "Refresh started"
        );

        match self.refresh(task, team, month, day).await {
            Ok(discovered) => {
                info!(task_id = %task.id(), discovered, "Refresh finished");
            }
            Err(e) => {
                error!(task_id = %task.id(), error = %e, "Refresh failed");
                task.fail(e.to_string()).await;
            }
        }
    }

    /// The chunked mining algorithm. Any error escaping this function
    /// fails the whole run; already-persisted records are not rolled back.
    async fn refresh(
        &self,
        task: &TaskHandle,
        team: &Team,
        month: u32,
        day: u32,
    ) -> Result<u64, Error> {
        let mode = task.mode();

        // Working exclusion set: every year already covered for this date,
        // grown with each discovery so duplicate years can never land twice
        // in one run.
        let mut excluded: BTreeSet<i32> = BTreeSet::new();

        match mode {
            RefreshMode::Full => {
                task.push_log(format!(
                    "Clearing existing records for {} on {month:02}-{day:02}",
                    team.display_name
                ))
                .await;
                let removed = self
                    .store
                    .delete_by_team_and_date(team.id, month, day)
                    .await?;
                debug!(task_id = %task.id(), removed, "Cleared existing records");
            }
            RefreshMode::Incremental => {
                excluded = self
                    .store
                    .events_by_team_and_date(team.id, month, day)
                    .await?
                    .iter()
                    .map(|e| e.year)
                    .collect();
            }
        }

        let chunks = partition_years(self.config.min_year, self.config.max_year, self.config.chunk_years);
        let total = chunks.len();
        let mut discovered: u64 = 0;

        for (i, &(start, end)) in chunks.iter().enumerate() {
            let width = (end - start + 1) as usize;
            let in_chunk: Vec<i32> = excluded.range(start..=end).copied().collect();

            // A fully covered chunk has nothing left to discover. Only
            // "every year present" counts — a partially filled chunk is
            // still mined.
            if mode == RefreshMode::Incremental && in_chunk.len() == width {
                task.push_log(format!("Skipping {start}-{end} (all years already covered)"))
                    .await;
                advance_progress(task, i + 1, total).await;
                continue;
            }

            task.push_log(format!("Mining {start}-{end} for {}", team.display_name))
                .await;

            let candidates = self
                .miner
                .fetch_candidates(team, month, day, start, end, &in_chunk)
                .await?;

            if candidates.is_empty() {
                task.push_log(format!("No discoveries in {start}-{end}")).await;
            } else {
                for candidate in candidates {
                    // The miner is asked to exclude these years but is not
                    // trusted to; drop anything colliding with a year we
                    // already hold, persisted or discovered this run.
                    if excluded.contains(&candidate.year) {
                        debug!(
                            task_id = %task.id(),
                            year = candidate.year,
                            "Dropping candidate for an already-covered year"
                        );
                        continue;
                    }

                    let mut event = HistoryEvent::new(
                        team.id,
                        month,
                        day,
                        candidate.year,
                        candidate.title.clone(),
                        candidate.description,
                        candidate.category,
                    );
                    event.image_url = candidate.image_url;

                    self.store.insert_event(&event).await?;
                    task.push_log(format!("Discovered {}: {}", candidate.year, candidate.title))
                        .await;
                    excluded.insert(candidate.year);
                    discovered += 1;
                }
            }

            advance_progress(task, i + 1, total).await;

            if i + 1 < total && !self.config.chunk_pause.is_zero() {
                tokio::time::sleep(self.config.chunk_pause).await;
            }
        }

        task.complete().await;
        Ok(discovered)
    }
}

/// Raise progress after a chunk. The final chunk's update is folded into
/// `TaskHandle::complete` so 100% is only ever observed together with the
/// completed status.
async fn advance_progress(task: &TaskHandle, done: usize, total: usize) {
    if done < total {
        task.set_progress(progress_pct(done, total)).await;
    }
}

/// Percentage of chunks processed, floored.
fn progress_pct(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total) as u8
}

/// Split `[min_year, max_year]` into consecutive, gap-free, inclusive
/// chunks of `width` years; the last chunk may be narrower.
pub fn partition_years(min_year: i32, max_year: i32, width: i32) -> Vec<(i32, i32)> {
    debug_assert!(width >= 1, "chunk width must be positive");
    let width = width.max(1);

    let mut chunks = Vec::new();
    let mut start = min_year;
    while start <= max_year {
        let end = (start + width - 1).min(max_year);
        chunks.push((start, end));
        start = end + 1;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_partitions_into_fifteen_chunks() {
        let chunks = partition_years(1880, 2024, 10);
        assert_eq!(chunks.len(), 15);
        assert_eq!(chunks[0], (1880, 1889));
        assert_eq!(chunks[13], (2010, 2019));
        // Final chunk is narrower: 2020–2024.
        assert_eq!(chunks[14], (2020, 2024));
    }

    #[test]
    fn partition_is_gap_free_and_non_overlapping() {
        let chunks = partition_years(1880, 2024, 10);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0);
        }
        assert_eq!(chunks.first().unwrap().0, 1880);
        assert_eq!(chunks.last().unwrap().1, 2024);

        let covered: i32 = chunks.iter().map(|(s, e)| e - s + 1).sum();
        assert_eq!(covered, 2024 - 1880 + 1);
    }

    #[test]
    fn partition_exact_division_has_no_short_tail() {
        let chunks = partition_years(2000, 2019, 10);
        assert_eq!(chunks, vec![(2000, 2009), (2010, 2019)]);
    }

    #[test]
    fn partition_single_year_window() {
        assert_eq!(partition_years(1999, 1999, 10), vec![(1999, 1999)]);
    }

    #[test]
    fn progress_is_floored() {
        assert_eq!(progress_pct(1, 15), 6);
        assert_eq!(progress_pct(7, 15), 46);
        assert_eq!(progress_pct(14, 15), 93);
        assert_eq!(progress_pct(15, 15), 100);
    }
}
