use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::model::{CongestionModel, CongestionSourceError, ScoredSlot, SignalFreshness};

/// Tunables for the departure-window scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPolicy {
    /// Step between sampled slot starts, in minutes.
    pub granularity_min: i64,
    /// Number of runner-up slots reported next to the best one.
    pub alternates: usize,
    /// Horizon used when recommending (the standalone lookup passes its own).
    pub recommendation_horizon_hours: i64,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            granularity_min: 30,
            alternates: 2,
            recommendation_horizon_hours: 24,
        }
    }
}

/// Confidence in the congestion data behind a selection. Metadata only; the
/// selection algorithm never consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPrecision {
    Normal,
    Low,
}

/// Result of a window scan: the winning slot plus ranked runners-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSelection {
    pub best: ScoredSlot,
    pub alternatives: Vec<ScoredSlot>,
    pub precision: SearchPrecision,
    pub slots_analyzed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum WindowSearchError {
    #[error("no departure slots inside the requested horizon")]
    NoFeasibleWindow,
    #[error(transparent)]
    Source(#[from] CongestionSourceError),
}

/// Scores every slot in a horizon and ranks the candidates.
///
/// Selection is stable: equal scores always prefer the earliest start, so a
/// caller is never nudged to a later departure without benefit.
pub struct WindowSearch {
    model: Arc<CongestionModel>,
    policy: SearchPolicy,
}

impl WindowSearch {
    pub fn new(model: Arc<CongestionModel>, policy: SearchPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    pub fn model(&self) -> &CongestionModel {
        &self.model
    }

    /// Scan `[search_start, search_start + horizon)` in granularity steps.
    ///
    /// A horizon shorter than one granularity step still evaluates exactly one
    /// slot at `search_start`.
    pub fn search(
        &self,
        location: &str,
        search_start: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<WindowSelection, WindowSearchError> {
        if horizon <= Duration::zero() || self.policy.granularity_min < 1 {
            return Err(WindowSearchError::NoFeasibleWindow);
        }

        let step = Duration::minutes(self.policy.granularity_min);
        let horizon_end = search_start + horizon;

        let mut scored = Vec::new();
        let mut cursor = search_start;
        while cursor < horizon_end {
            scored.push(self.model.score_slot(location, cursor)?);
            cursor = cursor + step;
        }

        if scored.is_empty() {
            return Err(WindowSearchError::NoFeasibleWindow);
        }

        let slots_analyzed = scored.len();
        let precision = if scored
            .iter()
            .any(|slot| slot.freshness == SignalFreshness::Fallback)
        {
            SearchPrecision::Low
        } else {
            SearchPrecision::Normal
        };

        let (best, alternatives) = rank(scored, self.policy.alternates);

        Ok(WindowSelection {
            best,
            alternatives,
            precision,
            slots_analyzed,
        })
    }
}

fn score_order(a: &ScoredSlot, b: &ScoredSlot) -> Ordering {
    a.score
        .partial_cmp(&b.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.slot.start.cmp(&b.slot.start))
}

/// Split candidates into the winner and up to `alternates` runners-up, both
/// in ascending (score, start) order.
fn rank(mut scored: Vec<ScoredSlot>, alternates: usize) -> (ScoredSlot, Vec<ScoredSlot>) {
    scored.sort_by(score_order);
    let mut rest = scored.split_off(1);
    rest.truncate(alternates);
    let best = scored.remove(0);
    (best, rest)
}
