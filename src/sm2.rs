//! SM-2 spaced repetition scheduling.
//!
//! Given a card's scheduling state and a 0-5 quality rating, computes the next
//! interval, the updated ease factor, the repetition count and the next due
//! timestamp. The computation is pure: the current time is passed in.
//!
//! Quality ratings:
//! - 0: complete blackout
//! - 1: wrong, but the answer was recognised
//! - 2: wrong, but the answer felt familiar
//! - 3: correct with serious difficulty
//! - 4: correct after hesitation
//! - 5: perfect recall

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SchedulerError;
use crate::models::{Flashcard, Quality, SchedulingState, Timestamp, DAY_MS};
use crate::repo::SchedulingPatch;

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Interval multiplier applied on a lapse under [`LapsePolicy::Decay`].
const DECAY_FACTOR: f64 = 0.8;

/// What happens to a card's schedule when it is failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LapsePolicy {
    /// Start over: one day, zero repetitions.
    #[default]
    Reset,
    /// Shrink the interval to 80% (at least one day) and drop one repetition.
    Decay,
}

impl LapsePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LapsePolicy::Reset => "reset",
            LapsePolicy::Decay => "decay",
        }
    }
}

/// Updated scheduling fields after a review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewOutcome {
    pub interval: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub last_reviewed: Timestamp,
    pub next_review: Timestamp,
}

impl ReviewOutcome {
    pub fn state(&self) -> SchedulingState {
        SchedulingState {
            interval: self.interval,
            ease_factor: self.ease_factor,
            repetitions: self.repetitions,
        }
    }
}

/// SM-2 scheduler bound to a single lapse policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    lapse_policy: LapsePolicy,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(lapse_policy: LapsePolicy) -> Self {
        Self { lapse_policy }
    }

    pub fn lapse_policy(&self) -> LapsePolicy {
        self.lapse_policy
    }

    /// Compute the schedule that follows rating a card with `quality` at `now`.
    ///
    /// Rejects states whose ease factor is not a finite number of at least
    /// [`MIN_EASE_FACTOR`]; such a state can only come from a caller bug and is
    /// never clamped silently.
    pub fn compute_next_review(
        &self,
        quality: Quality,
        state: &SchedulingState,
        now: Timestamp,
    ) -> Result<ReviewOutcome, SchedulerError> {
        crate::validation::validate_state(state)?;

        let ease_factor = next_ease_factor(state.ease_factor, quality);

        let (interval, repetitions) = if quality.is_pass() {
            let interval = match state.repetitions {
                0 => 1,
                1 => 6,
                _ => round_days(state.interval as f64 * ease_factor).max(1),
            };
            (interval, state.repetitions.saturating_add(1))
        } else {
            match self.lapse_policy {
                LapsePolicy::Reset => (1, 0),
                LapsePolicy::Decay => {
                    let decayed = (state.interval as f64 * DECAY_FACTOR).floor() as u32;
                    (decayed.max(1), state.repetitions.saturating_sub(1))
                }
            }
        };

        let next_review = (interval as i64)
            .checked_mul(DAY_MS)
            .and_then(|offset| now.checked_add(offset))
            .ok_or(SchedulerError::TimestampOverflow { now, interval })?;

        debug!(
            quality = quality.value(),
            interval,
            ease_factor,
            repetitions,
            policy = self.lapse_policy.as_str(),
            "scheduled review"
        );

        Ok(ReviewOutcome {
            interval,
            ease_factor,
            repetitions,
            last_reviewed: now,
            next_review,
        })
    }

    /// Rate a card in place, updating its schedule and review counters.
    pub fn review_card(
        &self,
        card: &mut Flashcard,
        quality: Quality,
        now: Timestamp,
    ) -> Result<ReviewOutcome, SchedulerError> {
        let outcome = self.compute_next_review(quality, &card.scheduling_state(), now)?;
        SchedulingPatch::new(outcome, quality).apply_to(card);
        Ok(outcome)
    }

    /// Interval each UI rating (1-5) would give, formatted for display.
    pub fn preview_intervals(
        &self,
        state: &SchedulingState,
    ) -> Result<Vec<(Quality, String)>, SchedulerError> {
        Quality::ui_range()
            .map(|q| {
                self.compute_next_review(q, state, 0)
                    .map(|outcome| (q, format_interval(outcome.interval)))
            })
            .collect()
    }
}

/// Schedule with the default (reset-on-lapse) scheduler.
pub fn compute_next_review(
    quality: Quality,
    state: &SchedulingState,
    now: Timestamp,
) -> Result<ReviewOutcome, SchedulerError> {
    Scheduler::new().compute_next_review(quality, state, now)
}

/// EF' = max(1.3, EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)))
pub fn next_ease_factor(ease_factor: f64, quality: Quality) -> f64 {
    let miss = (Quality::MAX - quality.value()) as f64;
    (ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR)
}

/// Round half away from zero, saturating at `u32::MAX`.
fn round_days(days: f64) -> u32 {
    days.round() as u32
}

/// Format an interval in days as a short human-readable string.
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}
