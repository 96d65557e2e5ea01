//! Error types for scheduling and card store operations.

use thiserror::Error;

/// Rejections raised by the scheduler when its preconditions do not hold.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("quality {0} is outside the 0-5 rating scale")]
    QualityOutOfRange(i64),
    #[error("invalid scheduling state: {0}")]
    InvalidState(String),
    #[error("next review timestamp overflows the clock ({now} + {interval} days)")]
    TimestampOverflow { now: i64, interval: u32 },
}

/// Errors surfaced by a card repository.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("card not found: {0}")]
    CardNotFound(String),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("card store lock was poisoned")]
    Poisoned,
    #[error("card store is still shared")]
    StillShared,
}

/// Card content that failed validation. Every problem found is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid card: {}", .0.join("; "))]
pub struct ValidationError(pub Vec<String>);

impl ValidationError {
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}
