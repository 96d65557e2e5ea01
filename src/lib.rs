//! Flashdeck - flashcard collections with SM-2 spaced repetition.
//!
//! The [`sm2`] scheduler is a pure function of a card's scheduling state, a
//! quality rating and the current time. Everything else stores cards, feeds
//! them to the scheduler and persists what it returns.

pub mod config;
pub mod error;
pub mod models;
pub mod repo;
pub mod review;
pub mod sm2;
pub mod storage;
pub mod validation;

pub use error::{SchedulerError, StoreError, ValidationError};
pub use models::{Collection, Flashcard, Quality, SchedulingState, StudyStats, Timestamp};
pub use repo::{CardRepository, InMemoryRepository, SharedRepository};
pub use review::{rate_card, ReviewSession, SessionOptions};
pub use sm2::{compute_next_review, LapsePolicy, ReviewOutcome, Scheduler};
