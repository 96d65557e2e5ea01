//! Review orchestration: rating cards through a repository and running study sessions.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{Collection, Quality, Timestamp};
use crate::repo::{CardRepository, SchedulingPatch};
use crate::sm2::{ReviewOutcome, Scheduler};

/// Rate one card: read its state, schedule it, write the result back.
pub fn rate_card<R: CardRepository + ?Sized>(
    repo: &mut R,
    scheduler: &Scheduler,
    card_id: &str,
    quality: Quality,
    now: Timestamp,
) -> Result<ReviewOutcome, StoreError> {
    let card = repo
        .get(card_id)?
        .ok_or_else(|| StoreError::CardNotFound(card_id.to_string()))?;

    let outcome = scheduler.compute_next_review(quality, &card.scheduling_state(), now)?;
    repo.update(card_id, SchedulingPatch::new(outcome, quality))?;

    info!(
        card = card_id,
        quality = quality.value(),
        interval = outcome.interval,
        "rated card"
    );
    Ok(outcome)
}

/// How a study session picks its cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub new_cards_per_session: usize,
    pub shuffle: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            new_cards_per_session: 20,
            shuffle: true,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            new_cards_per_session: config.new_cards_per_session,
            shuffle: config.shuffle,
        }
    }
}

/// A queue of card ids to study from one collection.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    queue: VecDeque<String>,
    current: Option<String>,
    studied: usize,
}

impl ReviewSession {
    /// Due cards that have been reviewed before come first, then new cards up
    /// to the per-session limit.
    pub fn start<G: Rng + ?Sized>(
        collection: &Collection,
        now: Timestamp,
        options: &SessionOptions,
        rng: &mut G,
    ) -> Self {
        let mut due: Vec<String> = collection
            .cards
            .iter()
            .filter(|c| c.is_due(now) && !c.is_new())
            .map(|c| c.id.clone())
            .collect();

        let mut fresh: Vec<String> = collection
            .cards
            .iter()
            .filter(|c| c.is_new())
            .take(options.new_cards_per_session)
            .map(|c| c.id.clone())
            .collect();

        if options.shuffle {
            due.shuffle(rng);
            fresh.shuffle(rng);
        }

        debug!(due = due.len(), new = fresh.len(), "built study queue");

        let mut queue: VecDeque<String> = due.into_iter().chain(fresh).collect();
        let current = queue.pop_front();
        Self {
            queue,
            current,
            studied: 0,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Cards left to show, including the current one.
    pub fn remaining(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    pub fn studied(&self) -> usize {
        self.studied
    }

    pub fn is_complete(&self) -> bool {
        self.current.is_none()
    }

    /// Rate the current card and move on. A lapsed card goes to the back of
    /// the queue. Returns `None` once the session is complete.
    pub fn rate(
        &mut self,
        collection: &mut Collection,
        scheduler: &Scheduler,
        quality: Quality,
        now: Timestamp,
    ) -> Result<Option<ReviewOutcome>, StoreError> {
        let Some(card_id) = self.current.take() else {
            return Ok(None);
        };

        let outcome = match rate_card(collection, scheduler, &card_id, quality, now) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.current = Some(card_id);
                return Err(err);
            }
        };
        collection.stats.record(quality.is_pass(), now);
        self.studied += 1;

        if !quality.is_pass() {
            self.queue.push_back(card_id);
        }
        self.current = self.queue.pop_front();

        Ok(Some(outcome))
    }

    /// Drop the current card without rating it.
    pub fn skip(&mut self) {
        self.current = self.queue.pop_front();
    }
}
