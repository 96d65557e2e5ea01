//! Card store interface and implementations.
//!
//! The scheduler never touches storage. A repository hands out card state,
//! accepts the scheduler's output as a [`SchedulingPatch`], and answers which
//! cards are due.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::StoreError;
use crate::models::{Collection, Flashcard, Quality, Timestamp};
use crate::sm2::{ReviewOutcome, Scheduler};

/// Scheduling fields written back after a review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingPatch {
    pub outcome: ReviewOutcome,
    pub lapsed: bool,
}

impl SchedulingPatch {
    pub fn new(outcome: ReviewOutcome, quality: Quality) -> Self {
        Self {
            outcome,
            lapsed: !quality.is_pass(),
        }
    }

    pub(crate) fn apply_to(&self, card: &mut Flashcard) {
        card.apply(&self.outcome);
        card.total_reviews += 1;
        if self.lapsed {
            card.lapses += 1;
        }
    }
}

pub trait CardRepository {
    fn get(&self, card_id: &str) -> Result<Option<Flashcard>, StoreError>;

    /// Persist a patch onto an existing card, returning the updated card.
    fn update(&mut self, card_id: &str, patch: SchedulingPatch) -> Result<Flashcard, StoreError>;

    /// Cards whose next review is at or before `now`.
    fn due(&self, now: Timestamp) -> Result<Vec<Flashcard>, StoreError>;
}

impl CardRepository for Collection {
    fn get(&self, card_id: &str) -> Result<Option<Flashcard>, StoreError> {
        Ok(self.card(card_id).cloned())
    }

    fn update(&mut self, card_id: &str, patch: SchedulingPatch) -> Result<Flashcard, StoreError> {
        let card = self
            .card_mut(card_id)
            .ok_or_else(|| StoreError::CardNotFound(card_id.to_string()))?;
        patch.apply_to(card);
        Ok(card.clone())
    }

    fn due(&self, now: Timestamp) -> Result<Vec<Flashcard>, StoreError> {
        Ok(self.due_cards(now).into_iter().cloned().collect())
    }
}

/// Cards held in a map keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    cards: HashMap<String, Flashcard>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, card: Flashcard) -> Option<Flashcard> {
        self.cards.insert(card.id.clone(), card)
    }

    pub fn remove(&mut self, card_id: &str) -> Option<Flashcard> {
        self.cards.remove(card_id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl FromIterator<Flashcard> for InMemoryRepository {
    fn from_iter<I: IntoIterator<Item = Flashcard>>(iter: I) -> Self {
        let mut repo = Self::new();
        for card in iter {
            repo.insert(card);
        }
        repo
    }
}

impl CardRepository for InMemoryRepository {
    fn get(&self, card_id: &str) -> Result<Option<Flashcard>, StoreError> {
        Ok(self.cards.get(card_id).cloned())
    }

    fn update(&mut self, card_id: &str, patch: SchedulingPatch) -> Result<Flashcard, StoreError> {
        let card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| StoreError::CardNotFound(card_id.to_string()))?;
        patch.apply_to(card);
        Ok(card.clone())
    }

    fn due(&self, now: Timestamp) -> Result<Vec<Flashcard>, StoreError> {
        let mut due: Vec<Flashcard> = self
            .cards
            .values()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_review.cmp(&b.next_review).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }
}

/// A repository shared between threads.
///
/// Every rating runs read, schedule and write under one lock, so two ratings of
/// the same card can never both read the old state.
#[derive(Debug)]
pub struct SharedRepository<R> {
    inner: Arc<Mutex<R>>,
}

impl<R> Clone for SharedRepository<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: CardRepository> SharedRepository<R> {
    pub fn new(repo: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(repo)),
        }
    }

    pub fn rate(
        &self,
        scheduler: &Scheduler,
        card_id: &str,
        quality: Quality,
        now: Timestamp,
    ) -> Result<ReviewOutcome, StoreError> {
        let mut repo = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        crate::review::rate_card(&mut *repo, scheduler, card_id, quality, now)
    }

    pub fn get(&self, card_id: &str) -> Result<Option<Flashcard>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)?.get(card_id)
    }

    pub fn due(&self, now: Timestamp) -> Result<Vec<Flashcard>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)?.due(now)
    }

    /// Take the repository back once every clone has been dropped.
    pub fn into_inner(self) -> Result<R, StoreError> {
        let mutex = Arc::try_unwrap(self.inner).map_err(|_| StoreError::StillShared)?;
        let repo = mutex.into_inner().map_err(|_| StoreError::Poisoned)?;
        info!("released shared card store");
        Ok(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DAY_MS;
    use std::thread;

    fn q(value: u8) -> Quality {
        Quality::new(value).unwrap()
    }

    fn repo_with(n: usize) -> (InMemoryRepository, Vec<String>) {
        let cards: Vec<Flashcard> = (0..n)
            .map(|i| Flashcard::new(format!("Q{i}"), format!("A{i}"), 0))
            .collect();
        let ids = cards.iter().map(|c| c.id.clone()).collect();
        (cards.into_iter().collect(), ids)
    }

    #[test]
    fn update_unknown_card_fails() {
        let (mut repo, _) = repo_with(1);
        let outcome = crate::sm2::compute_next_review(q(5), &Default::default(), 0).unwrap();
        let err = repo
            .update("nope", SchedulingPatch::new(outcome, q(5)))
            .unwrap_err();
        assert!(matches!(err, StoreError::CardNotFound(id) if id == "nope"));
    }

    #[test]
    fn due_is_sorted_and_inclusive() {
        let (mut repo, ids) = repo_with(3);
        for (i, id) in ids.iter().enumerate() {
            let mut card = repo.remove(id).unwrap();
            card.next_review = (3 - i as i64) * DAY_MS;
            repo.insert(card);
        }

        let due = repo.due(2 * DAY_MS).unwrap();
        let due_ids: Vec<_> = due.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(due_ids, [ids[2].as_str(), ids[1].as_str()]);
    }

    #[test]
    fn collection_acts_as_repository() {
        let mut collection = Collection::new("Set".into(), "topic".into(), 0);
        let id = collection.add_card("Q".into(), "A".into(), 0).unwrap().id.clone();

        let outcome = crate::sm2::compute_next_review(q(1), &Default::default(), 0).unwrap();
        let card = collection
            .update(&id, SchedulingPatch::new(outcome, q(1)))
            .unwrap();
        assert_eq!(card.lapses, 1);
        assert_eq!(card.total_reviews, 1);
        assert_eq!(collection.due(DAY_MS).unwrap().len(), 1);
        assert!(collection.due(DAY_MS - 1).unwrap().is_empty());
    }

    #[test]
    fn concurrent_ratings_are_serialized() {
        let (repo, ids) = repo_with(1);
        let shared = SharedRepository::new(repo);
        let scheduler = Scheduler::new();
        let id = ids[0].clone();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                let id = id.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        shared.rate(&scheduler, &id, q(4), 0).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let card = shared.get(&id).unwrap().unwrap();
        assert_eq!(card.total_reviews, 40);
        assert_eq!(card.repetitions, 40);

        let repo = shared.into_inner().unwrap();
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn into_inner_refuses_while_cloned() {
        let (repo, _) = repo_with(1);
        let shared = SharedRepository::new(repo);
        let other = shared.clone();
        assert!(matches!(shared.into_inner(), Err(StoreError::StillShared)));
        assert_eq!(other.into_inner().unwrap().len(), 1);
    }

    #[test]
    fn poisoned_store_is_reported_everywhere() {
        let (repo, ids) = repo_with(1);
        let shared = SharedRepository::new(repo);

        let holder = shared.clone();
        let result = thread::spawn(move || {
            let _guard = holder.inner.lock().unwrap();
            panic!("writer crashed mid-update");
        })
        .join();
        assert!(result.is_err());

        assert!(matches!(shared.get(&ids[0]), Err(StoreError::Poisoned)));
        assert!(matches!(shared.due(0), Err(StoreError::Poisoned)));
        assert!(matches!(
            shared.rate(&Scheduler::new(), &ids[0], q(4), 0),
            Err(StoreError::Poisoned)
        ));
        assert!(matches!(shared.into_inner(), Err(StoreError::Poisoned)));
    }
}
