//! Data models for flashcards and collections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SchedulerError, ValidationError};
use crate::sm2::{ReviewOutcome, DEFAULT_EASE_FACTOR};
use crate::validation;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Cards with an interval of at least this many days count as mature.
pub const MATURE_INTERVAL_DAYS: u32 = 21;

/// Current wall-clock time as a [`Timestamp`].
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Self-assessed recall quality on the 0-5 scale. Anything below 3 is a lapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;
    pub const PASS: u8 = 3;

    pub fn new(value: u8) -> Result<Self, SchedulerError> {
        if value > Self::MAX {
            return Err(SchedulerError::QualityOutOfRange(value as i64));
        }
        Ok(Self(value))
    }

    /// The ratings a study UI offers (1-5).
    pub fn ui_range() -> impl Iterator<Item = Quality> {
        (1..=Self::MAX).map(Quality)
    }

    pub fn from_key(c: char) -> Option<Self> {
        c.to_digit(10)
            .and_then(|d| u8::try_from(d).ok())
            .and_then(|d| Self::new(d).ok())
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_pass(self) -> bool {
        self.0 >= Self::PASS
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "Blackout",
            1 => "Wrong",
            2 => "Almost",
            3 => "Hard",
            4 => "Good",
            _ => "Easy",
        }
    }
}

impl TryFrom<i64> for Quality {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| SchedulerError::QualityOutOfRange(value))
            .and_then(Quality::new)
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The subset of a card the scheduler reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingState {
    pub interval: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
}

impl Default for SchedulingState {
    fn default() -> Self {
        Self {
            interval: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            repetitions: 0,
        }
    }
}

/// A single flashcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,

    // SM-2 fields
    pub interval: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub last_reviewed: Timestamp,
    pub next_review: Timestamp,

    // Tracking
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub lapses: u32,
}

impl Flashcard {
    pub fn new(question: String, answer: String, now: Timestamp) -> Self {
        let state = SchedulingState::default();
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            question,
            answer,
            interval: state.interval,
            ease_factor: state.ease_factor,
            repetitions: state.repetitions,
            last_reviewed: now,
            next_review: now,
            total_reviews: 0,
            lapses: 0,
        }
    }

    pub fn scheduling_state(&self) -> SchedulingState {
        SchedulingState {
            interval: self.interval,
            ease_factor: self.ease_factor,
            repetitions: self.repetitions,
        }
    }

    /// Copy a scheduler outcome onto the card. Counters are not touched.
    pub fn apply(&mut self, outcome: &ReviewOutcome) {
        self.interval = outcome.interval;
        self.ease_factor = outcome.ease_factor;
        self.repetitions = outcome.repetitions;
        self.last_reviewed = outcome.last_reviewed;
        self.next_review = outcome.next_review;
    }

    pub fn is_new(&self) -> bool {
        self.repetitions == 0 && self.total_reviews == 0
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_review <= now
    }

    pub fn is_mastered(&self) -> bool {
        validation::is_mastered(self)
    }

    /// Put the card back into its freshly-added state.
    pub fn reset_progress(&mut self, now: Timestamp) {
        let state = SchedulingState::default();
        self.interval = state.interval;
        self.ease_factor = state.ease_factor;
        self.repetitions = state.repetitions;
        self.last_reviewed = now;
        self.next_review = now;
        self.total_reviews = 0;
        self.lapses = 0;
    }
}

/// Running study statistics for a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyStats {
    pub cards_studied: u32,
    pub correct_answers: u32,
    pub streak: u32,
    pub last_study_date: Option<Timestamp>,
}

impl StudyStats {
    pub fn record(&mut self, correct: bool, now: Timestamp) {
        self.cards_studied += 1;
        if correct {
            self.correct_answers += 1;
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.last_study_date = Some(now);
    }

    pub fn accuracy_percent(&self) -> u32 {
        if self.cards_studied == 0 {
            return 0;
        }
        (self.correct_answers as f64 / self.cards_studied as f64 * 100.0).round() as u32
    }
}

/// Card counts for a collection.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_cards: usize,
    pub new_cards: usize,
    pub due_cards: usize,
    pub learning_cards: usize,
    pub mature_cards: usize,
    pub mastered_cards: usize,
}

/// A named collection of flashcards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub topic: String,
    pub date_added: Timestamp,
    pub cards: Vec<Flashcard>,
    #[serde(default)]
    pub times_played: u32,
    #[serde(default)]
    pub stats: StudyStats,
}

impl Collection {
    pub fn new(name: String, topic: String, now: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            name,
            topic,
            date_added: now,
            cards: Vec::new(),
            times_played: 0,
            stats: StudyStats::default(),
        }
    }

    pub fn add_card(
        &mut self,
        question: String,
        answer: String,
        now: Timestamp,
    ) -> Result<&Flashcard, ValidationError> {
        validation::validate_card(&question, &answer)?;
        self.cards.push(Flashcard::new(question, answer, now));
        let index = self.cards.len() - 1;
        Ok(&self.cards[index])
    }

    /// Replace a card's question and answer. Scheduling fields are kept.
    pub fn update_card(
        &mut self,
        card_id: &str,
        question: String,
        answer: String,
    ) -> Result<bool, ValidationError> {
        validation::validate_card(&question, &answer)?;
        match self.card_mut(card_id) {
            Some(card) => {
                card.question = question;
                card.answer = answer;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete_card(&mut self, card_id: &str) -> bool {
        let before = self.cards.len();
        self.cards.retain(|c| c.id != card_id);
        self.cards.len() != before
    }

    pub fn card(&self, card_id: &str) -> Option<&Flashcard> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn card_mut(&mut self, card_id: &str) -> Option<&mut Flashcard> {
        self.cards.iter_mut().find(|c| c.id == card_id)
    }

    pub fn due_cards(&self, now: Timestamp) -> Vec<&Flashcard> {
        self.cards.iter().filter(|c| c.is_due(now)).collect()
    }

    pub fn new_cards(&self) -> Vec<&Flashcard> {
        self.cards.iter().filter(|c| c.is_new()).collect()
    }

    pub fn get_stats(&self, now: Timestamp) -> CollectionStats {
        let mut stats = CollectionStats {
            total_cards: self.cards.len(),
            ..Default::default()
        };

        for card in &self.cards {
            if card.is_new() {
                stats.new_cards += 1;
            } else if card.is_due(now) {
                stats.due_cards += 1;
            }

            if card.interval >= MATURE_INTERVAL_DAYS {
                stats.mature_cards += 1;
            } else if !card.is_new() {
                stats.learning_cards += 1;
            }

            if card.is_mastered() {
                stats.mastered_cards += 1;
            }
        }

        stats
    }

    /// Return every card to its default scheduling state and clear study stats.
    pub fn reset_stats(&mut self, now: Timestamp) {
        for card in &mut self.cards {
            card.reset_progress(now);
        }
        self.stats = StudyStats::default();
    }

    /// Start the collection over from scratch, counting another play-through.
    pub fn replay(&mut self, now: Timestamp) {
        self.reset_stats(now);
        self.times_played += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Timestamp = 1_700_000_000_000;

    fn collection_with_cards(n: usize) -> Collection {
        let mut collection = Collection::new("Rust".into(), "ownership".into(), NOW);
        for i in 0..n {
            collection
                .add_card(format!("Question {i}"), format!("Answer {i}"), NOW)
                .unwrap();
        }
        collection
    }

    #[test]
    fn new_card_has_default_schedule() {
        let card = Flashcard::new("Q".into(), "A".into(), NOW);
        assert_eq!(card.interval, 0);
        assert_eq!(card.ease_factor, 2.5);
        assert_eq!(card.repetitions, 0);
        assert_eq!(card.next_review, NOW);
        assert_eq!(card.last_reviewed, NOW);
        assert_eq!(card.id.len(), 8);
        assert!(card.is_new());
        assert!(card.is_due(NOW));
    }

    #[test]
    fn card_is_due_at_exact_timestamp() {
        let mut card = Flashcard::new("Q".into(), "A".into(), NOW);
        card.next_review = NOW + DAY_MS;
        assert!(!card.is_due(NOW + DAY_MS - 1));
        assert!(card.is_due(NOW + DAY_MS));
    }

    #[test]
    fn quality_rejects_values_above_five() {
        assert!(Quality::new(5).is_ok());
        assert_eq!(Quality::new(6), Err(SchedulerError::QualityOutOfRange(6)));
        assert_eq!(
            Quality::try_from(-1i64),
            Err(SchedulerError::QualityOutOfRange(-1))
        );
    }

    #[test]
    fn quality_three_is_a_pass() {
        assert!(!Quality::new(2).unwrap().is_pass());
        assert!(Quality::new(3).unwrap().is_pass());
        assert_eq!(Quality::from_key('4'), Quality::new(4).ok());
        assert_eq!(Quality::from_key('9'), None);
        assert_eq!(Quality::ui_range().count(), 5);
    }

    #[test]
    fn quality_deserializes_with_range_check() {
        let q: Quality = serde_json::from_str("4").unwrap();
        assert_eq!(q.value(), 4);
        assert!(serde_json::from_str::<Quality>("7").is_err());
    }

    #[test]
    fn add_card_rejects_blank_question() {
        let mut collection = collection_with_cards(0);
        let err = collection.add_card("  ".into(), "A".into(), NOW).unwrap_err();
        assert_eq!(err.messages(), ["Question is required"]);
        assert!(collection.cards.is_empty());
    }

    #[test]
    fn update_card_keeps_schedule() {
        let mut collection = collection_with_cards(1);
        let id = collection.cards[0].id.clone();
        collection.cards[0].interval = 6;
        collection.cards[0].repetitions = 2;

        assert!(collection
            .update_card(&id, "New Q".into(), "New A".into())
            .unwrap());
        let card = collection.card(&id).unwrap();
        assert_eq!(card.question, "New Q");
        assert_eq!(card.interval, 6);
        assert_eq!(card.repetitions, 2);

        assert!(!collection
            .update_card("missing", "Q".into(), "A".into())
            .unwrap());
    }

    #[test]
    fn delete_card_reports_whether_removed() {
        let mut collection = collection_with_cards(2);
        let id = collection.cards[0].id.clone();
        assert!(collection.delete_card(&id));
        assert!(!collection.delete_card(&id));
        assert_eq!(collection.cards.len(), 1);
    }

    #[test]
    fn stats_count_new_due_learning_and_mature() {
        let mut collection = collection_with_cards(4);
        // learning, due
        collection.cards[1].repetitions = 1;
        collection.cards[1].total_reviews = 1;
        collection.cards[1].interval = 1;
        collection.cards[1].next_review = NOW - 1;
        // mature, mastered, not due
        collection.cards[2].repetitions = 5;
        collection.cards[2].total_reviews = 5;
        collection.cards[2].interval = 30;
        collection.cards[2].next_review = NOW + 30 * DAY_MS;
        // lapsed: not new even with zero repetitions
        collection.cards[3].total_reviews = 3;
        collection.cards[3].lapses = 1;
        collection.cards[3].interval = 1;
        collection.cards[3].next_review = NOW + DAY_MS;

        let stats = collection.get_stats(NOW);
        assert_eq!(stats.total_cards, 4);
        assert_eq!(stats.new_cards, 1);
        assert_eq!(stats.due_cards, 1);
        assert_eq!(stats.learning_cards, 2);
        assert_eq!(stats.mature_cards, 1);
        assert_eq!(stats.mastered_cards, 1);
    }

    #[test]
    fn replay_resets_cards_and_counts_play() {
        let mut collection = collection_with_cards(2);
        collection.cards[0].interval = 16;
        collection.cards[0].ease_factor = 2.7;
        collection.cards[0].repetitions = 3;
        collection.cards[0].total_reviews = 3;
        collection.stats.record(true, NOW);

        let later = NOW + 5 * DAY_MS;
        collection.replay(later);

        assert_eq!(collection.times_played, 1);
        assert_eq!(collection.stats, StudyStats::default());
        for card in &collection.cards {
            assert_eq!(card.scheduling_state(), SchedulingState::default());
            assert_eq!(card.next_review, later);
            assert!(card.is_new());
        }
    }

    #[test]
    fn reset_stats_does_not_count_a_play() {
        let mut collection = collection_with_cards(1);
        collection.reset_stats(NOW);
        assert_eq!(collection.times_played, 0);
    }

    #[test]
    fn study_stats_track_streak_and_accuracy() {
        let mut stats = StudyStats::default();
        assert_eq!(stats.accuracy_percent(), 0);

        stats.record(true, NOW);
        stats.record(true, NOW);
        assert_eq!(stats.streak, 2);
        stats.record(false, NOW + 1);

        assert_eq!(stats.cards_studied, 3);
        assert_eq!(stats.correct_answers, 2);
        assert_eq!(stats.streak, 0);
        assert_eq!(stats.accuracy_percent(), 67);
        assert_eq!(stats.last_study_date, Some(NOW + 1));
    }
}
