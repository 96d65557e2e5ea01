//! Checks on card content and scheduling state.

use crate::error::{SchedulerError, ValidationError};
use crate::models::{Flashcard, SchedulingState};
use crate::sm2::MIN_EASE_FACTOR;

pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_ANSWER_CHARS: usize = 1000;

/// Validate a card's question and answer text, reporting every problem.
pub fn validate_card(question: &str, answer: &str) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    if question.trim().is_empty() {
        errors.push("Question is required".to_string());
    }
    if answer.trim().is_empty() {
        errors.push("Answer is required".to_string());
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        errors.push(format!(
            "Question must be less than {} characters",
            MAX_QUESTION_CHARS
        ));
    }
    if answer.chars().count() > MAX_ANSWER_CHARS {
        errors.push(format!(
            "Answer must be less than {} characters",
            MAX_ANSWER_CHARS
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError(errors))
    }
}

/// Reject scheduling states the scheduler cannot produce.
pub fn validate_state(state: &SchedulingState) -> Result<(), SchedulerError> {
    if !state.ease_factor.is_finite() {
        return Err(SchedulerError::InvalidState(format!(
            "ease factor {} is not a finite number",
            state.ease_factor
        )));
    }
    if state.ease_factor < MIN_EASE_FACTOR {
        return Err(SchedulerError::InvalidState(format!(
            "ease factor {} is below the minimum of {}",
            state.ease_factor, MIN_EASE_FACTOR
        )));
    }
    Ok(())
}

/// A card counts as mastered after two consecutive passes at a comfortable ease.
pub fn is_mastered(card: &Flashcard) -> bool {
    card.repetitions >= 2 && card.ease_factor >= 2.0
}
