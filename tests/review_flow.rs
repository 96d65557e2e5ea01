use flashdeck::models::DAY_MS;
use flashdeck::storage::CollectionStorage;
use flashdeck::{
    rate_card, CardRepository, Collection, InMemoryRepository, Quality, ReviewSession, Scheduler,
    SessionOptions, SharedRepository,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

const START: i64 = 1_700_000_000_000;

fn q(value: u8) -> Quality {
    Quality::new(value).unwrap()
}

#[test]
fn card_follows_documented_schedule() {
    let mut collection = Collection::new("Spanish".into(), "verbs".into(), START);
    let id = collection
        .add_card("hablar".into(), "to speak".into(), START)
        .unwrap()
        .id
        .clone();
    let scheduler = Scheduler::new();

    let first = rate_card(&mut collection, &scheduler, &id, q(5), START).unwrap();
    assert_eq!(first.interval, 1);
    assert_eq!(first.repetitions, 1);

    let now = first.next_review;
    let second = rate_card(&mut collection, &scheduler, &id, q(4), now).unwrap();
    assert_eq!(second.interval, 6);
    assert_eq!(second.repetitions, 2);

    let now = second.next_review;
    let third = rate_card(&mut collection, &scheduler, &id, q(5), now).unwrap();
    // round(6 * 2.7)
    assert_eq!(third.interval, 16);
    assert_eq!(third.repetitions, 3);

    let now = third.next_review;
    let lapse = rate_card(&mut collection, &scheduler, &id, q(1), now).unwrap();
    assert_eq!(lapse.interval, 1);
    assert_eq!(lapse.repetitions, 0);
    assert!(lapse.ease_factor < third.ease_factor);

    let card = collection.card(&id).unwrap();
    assert_eq!(card.total_reviews, 4);
    assert_eq!(card.lapses, 1);
    assert_eq!(card.next_review, card.last_reviewed + DAY_MS);
}

#[test]
fn session_progress_survives_storage() {
    let dir = TempDir::new().unwrap();
    let storage = CollectionStorage::new(dir.path().to_path_buf()).unwrap();
    let mut collection = Collection::new("Capitals".into(), "geography".into(), START);
    for (question, answer) in [("France", "Paris"), ("Peru", "Lima"), ("Kenya", "Nairobi")] {
        collection
            .add_card(question.into(), answer.into(), START)
            .unwrap();
    }

    let scheduler = Scheduler::new();
    let mut rng = StdRng::seed_from_u64(3);
    let mut session =
        ReviewSession::start(&collection, START, &SessionOptions::default(), &mut rng);
    while !session.is_complete() {
        session.rate(&mut collection, &scheduler, q(4), START).unwrap();
    }
    storage.save(&collection).unwrap();

    let loaded = storage.resolve("capitals").unwrap().unwrap();
    assert_eq!(loaded.stats.cards_studied, 3);
    assert_eq!(loaded.stats.streak, 3);
    assert!(loaded.due_cards(START).is_empty());
    assert_eq!(loaded.due_cards(START + DAY_MS).len(), 3);

    let mut rng = StdRng::seed_from_u64(3);
    let later = ReviewSession::start(&loaded, START + DAY_MS, &SessionOptions::default(), &mut rng);
    assert_eq!(later.remaining(), 3);
}

#[test]
fn replay_makes_every_card_due_again() {
    let mut collection = Collection::new("Math".into(), "primes".into(), START);
    collection.add_card("2?".into(), "prime".into(), START).unwrap();
    let id = collection.cards[0].id.clone();
    rate_card(&mut collection, &Scheduler::new(), &id, q(5), START).unwrap();
    assert!(collection.due_cards(START + 1).is_empty());

    collection.replay(START + 1);
    assert_eq!(collection.due_cards(START + 1).len(), 1);
    assert_eq!(collection.times_played, 1);
}

#[test]
fn shared_repository_exposes_due_cards() {
    let mut collection = Collection::new("Tmp".into(), "".into(), START);
    collection.add_card("a".into(), "b".into(), START).unwrap();
    collection.add_card("c".into(), "d".into(), START).unwrap();
    let repo: InMemoryRepository = collection.cards.clone().into_iter().collect();
    let shared = SharedRepository::new(repo);

    let id = collection.cards[0].id.clone();
    shared.rate(&Scheduler::new(), &id, q(5), START).unwrap();

    let due = shared.due(START).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, collection.cards[1].id);

    let repo = shared.into_inner().unwrap();
    assert_eq!(repo.due(START + DAY_MS).unwrap().len(), 2);
}
