//! Flashdeck - spaced repetition flashcard collections
//!
//! A command-line flashcard application with SM-2 spaced repetition.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use flashdeck::config::Config;
use flashdeck::models::{now_ms, Collection, Quality, Timestamp};
use flashdeck::review::{rate_card, ReviewSession, SessionOptions};
use flashdeck::sm2::Scheduler;
use flashdeck::storage::CollectionStorage;

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "flashdeck")]
#[command(author, version, about = "Spaced repetition flashcard collections", long_about = None)]
struct Args {
    /// Directory containing collection files
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log scheduling decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List collections
    List,
    /// Create a collection
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        topic: String,
    },
    /// Rename a collection or change its topic
    Rename {
        collection: String,
        name: String,
        #[arg(short, long)]
        topic: Option<String>,
    },
    /// Delete a collection
    Delete { collection: String },
    /// Add a card to a collection
    Add {
        collection: String,
        question: String,
        answer: String,
    },
    /// Change a card's question and answer
    Edit {
        collection: String,
        card: String,
        question: String,
        answer: String,
    },
    /// Remove a card from a collection
    Remove { collection: String, card: String },
    /// Show every card with its schedule
    Cards { collection: String },
    /// Show the cards a study session would present now
    Due {
        collection: String,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Rate a single card (0-5)
    Rate {
        collection: String,
        card: String,
        #[arg(value_parser = parse_quality)]
        quality: Quality,
    },
    /// Show the interval each rating would give a card
    Preview { collection: String, card: String },
    /// Study due cards interactively
    Study {
        collection: String,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show collection statistics
    Stats { collection: String },
    /// Reset every card's schedule and the study statistics
    Reset { collection: String },
    /// Reset the collection and count another play-through
    Replay { collection: String },
    /// Export all collections to a backup file
    Export { path: Option<PathBuf> },
    /// Import collections from a backup file
    Import { path: PathBuf },
}

fn parse_quality(s: &str) -> Result<Quality, String> {
    let value: i64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    Quality::try_from(value).map_err(|e| e.to_string())
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let (config, config_error) = match Config::load_from(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_logging(&config, args.verbose);
    if let Some(e) = config_error {
        warn!(error = %e, "using default configuration");
    }

    let data_dir = args.data_dir.unwrap_or_else(CollectionStorage::default_path);
    let storage = CollectionStorage::new(data_dir)?;
    let scheduler = Scheduler::with_policy(config.lapse_policy);

    run(args.command, &storage, &scheduler, &config)
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(
    command: Command,
    storage: &CollectionStorage,
    scheduler: &Scheduler,
    config: &Config,
) -> Result<()> {
    let now = now_ms();

    match command {
        Command::List => {
            let collections = storage.list()?;
            if collections.is_empty() {
                println!("No collections yet. Create one with `flashdeck create <name>`.");
            }
            for info in collections {
                println!(
                    "{}  {:<24} {:<20} {:>4} cards  played {}x",
                    info.id, info.name, info.topic, info.card_count, info.times_played
                );
            }
        }
        Command::Create { name, topic } => {
            if name.trim().is_empty() {
                bail!("Collection name is required");
            }
            if storage.name_exists(&name) {
                bail!("A collection named '{}' already exists", name);
            }
            let collection = Collection::new(name, topic, now);
            storage.save(&collection)?;
            println!("✓ Created '{}' ({})", collection.name, collection.id);
        }
        Command::Rename { collection, name, topic } => {
            let mut collection = load(storage, &collection)?;
            if name.trim().is_empty() {
                bail!("Collection name is required");
            }
            if let Some(existing) = storage.find_by_name(&name)? {
                if existing.id != collection.id {
                    bail!("A collection named '{}' already exists", name);
                }
            }
            collection.name = name;
            if let Some(topic) = topic {
                collection.topic = topic;
            }
            storage.save(&collection)?;
            println!("✓ Renamed to '{}'", collection.name);
        }
        Command::Delete { collection } => {
            let collection = load(storage, &collection)?;
            storage.delete(&collection.id)?;
            println!("✓ Deleted '{}'", collection.name);
        }
        Command::Add { collection, question, answer } => {
            let mut collection = load(storage, &collection)?;
            let id = collection.add_card(question, answer, now)?.id.clone();
            storage.save(&collection)?;
            println!("✓ Added card {} to '{}'", id, collection.name);
        }
        Command::Edit { collection, card, question, answer } => {
            let mut collection = load(storage, &collection)?;
            if !collection.update_card(&card, question, answer)? {
                bail!("No card '{}' in '{}'", card, collection.name);
            }
            storage.save(&collection)?;
            println!("✓ Updated card {}", card);
        }
        Command::Remove { collection, card } => {
            let mut collection = load(storage, &collection)?;
            if !collection.delete_card(&card) {
                bail!("No card '{}' in '{}'", card, collection.name);
            }
            storage.save(&collection)?;
            println!("✓ Removed card {}", card);
        }
        Command::Cards { collection } => {
            let collection = load(storage, &collection)?;
            for card in &collection.cards {
                println!(
                    "{}  {:>4}d  ease {:.2}  reps {:>2}  due {}  {}",
                    card.id,
                    card.interval,
                    card.ease_factor,
                    card.repetitions,
                    format_timestamp(card.next_review),
                    card.question
                );
            }
        }
        Command::Due { collection, seed } => {
            let collection = load(storage, &collection)?;
            let mut session = start_session(&collection, now, config, seed);
            if session.is_complete() {
                println!("No cards due for review.");
            }
            while let Some(id) = session.current() {
                if let Some(card) = collection.card(id) {
                    println!("{}  {}", card.id, card.question);
                }
                session.skip();
            }
        }
        Command::Rate { collection, card, quality } => {
            let mut collection = load(storage, &collection)?;
            let outcome = rate_card(&mut collection, scheduler, &card, quality, now)?;
            collection.stats.record(quality.is_pass(), now);
            storage.save(&collection)?;
            println!(
                "✓ Next review in {} day(s) on {} (ease {:.2}, repetitions {})",
                outcome.interval,
                format_timestamp(outcome.next_review),
                outcome.ease_factor,
                outcome.repetitions
            );
        }
        Command::Preview { collection, card } => {
            let collection = load(storage, &collection)?;
            let card = collection
                .card(&card)
                .ok_or_else(|| anyhow!("No card '{}' in '{}'", card, collection.name))?;
            for (quality, interval) in scheduler.preview_intervals(&card.scheduling_state())? {
                println!("{} {:<9} {}", quality, quality.name(), interval);
            }
        }
        Command::Study { collection, seed } => {
            let mut collection = load(storage, &collection)?;
            study(&mut collection, storage, scheduler, config, seed)?;
        }
        Command::Stats { collection } => {
            let collection = load(storage, &collection)?;
            let stats = collection.get_stats(now);
            println!("{} ({})", collection.name, collection.topic);
            println!("  cards      {}", stats.total_cards);
            println!("  new        {}", stats.new_cards);
            println!("  due        {}", stats.due_cards);
            println!("  learning   {}", stats.learning_cards);
            println!("  mature     {}", stats.mature_cards);
            println!("  mastered   {}", stats.mastered_cards);
            println!("  studied    {}", collection.stats.cards_studied);
            println!("  accuracy   {}%", collection.stats.accuracy_percent());
            println!("  streak     {}", collection.stats.streak);
            println!("  played     {}x", collection.times_played);
        }
        Command::Reset { collection } => {
            let mut collection = load(storage, &collection)?;
            collection.reset_stats(now);
            storage.save(&collection)?;
            println!("✓ Reset '{}'", collection.name);
        }
        Command::Replay { collection } => {
            let mut collection = load(storage, &collection)?;
            collection.replay(now);
            storage.save(&collection)?;
            println!(
                "✓ Replayed '{}' (played {}x)",
                collection.name, collection.times_played
            );
        }
        Command::Export { path } => {
            let path = path.unwrap_or_else(CollectionStorage::default_backup_path);
            let count = storage.export_backup(&path)?;
            println!("✓ Exported {} collections to {}", count, path.display());
        }
        Command::Import { path } => {
            let (imported, skipped) = storage.import_backup(&path)?;
            if skipped > 0 {
                println!(
                    "✓ Imported {} collections ({} skipped - already exist)",
                    imported, skipped
                );
            } else {
                println!("✓ Imported {} collections", imported);
            }
        }
    }

    Ok(())
}

fn load(storage: &CollectionStorage, id_or_name: &str) -> Result<Collection> {
    storage
        .resolve(id_or_name)?
        .ok_or_else(|| anyhow!("No collection named '{}'", id_or_name))
}

fn start_session(
    collection: &Collection,
    now: Timestamp,
    config: &Config,
    seed: Option<u64>,
) -> ReviewSession {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    ReviewSession::start(collection, now, &SessionOptions::from(config), &mut rng)
}

fn format_timestamp(ts: Timestamp) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ══════════════════════════════════════════════════════════════════════════
// Study Loop
// ══════════════════════════════════════════════════════════════════════════

fn study(
    collection: &mut Collection,
    storage: &CollectionStorage,
    scheduler: &Scheduler,
    config: &Config,
    seed: Option<u64>,
) -> Result<()> {
    let mut session = start_session(collection, now_ms(), config, seed);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    if session.is_complete() {
        println!("No cards due for review.");
        return Ok(());
    }

    while let Some(card_id) = session.current().map(str::to_string) {
        let card = collection
            .card(&card_id)
            .ok_or_else(|| anyhow!("Card {} disappeared from '{}'", card_id, collection.name))?;

        println!();
        println!("[{} left] {}", session.remaining(), card.question);
        prompt("Press Enter to show the answer (q to quit) ")?;
        match lines.next().transpose()? {
            None => break,
            Some(line) if line.trim() == "q" => break,
            Some(_) => {}
        }
        println!("  {}", card.answer);

        loop {
            prompt("Rate 0-5 (s to skip, q to quit) ")?;
            let Some(line) = lines.next().transpose()? else {
                return finish(collection, storage, &session);
            };
            let input = line.trim();
            match input {
                "q" => return finish(collection, storage, &session),
                "s" => {
                    session.skip();
                    break;
                }
                _ => {}
            }

            let Some(quality) = input
                .chars()
                .next()
                .filter(|_| input.len() == 1)
                .and_then(Quality::from_key)
            else {
                println!("  Enter a number from 0 to 5.");
                continue;
            };

            if let Some(outcome) = session.rate(collection, scheduler, quality, now_ms())? {
                storage.save(collection).context("Failed to save card progress")?;
                println!("  {} - next review in {} day(s)", quality.name(), outcome.interval);
            }
            break;
        }
    }

    finish(collection, storage, &session)
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    io::stdout().flush()?;
    Ok(())
}

fn finish(
    collection: &Collection,
    storage: &CollectionStorage,
    session: &ReviewSession,
) -> Result<()> {
    storage.save(collection)?;
    println!();
    println!(
        "Studied {} card(s). Accuracy {}%, streak {}.",
        session.studied(),
        collection.stats.accuracy_percent(),
        collection.stats.streak
    );
    Ok(())
}
