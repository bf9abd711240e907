mod analyzer;
mod dictionary;
mod review;

use std::io::{BufRead, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use kioku_core::atom::AtomKind;
use kioku_core::memory::MemoryConfig;
use kioku_core::time::now_days;
use kioku_core::tokenizer::{AtomKey, SentenceRecord, SourceMeta, strip_furigana};
use kioku_store::{Ingestor, Scheduler, Store, StoreError, recommend, transfer};

use analyzer::Analyzer;
use dictionary::Dictionary;

#[derive(Parser)]
#[command(name = "kioku", about = "Sentence-based spaced repetition engine")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Forgetting-model tunables, shared by every subcommand.
#[derive(Args)]
struct MemoryArgs {
    /// Target recall probability at review time
    #[arg(long, default_value_t = 0.95)]
    desired_retention: f64,

    /// Days of memory after a single refresh
    #[arg(long, default_value_t = 20.0)]
    baseline_strength: f64,

    /// Horizon of the utility integral, in days
    #[arg(long, default_value_t = 20.0)]
    test_delay: f64,

    /// Minimum minutes before an atom may be shown again
    #[arg(long, default_value_t = 5.0)]
    relearn_grace_minutes: f64,
}

impl MemoryArgs {
    fn config(&self) -> MemoryConfig {
        MemoryConfig {
            desired_retention: self.desired_retention,
            baseline_strength: self.baseline_strength,
            test_delay: self.test_delay,
            relearn_grace: self.relearn_grace_minutes / (24.0 * 60.0),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a sentence table, then transfer learning state from a
    /// previous database
    BuildDatabase {
        /// Database to build
        #[arg(long, default_value = "data/japanese_sentences.sqlite")]
        database: PathBuf,

        /// TSV corpus: source_database, source_id, source_url,
        /// license_url, creator, text
        #[arg(long, default_value = "data/japanese_sentences.tsv")]
        sentence_table: PathBuf,

        /// Previous database to migrate learning state from
        #[arg(long)]
        old_database: Option<PathBuf>,

        /// Morphological analyzer command
        #[arg(long, default_value = "mecab")]
        analyzer: String,

        #[command(flatten)]
        memory: MemoryArgs,
    },

    /// Recommend the next sentence worth learning
    RecommendSentence {
        #[arg(long, default_value = "data/japanese_sentences.sqlite")]
        database: PathBuf,

        /// Dictionary for lemma glosses
        #[arg(long, default_value = "data/japanese_dictionary.sqlite")]
        dictionary_database: PathBuf,

        /// Corpus preferred when several sentences qualify
        #[arg(long, default_value = "tatoeba")]
        preferred_source_database: String,

        /// Gloss languages, most preferred first
        #[arg(long = "translation-language", default_value = "eng")]
        translation_languages: Vec<String>,

        /// Emit the recommendation as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        memory: MemoryArgs,
    },

    /// Run one review session
    Review {
        #[arg(long, default_value = "data/japanese_sentences.sqlite")]
        database: PathBuf,

        /// Wall-clock session budget
        #[arg(long, default_value_t = 600)]
        review_time_seconds: u64,

        /// Pin the scheduler RNG, for reproducible sessions
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        memory: MemoryArgs,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::BuildDatabase {
            database,
            sentence_table,
            old_database,
            analyzer,
            memory,
        } => cmd_build_database(
            database,
            sentence_table,
            old_database.as_deref(),
            analyzer,
            &memory.config(),
        ),
        Commands::RecommendSentence {
            database,
            dictionary_database,
            preferred_source_database,
            translation_languages,
            json,
            memory,
        } => cmd_recommend(
            database,
            dictionary_database,
            preferred_source_database,
            translation_languages,
            *json,
            &memory.config(),
        ),
        Commands::Review {
            database,
            review_time_seconds,
            seed,
            memory,
        } => cmd_review(database, *review_time_seconds, *seed, &memory.config()),
    }
}

/// One corpus line: `source_database \t source_id \t source_url \t
/// license_url \t creator \t text`. Empty fields mean unknown.
fn parse_corpus_line(line: &str) -> Option<(SourceMeta, String)> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 6 || fields[5].is_empty() {
        return None;
    }
    let opt = |s: &str| {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    };
    let meta = SourceMeta {
        database: opt(fields[0]),
        id: opt(fields[1]),
        url: opt(fields[2]),
        license: opt(fields[3]),
        creator: opt(fields[4]),
    };
    Some((meta, fields[5].to_string()))
}

fn cmd_build_database(
    database: &Path,
    sentence_table: &Path,
    old_database: Option<&Path>,
    analyzer_command: &str,
    config: &MemoryConfig,
) -> Result<()> {
    let store = Store::open(database)
        .with_context(|| format!("failed to open database {}", database.display()))?;
    kioku_store::schema::probe_tuple_assignment(store.conn())?;

    let file = std::fs::File::open(sentence_table)
        .with_context(|| format!("failed to open sentence table {}", sentence_table.display()))?;
    let mut analyzer = Analyzer::spawn(analyzer_command)?;
    let mut ingestor = Ingestor::new(&store);
    let mut malformed = 0u64;

    for (line_number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("failed to read sentence table")?;
        if line.is_empty() {
            continue;
        }
        let Some((meta, raw_text)) = parse_corpus_line(&line) else {
            tracing::warn!("sentence table line {} malformed; skipped", line_number + 1);
            malformed += 1;
            continue;
        };
        let text = strip_furigana(&raw_text);
        let record = analyzer
            .analyze(&text)
            .and_then(|tokens| Ok(SentenceRecord::assemble(meta, text.clone(), tokens)?));
        match record {
            Ok(record) => {
                ingestor.ingest(&record)?;
            }
            Err(e) => {
                tracing::warn!("cannot ingest {text:?}: {e}");
                malformed += 1;
            }
        }
    }
    let stats = ingestor.finish()?;

    if let Some(old) = old_database {
        if !old.exists() {
            bail!("old database missing: {}", old.display());
        }
        let result = transfer(&store, old, config, now_days());
        if let Err(e @ StoreError::TransferFailed(_)) = &result {
            // A half-migrated rebuild is worse than none.
            tracing::error!("{e}; discarding {}", database.display());
            store.checkpoint_truncate();
            drop(store);
            let _ = std::fs::remove_file(database);
            bail!("memory transfer failed; new database discarded");
        }
        result?;
    }

    print_build_summary_and_finish(store, stats.sentences, malformed)
}

fn print_build_summary_and_finish(store: Store, sentences: u64, malformed: u64) -> Result<()> {
    let totals = store.totals()?;
    println!("sentences: {} ({malformed} skipped)", sentences);
    for kind in AtomKind::ALL {
        println!(
            "{kind}: {} atoms (frequency total {:.0})",
            store.atom_count(kind)?,
            totals.get(kind),
        );
    }
    store.checkpoint_truncate();
    Ok(())
}

fn cmd_recommend(
    database: &Path,
    dictionary_database: &Path,
    preferred_source: &str,
    translation_languages: &[String],
    as_json: bool,
    config: &MemoryConfig,
) -> Result<()> {
    let store = Store::open(database)
        .with_context(|| format!("failed to open database {}", database.display()))?;
    let dictionary = Dictionary::open(dictionary_database)?;

    let Some(recommendation) = recommend(&store, Some(preferred_source))? else {
        println!("no sentence to recommend: nothing unknown left, or the database is empty");
        return Ok(());
    };

    let glosses: Vec<Option<String>> = recommendation
        .atoms
        .iter()
        .map(|entry| match &entry.atom.key {
            AtomKey::Lemma {
                text,
                disambiguator,
            } => dictionary.gloss(text, disambiguator, translation_languages),
            _ => None,
        })
        .collect();

    if as_json {
        let atoms: Vec<serde_json::Value> = recommendation
            .atoms
            .iter()
            .zip(&glosses)
            .map(|(entry, gloss)| {
                json!({
                    "slot": entry.atom.slot,
                    "key": entry.atom.key,
                    "frequency": entry.atom.frequency,
                    "state": entry.atom.state,
                    "learnValue": entry.learn_value,
                    "gloss": gloss,
                })
            })
            .collect();
        let output = json!({
            "sentence": {
                "text": recommendation.sentence.text,
                "segmentedText": recommendation.sentence.segmented_text,
                "pronunciation": recommendation.sentence.pronunciation,
                "sourceDatabase": recommendation.sentence.source_database,
                "sourceUrl": recommendation.sentence.source_url,
                "license": recommendation.sentence.license_url,
                "creator": recommendation.sentence.creator,
            },
            "targetFrequency": recommendation.target_frequency,
            "groupSize": recommendation.group_size,
            "atoms": atoms,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", recommendation.sentence.text);
    println!("{}", recommendation.sentence.pronunciation);
    println!(
        "unlocks {} sentence(s) via an atom seen in {} of them",
        recommendation.group_size, recommendation.target_frequency
    );
    println!();
    for (entry, gloss) in recommendation.atoms.iter().zip(&glosses) {
        let state = if entry.atom.state.is_known() {
            "known"
        } else if entry.atom.state.is_unseen() {
            "unseen"
        } else {
            "learning"
        };
        print!(
            "  {:14} {:20} f={:<4} v={:.2} [{state}]",
            entry.atom.slot.as_str(),
            entry.atom.key.label(),
            entry.atom.frequency,
            entry.learn_value,
        );
        match gloss {
            Some(gloss) => println!("  {}", gloss.lines().next().unwrap_or_default()),
            None => println!(),
        }
    }

    if std::io::stdin().is_terminal() {
        commit_learned_atoms(&store, &recommendation, config)?;
    }
    Ok(())
}

/// Ask which of the unknown atoms the learner already knows and refresh
/// those; mark the sentence as seen.
fn commit_learned_atoms(
    store: &Store,
    recommendation: &kioku_store::Recommendation,
    config: &MemoryConfig,
) -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut touched = 0u64;
    println!();
    for entry in &recommendation.atoms {
        if entry.atom.state.is_known() {
            continue;
        }
        print!("know {}? [y/N/q] ", entry.atom.key.label());
        std::io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let answer = line.trim();
        if answer == "q" {
            break;
        }
        if answer.eq_ignore_ascii_case("y") {
            store.touch(
                entry.atom.slot,
                entry.atom.atom_id,
                now_days(),
                kioku_core::memory::TouchMode::Refresh,
                config,
            )?;
            touched += 1;
        }
    }
    store.refresh_sentence_seen(recommendation.sentence.id, now_days())?;
    println!("recorded {touched} known atom(s)");
    Ok(())
}

fn cmd_review(
    database: &Path,
    review_time_seconds: u64,
    seed: Option<u64>,
    config: &MemoryConfig,
) -> Result<()> {
    let store = Store::open(database)
        .with_context(|| format!("failed to open database {}", database.display()))?;
    let mut scheduler = Scheduler::new(*config, seed);
    review::run_session(&store, &mut scheduler, review_time_seconds)?;
    store.checkpoint_truncate();
    Ok(())
}
