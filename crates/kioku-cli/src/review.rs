//! Interactive review session, bounded by a wall-clock budget.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::Result;

use kioku_core::atom::ReviewType;
use kioku_core::memory::TouchMode;
use kioku_core::time::{days_to_iso8601, format_duration_days, now_days};
use kioku_store::{Scheduler, Store};

#[derive(Debug, Default)]
pub struct SessionSummary {
    pub presented: u64,
    pub remembered: u64,
}

/// Run one session: pick, present, commit, repeat until the budget elapses,
/// the queue drains, or the learner quits. The closing summary renders even
/// when nothing was presented.
pub fn run_session(
    store: &Store,
    scheduler: &mut Scheduler,
    budget_seconds: u64,
) -> Result<SessionSummary> {
    let config = *scheduler.config();
    let started = Instant::now();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut summary = SessionSummary::default();

    loop {
        // The budget gates the next pick; an answered item always commits.
        if started.elapsed().as_secs_f64() >= budget_seconds as f64 {
            break;
        }
        let now = now_days();
        let Some(item) = scheduler.next_review(store, now)? else {
            break;
        };

        let prompt = match item.review_type {
            ReviewType::WritingToPronunciation => &item.sentence.segmented_text,
            ReviewType::PronunciationToWriting => &item.sentence.pronunciation,
        };
        println!();
        println!("[{}]", item.review_type);
        println!("  {prompt}");
        print!("(enter to reveal, q to stop) ");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 || line.trim() == "q" {
            break;
        }

        println!("  {}", item.sentence.segmented_text);
        println!("  {}", item.sentence.pronunciation);
        print!("remembered {}? [y/n/q] ", item.atom_label);
        io::stdout().flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let answer = line.trim();
        if answer == "q" {
            break;
        }
        let mode = if answer.eq_ignore_ascii_case("y") {
            TouchMode::Refresh
        } else {
            TouchMode::Relearn
        };
        let now = now_days();
        store.touch(item.slot, item.atom_id, now, mode, &config)?;
        store.refresh_sentence_seen(item.sentence.id, now)?;
        summary.presented += 1;
        if mode == TouchMode::Refresh {
            summary.remembered += 1;
        }
    }

    println!();
    println!(
        "session: {} presented, {} remembered",
        summary.presented, summary.remembered
    );
    match store.min_next_refresh(&config)? {
        Some(next) => {
            let now = now_days();
            if next <= now {
                println!("next review: already due");
            } else {
                println!(
                    "next review in {} (at {})",
                    format_duration_days(next - now),
                    days_to_iso8601(next)
                );
            }
        }
        None => println!("next review: nothing learned yet"),
    }
    Ok(summary)
}
