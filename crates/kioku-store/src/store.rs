use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use kioku_core::atom::{AtomKind, AtomSlot, ReviewType};
use kioku_core::memory::{MemoryConfig, MemoryState, ReviewOutcome, TouchMode};
use kioku_core::tokenizer::{AtomKey, SourceMeta};

use crate::error::{Result, StoreError};
use crate::schema;

/// Static SQL metadata for one atom kind.
pub(crate) struct KindSpec {
    pub kind: AtomKind,
    pub table: &'static str,
    pub link_table: &'static str,
    pub link_id: &'static str,
    pub key_columns: &'static [&'static str],
}

pub(crate) const KIND_SPECS: [KindSpec; 5] = [
    KindSpec {
        kind: AtomKind::Lemma,
        table: "lemma",
        link_table: "sentence_lemma",
        link_id: "lemma_id",
        key_columns: &["text", "disambiguator"],
    },
    KindSpec {
        kind: AtomKind::Grammar,
        table: "grammar",
        link_table: "sentence_grammar",
        link_id: "grammar_id",
        key_columns: &["form"],
    },
    KindSpec {
        kind: AtomKind::Grapheme,
        table: "grapheme",
        link_table: "sentence_grapheme",
        link_id: "grapheme_id",
        key_columns: &["text"],
    },
    KindSpec {
        kind: AtomKind::Pronunciation,
        table: "pronunciation",
        link_table: "sentence_pronunciation",
        link_id: "pronunciation_id",
        key_columns: &["word", "pronunciation"],
    },
    KindSpec {
        kind: AtomKind::Sound,
        table: "sound",
        link_table: "sentence_sound",
        link_id: "sound_id",
        key_columns: &["text"],
    },
];

pub(crate) fn kind_spec(kind: AtomKind) -> &'static KindSpec {
    &KIND_SPECS[kind.code() as usize]
}

/// Memory-state column names for a slot.
pub(crate) fn state_columns(slot: AtomSlot) -> (&'static str, &'static str) {
    match slot {
        AtomSlot::PronunciationForward => ("forward_last_refresh", "forward_last_relearn"),
        AtomSlot::PronunciationBackward => ("backward_last_refresh", "backward_last_relearn"),
        _ => ("last_refresh", "last_relearn"),
    }
}

fn key_values(key: &AtomKey) -> Vec<&str> {
    match key {
        AtomKey::Lemma {
            text,
            disambiguator,
        } => vec![text, disambiguator],
        AtomKey::Grammar { form } => vec![form],
        AtomKey::Grapheme { text } => vec![text],
        AtomKey::Pronunciation {
            word,
            pronunciation,
        } => vec![word, pronunciation],
        AtomKey::Sound { text } => vec![text],
    }
}

/// Recompute invariant (5) and (6) state for the sentences selected by
/// `scope` (a condition on the `sentence` table, possibly using `?1`).
/// The `unknown_atom` view supplies `(frequency, packed)` per unknown atom;
/// the argmin lands in the sentence row via tuple assignment.
fn propagate_scope(
    conn: &Connection,
    scope: &str,
    scope_params: &[&dyn rusqlite::ToSql],
) -> Result<()> {
    let update = format!(
        "UPDATE sentence \
            SET (minimum_unknown_frequency, id_for_minimum_unknown_frequency) = \
                (SELECT u.frequency, u.packed FROM unknown_atom u \
                  WHERE u.sentence_id = sentence.id \
                  ORDER BY u.frequency ASC, u.packed ASC LIMIT 1) \
          WHERE {scope}"
    );
    conn.execute(&update, scope_params)?;

    let delete = format!(
        "DELETE FROM review WHERE sentence_id IN \
             (SELECT id FROM sentence \
               WHERE {scope} AND minimum_unknown_frequency IS NOT NULL)"
    );
    conn.execute(&delete, scope_params)?;

    for review_type in ReviewType::ALL {
        let insert = format!(
            "INSERT OR IGNORE INTO review (sentence_id, review_type) \
                 SELECT id, {code} FROM sentence \
                  WHERE {scope} AND minimum_unknown_frequency IS NULL",
            code = review_type.code(),
        );
        conn.execute(&insert, scope_params)?;
    }
    Ok(())
}

/// Recompute invariants (5)/(6) for every sentence linked to one atom.
fn propagate_for_atom(conn: &Connection, kind: AtomKind, atom_id: i64) -> Result<()> {
    let spec = kind_spec(kind);
    let scope = format!(
        "sentence.id IN (SELECT sentence_id FROM {link} WHERE {link_id} = ?1)",
        link = spec.link_table,
        link_id = spec.link_id,
    );
    propagate_scope(conn, &scope, &[&atom_id])
}

/// A sentence row as stored.
#[derive(Debug, Clone)]
pub struct SentenceRow {
    pub id: i64,
    pub text: String,
    pub segmented_text: String,
    pub pronunciation: String,
    pub source_database: Option<String>,
    pub source_url: Option<String>,
    pub source_id: Option<String>,
    pub license_url: Option<String>,
    pub creator: Option<String>,
    pub last_seen: Option<f64>,
    pub minimum_unknown_frequency: Option<f64>,
    pub id_for_minimum_unknown_frequency: Option<i64>,
}

const SENTENCE_COLUMNS: &str = "id, text, segmented_text, pronunciation, source_database, \
     source_url, source_id, license_url, creator, last_seen, \
     minimum_unknown_frequency, id_for_minimum_unknown_frequency";

fn sentence_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SentenceRow> {
    Ok(SentenceRow {
        id: row.get(0)?,
        text: row.get(1)?,
        segmented_text: row.get(2)?,
        pronunciation: row.get(3)?,
        source_database: row.get(4)?,
        source_url: row.get(5)?,
        source_id: row.get(6)?,
        license_url: row.get(7)?,
        creator: row.get(8)?,
        last_seen: row.get(9)?,
        minimum_unknown_frequency: row.get(10)?,
        id_for_minimum_unknown_frequency: row.get(11)?,
    })
}

/// An atom eligible for review selection.
#[derive(Debug, Clone, Copy)]
pub struct EligibleAtom {
    pub atom_id: i64,
    pub frequency: f64,
    pub state: MemoryState,
}

/// One slot of one atom linked to a sentence, for breakdowns and commits.
#[derive(Debug, Clone)]
pub struct SentenceAtom {
    pub slot: AtomSlot,
    pub atom_id: i64,
    pub key: AtomKey,
    pub frequency: f64,
    pub state: MemoryState,
    pub position: i64,
}

/// Per-kind cached frequency sums.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub lemma: f64,
    pub grammar: f64,
    pub grapheme: f64,
    pub pronunciation: f64,
    pub sound: f64,
}

impl Totals {
    pub fn get(&self, kind: AtomKind) -> f64 {
        match kind {
            AtomKind::Lemma => self.lemma,
            AtomKind::Grammar => self.grammar,
            AtomKind::Grapheme => self.grapheme,
            AtomKind::Pronunciation => self.pronunciation,
            AtomKind::Sound => self.sound,
        }
    }
}

/// A review-event log row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub atom_kind: i64,
    pub direction: Option<i64>,
    pub frequency: f64,
    pub time_since_last_refresh: f64,
    pub time_since_last_relearn: f64,
    pub remembered: bool,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a TRUNCATE checkpoint — flushes WAL and removes the file.
    /// Used during clean shutdown.
    pub fn checkpoint_truncate(&self) {
        let _ = self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }

    // --- Sentences ---

    /// Insert a sentence, idempotent on `text`. Returns `(id, created)`.
    pub fn upsert_sentence(
        &self,
        text: &str,
        segmented_text: &str,
        pronunciation: &str,
        meta: &SourceMeta,
    ) -> Result<(i64, bool)> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO sentence \
                 (text, segmented_text, pronunciation, source_database, source_url, \
                  source_id, license_url, creator) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                text,
                segmented_text,
                pronunciation,
                meta.database,
                meta.url,
                meta.id,
                meta.license,
                meta.creator
            ],
        )?;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM sentence WHERE text = ?1",
            [text],
            |row| row.get(0),
        )?;
        Ok((id, inserted > 0))
    }

    pub fn sentence(&self, id: i64) -> Result<SentenceRow> {
        let sql = format!("SELECT {SENTENCE_COLUMNS} FROM sentence WHERE id = ?1");
        self.conn
            .query_row(&sql, [id], sentence_from_row)
            .optional()?
            .ok_or_else(|| StoreError::InvalidData(format!("no sentence with id {id}")))
    }

    pub fn sentence_by_text(&self, text: &str) -> Result<Option<SentenceRow>> {
        let sql = format!("SELECT {SENTENCE_COLUMNS} FROM sentence WHERE text = ?1");
        Ok(self.conn.query_row(&sql, [text], sentence_from_row).optional()?)
    }

    pub fn total_sentences(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sentence", [], |row| row.get(0))?)
    }

    pub fn refresh_sentence_seen(&self, sentence_id: i64, now: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE sentence SET last_seen = ?1 WHERE id = ?2",
            params![now, sentence_id],
        )?;
        Ok(())
    }

    // --- Atoms and links ---

    /// Insert the atom if new, then count one occurrence. Calling n times
    /// adds n to `frequency`; ingestion therefore calls once per containing
    /// sentence.
    pub fn upsert_atom(&self, key: &AtomKey) -> Result<i64> {
        let spec = kind_spec(key.kind());
        let values = key_values(key);
        let columns = spec.key_columns.join(", ");
        let placeholders: Vec<String> =
            (1..=values.len()).map(|i| format!("?{i}")).collect();
        let matches: Vec<String> = spec
            .key_columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect();
        let matches = matches.join(" AND ");

        self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} ({columns}, frequency) VALUES ({values}, 0)",
                table = spec.table,
                values = placeholders.join(", "),
            ),
            rusqlite::params_from_iter(values.iter()),
        )?;
        self.conn.execute(
            &format!(
                "UPDATE {table} SET frequency = frequency + 1 WHERE {matches}",
                table = spec.table,
            ),
            rusqlite::params_from_iter(values.iter()),
        )?;
        let id = self.conn.query_row(
            &format!(
                "SELECT id FROM {table} WHERE {matches}",
                table = spec.table,
            ),
            rusqlite::params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Link a sentence to an atom; only the first insertion counts.
    pub fn link(
        &self,
        sentence_id: i64,
        kind: AtomKind,
        atom_id: i64,
        position: i64,
    ) -> Result<bool> {
        let spec = kind_spec(kind);
        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {link} (sentence_id, {link_id}, position) \
                 VALUES (?1, ?2, ?3)",
                link = spec.link_table,
                link_id = spec.link_id,
            ),
            params![sentence_id, atom_id, position],
        )?;
        Ok(inserted > 0)
    }

    /// Natural key of an atom row.
    pub fn atom_key(&self, kind: AtomKind, atom_id: i64) -> Result<AtomKey> {
        let spec = kind_spec(kind);
        let key_cols = spec.key_columns.join(", ");
        let sql = format!(
            "SELECT {key_cols} FROM {table} WHERE id = ?1",
            table = spec.table,
        );
        self.conn
            .query_row(&sql, [atom_id], |row| {
                let first: String = row.get(0)?;
                Ok(match kind {
                    AtomKind::Lemma => AtomKey::Lemma {
                        text: first,
                        disambiguator: row.get(1)?,
                    },
                    AtomKind::Grammar => AtomKey::Grammar { form: first },
                    AtomKind::Grapheme => AtomKey::Grapheme { text: first },
                    AtomKind::Pronunciation => AtomKey::Pronunciation {
                        word: first,
                        pronunciation: row.get(1)?,
                    },
                    AtomKind::Sound => AtomKey::Sound { text: first },
                })
            })
            .optional()?
            .ok_or_else(|| {
                StoreError::InvalidData(format!("no {} atom with id {atom_id}", spec.table))
            })
    }

    pub fn atom_count(&self, kind: AtomKind) -> Result<i64> {
        let spec = kind_spec(kind);
        Ok(self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", spec.table),
            [],
            |row| row.get(0),
        )?)
    }

    // --- Totals ---

    /// Refresh the cached per-kind frequency sum.
    pub fn recompute_totals(&self, kind: AtomKind) -> Result<()> {
        let spec = kind_spec(kind);
        self.conn.execute(
            &format!(
                "UPDATE totals SET {kind}_total = \
                     (SELECT COALESCE(SUM(frequency), 0) FROM {table}) \
                 WHERE id = 0",
                kind = spec.table,
                table = spec.table,
            ),
            [],
        )?;
        Ok(())
    }

    pub fn totals(&self) -> Result<Totals> {
        Ok(self.conn.query_row(
            "SELECT lemma_total, grammar_total, grapheme_total, \
                    pronunciation_total, sound_total \
             FROM totals WHERE id = 0",
            [],
            |row| {
                Ok(Totals {
                    lemma: row.get(0)?,
                    grammar: row.get(1)?,
                    grapheme: row.get(2)?,
                    pronunciation: row.get(3)?,
                    sound: row.get(4)?,
                })
            },
        )?)
    }

    // --- Memory state ---

    pub fn atom_state(&self, slot: AtomSlot, atom_id: i64) -> Result<MemoryState> {
        let spec = kind_spec(slot.kind());
        let (refresh, relearn) = state_columns(slot);
        self.conn
            .query_row(
                &format!(
                    "SELECT {refresh}, {relearn} FROM {table} WHERE id = ?1",
                    table = spec.table,
                ),
                [atom_id],
                |row| Ok(MemoryState::new(row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::InvalidData(format!("no {} atom with id {atom_id}", spec.table))
            })
    }

    /// Apply a touch and propagate invariants, atomically.
    ///
    /// Emits a log row iff the atom was known before the call. Sentences
    /// linked to the atom recompute `minimum_unknown_frequency` and review
    /// membership whenever the known set changes.
    pub fn touch(
        &self,
        slot: AtomSlot,
        atom_id: i64,
        now: f64,
        mode: TouchMode,
        config: &MemoryConfig,
    ) -> Result<Option<ReviewOutcome>> {
        let spec = kind_spec(slot.kind());
        let (refresh, relearn) = state_columns(slot);
        let tx = self.conn.unchecked_transaction()?;

        let (frequency, state) = tx
            .query_row(
                &format!(
                    "SELECT frequency, {refresh}, {relearn} FROM {table} WHERE id = ?1",
                    table = spec.table,
                ),
                [atom_id],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        MemoryState::new(row.get(1)?, row.get(2)?),
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::InvalidData(format!("no {} atom with id {atom_id}", spec.table))
            })?;

        let (next, outcome) = state.touch(now, mode, config);
        tx.execute(
            &format!(
                "UPDATE {table} SET {refresh} = ?1, {relearn} = ?2 WHERE id = ?3",
                table = spec.table,
            ),
            params![next.last_refresh, next.last_relearn, atom_id],
        )?;

        if let Some(outcome) = outcome {
            tx.execute(
                "INSERT INTO log (atom_kind, direction, frequency, \
                     time_since_last_refresh, time_since_last_relearn, remembered) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    slot.kind().code(),
                    slot.direction().map(|d| d.code()),
                    frequency,
                    outcome.time_since_last_refresh,
                    outcome.time_since_last_relearn,
                    outcome.remembered as i64,
                ],
            )?;
        }

        if state.is_known() != next.is_known() {
            propagate_for_atom(&tx, slot.kind(), atom_id)?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// Recompute invariants (5)/(6) for every sentence. Used after bulk
    /// ingestion, when frequencies have moved under existing minima.
    pub fn recompute_all_min_unknown(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        propagate_scope(&tx, "1 = 1", &[])?;
        tx.commit()?;
        Ok(())
    }

    // --- Scheduler queries ---

    /// Atoms of one slot with both timestamps set and past the grace period.
    pub fn eligible_atoms(&self, slot: AtomSlot, now: f64, grace: f64) -> Result<Vec<EligibleAtom>> {
        let spec = kind_spec(slot.kind());
        let (refresh, relearn) = state_columns(slot);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, frequency, {refresh}, {relearn} FROM {table} \
              WHERE {refresh} IS NOT NULL AND {relearn} IS NOT NULL \
                AND {refresh} <= ?1",
            table = spec.table,
        ))?;
        let rows = stmt
            .query_map([now - grace], |row| {
                Ok(EligibleAtom {
                    atom_id: row.get(0)?,
                    frequency: row.get(1)?,
                    state: MemoryState::new(row.get(2)?, row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Fully-known sentences containing the atom, i.e. reviewable ones.
    pub fn known_sentences_for_atom(
        &self,
        kind: AtomKind,
        atom_id: i64,
    ) -> Result<Vec<SentenceRow>> {
        let spec = kind_spec(kind);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SENTENCE_COLUMNS} FROM sentence \
              WHERE minimum_unknown_frequency IS NULL \
                AND id IN (SELECT sentence_id FROM {link} WHERE {link_id} = ?1)",
            link = spec.link_table,
            link_id = spec.link_id,
        ))?;
        let rows = stmt
            .query_map([atom_id], sentence_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Best group of not-fully-known sentences: sentences sharing the same
    /// cheapest unknown atom, scored by `frequency × group size`.
    pub fn recommend_group(&self) -> Result<Option<(i64, f64, i64)>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id_for_minimum_unknown_frequency, \
                        minimum_unknown_frequency, COUNT(*) \
                   FROM sentence \
                  WHERE minimum_unknown_frequency IS NOT NULL \
                    AND id_for_minimum_unknown_frequency IS NOT NULL \
                  GROUP BY id_for_minimum_unknown_frequency \
                  ORDER BY minimum_unknown_frequency * COUNT(*) DESC, \
                           id_for_minimum_unknown_frequency ASC \
                  LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?)
    }

    /// The sentence to present from a recommendation group.
    pub fn pick_group_sentence(
        &self,
        packed_id: i64,
        preferred_source: Option<&str>,
    ) -> Result<Option<SentenceRow>> {
        let sql = format!(
            "SELECT {SENTENCE_COLUMNS} FROM sentence \
              WHERE id_for_minimum_unknown_frequency = ?1 \
              ORDER BY CASE WHEN source_database = ?2 THEN 0 ELSE 1 END, id \
              LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![packed_id, preferred_source], sentence_from_row)
            .optional()?)
    }

    /// All atom slots linked to a sentence, in positional occurrence order.
    pub fn sentence_atoms(&self, sentence_id: i64) -> Result<Vec<SentenceAtom>> {
        let mut atoms: Vec<SentenceAtom> = Vec::new();
        for spec in &KIND_SPECS {
            let key_cols = spec.key_columns.join(", ");
            let state_cols = match spec.kind {
                AtomKind::Pronunciation => {
                    "forward_last_refresh, forward_last_relearn, \
                     backward_last_refresh, backward_last_relearn"
                }
                _ => "last_refresh, last_relearn, NULL, NULL",
            };
            let sql = format!(
                "SELECT a.id, a.frequency, l.position, {key_cols}, {state_cols} \
                   FROM {link} l JOIN {table} a ON a.id = l.{link_id} \
                  WHERE l.sentence_id = ?1",
                link = spec.link_table,
                table = spec.table,
                link_id = spec.link_id,
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let key_count = spec.key_columns.len();
            let mut rows = stmt.query([sentence_id])?;
            while let Some(row) = rows.next()? {
                let atom_id: i64 = row.get(0)?;
                let frequency: f64 = row.get(1)?;
                let position: i64 = row.get(2)?;
                let first_key: String = row.get(3)?;
                let key = match spec.kind {
                    AtomKind::Lemma => AtomKey::Lemma {
                        text: first_key,
                        disambiguator: row.get(4)?,
                    },
                    AtomKind::Grammar => AtomKey::Grammar { form: first_key },
                    AtomKind::Grapheme => AtomKey::Grapheme { text: first_key },
                    AtomKind::Pronunciation => AtomKey::Pronunciation {
                        word: first_key,
                        pronunciation: row.get(4)?,
                    },
                    AtomKind::Sound => AtomKey::Sound { text: first_key },
                };
                let state_base = 3 + key_count;
                let primary = MemoryState::new(
                    row.get(state_base)?,
                    row.get(state_base + 1)?,
                );
                match spec.kind {
                    AtomKind::Pronunciation => {
                        let backward = MemoryState::new(
                            row.get(state_base + 2)?,
                            row.get(state_base + 3)?,
                        );
                        atoms.push(SentenceAtom {
                            slot: AtomSlot::PronunciationForward,
                            atom_id,
                            key: key.clone(),
                            frequency,
                            state: primary,
                            position,
                        });
                        atoms.push(SentenceAtom {
                            slot: AtomSlot::PronunciationBackward,
                            atom_id,
                            key,
                            frequency,
                            state: backward,
                            position,
                        });
                    }
                    kind => {
                        let slot = match kind {
                            AtomKind::Lemma => AtomSlot::Lemma,
                            AtomKind::Grammar => AtomSlot::Grammar,
                            AtomKind::Grapheme => AtomSlot::Grapheme,
                            AtomKind::Sound => AtomSlot::Sound,
                            AtomKind::Pronunciation => unreachable!(),
                        };
                        atoms.push(SentenceAtom {
                            slot,
                            atom_id,
                            key,
                            frequency,
                            state: primary,
                            position,
                        });
                    }
                }
            }
        }
        atoms.sort_by_key(|a| (a.position, a.slot.index()));
        Ok(atoms)
    }

    /// Earliest scheduled refresh across all known atoms, for the session
    /// summary. `None` when nothing is known yet.
    pub fn min_next_refresh(&self, config: &MemoryConfig) -> Result<Option<f64>> {
        let mut min: Option<f64> = None;
        for slot in AtomSlot::ALL {
            let spec = kind_spec(slot.kind());
            let (refresh, relearn) = state_columns(slot);
            let value: Option<f64> = self.conn.query_row(
                &format!(
                    "SELECT MIN({refresh} - ?1 * (?2 + {refresh} - {relearn})) \
                       FROM {table} \
                      WHERE {refresh} IS NOT NULL AND {relearn} IS NOT NULL",
                    table = spec.table,
                ),
                params![config.log_retention(), config.baseline_strength],
                |row| row.get(0),
            )?;
            min = match (min, value) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (None, v) => v,
                (v, None) => v,
            };
        }
        Ok(min)
    }

    // --- Review queue and log introspection ---

    pub fn review_entries(&self) -> Result<Vec<(i64, ReviewType)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT sentence_id, review_type FROM review ORDER BY sentence_id, review_type")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, code)| {
                ReviewType::from_code(code)
                    .map(|t| (id, t))
                    .ok_or_else(|| StoreError::InvalidData(format!("bad review type {code}")))
            })
            .collect()
    }

    pub fn log_rows(&self) -> Result<Vec<LogRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT atom_kind, direction, frequency, time_since_last_refresh, \
                    time_since_last_relearn, remembered \
               FROM log ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LogRow {
                    atom_kind: row.get(0)?,
                    direction: row.get(1)?,
                    frequency: row.get(2)?,
                    time_since_last_refresh: row.get(3)?,
                    time_since_last_relearn: row.get(4)?,
                    remembered: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
