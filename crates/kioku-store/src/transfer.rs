//! Rebuild migration: carry learning state from an old store into a newly
//! built one whose decomposition may differ.
//!
//! The old database is ATTACHed read-only alongside the new one. Atoms
//! matched by natural key copy their timestamps verbatim; atoms new to the
//! rebuild inherit from sentence-level aggregates matched by text. Stores
//! from the memory-strength era migrate through a sparse least-squares
//! solve instead.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, params};

use kioku_core::atom::{AtomSlot, ReviewType};
use kioku_core::memory::{MemoryConfig, MemoryState};
use kioku_core::solver::{CsrMatrix, SolveOptions, least_squares};

use crate::error::{Result, StoreError};
use crate::store::{Store, kind_spec, state_columns};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferVariant {
    Timestamps,
    MemoryStrength,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferReport {
    pub variant: TransferVariant,
    pub matched_sentences: u64,
    /// Atoms whose timestamps copied over by natural key.
    pub copied_atoms: u64,
    /// Atoms filled in from sentence-level aggregates.
    pub inherited_atoms: u64,
    /// Atoms assigned by the least-squares solve (legacy stores).
    pub solved_atoms: u64,
    pub log_rows: u64,
}

fn strength_column(slot: AtomSlot) -> &'static str {
    match slot {
        AtomSlot::PronunciationForward => "forward_memory_strength",
        AtomSlot::PronunciationBackward => "backward_memory_strength",
        _ => "memory_strength",
    }
}

fn old_table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA old.table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

fn detect_variant(conn: &Connection) -> Result<TransferVariant> {
    let columns = old_table_columns(conn, "lemma")?;
    if columns.is_empty() {
        return Err(StoreError::InvalidData(
            "old database has no lemma table; not a sentence store".to_string(),
        ));
    }
    if columns.iter().any(|c| c == "last_refresh") {
        Ok(TransferVariant::Timestamps)
    } else if columns.iter().any(|c| c == "memory_strength") {
        Ok(TransferVariant::MemoryStrength)
    } else {
        Err(StoreError::InvalidData(
            "old lemma table carries neither last_refresh nor memory_strength".to_string(),
        ))
    }
}

/// Migrate learning state from the store at `old_path` into `store`.
/// `now` stamps strength-era atoms, which carry no times of their own.
pub fn transfer(
    store: &Store,
    old_path: &Path,
    config: &MemoryConfig,
    now: f64,
) -> Result<TransferReport> {
    let conn = store.conn();
    conn.execute(
        "ATTACH DATABASE ?1 AS old",
        [old_path.to_string_lossy().as_ref()],
    )?;
    let result = transfer_attached(store, config, now);
    let _ = conn.execute_batch("DROP TABLE IF EXISTS temp.old_times;");
    let _ = conn.execute_batch("DETACH DATABASE old;");
    result
}

fn transfer_attached(store: &Store, config: &MemoryConfig, now: f64) -> Result<TransferReport> {
    let conn = store.conn();
    let variant = detect_variant(conn)?;
    let matched_sentences: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sentence s JOIN old.sentence o ON o.text = s.text",
        [],
        |row| row.get(0),
    )?;

    let mut report = TransferReport {
        variant,
        matched_sentences: matched_sentences as u64,
        copied_atoms: 0,
        inherited_atoms: 0,
        solved_atoms: 0,
        log_rows: 0,
    };

    let tx = conn.unchecked_transaction()?;
    match variant {
        TransferVariant::Timestamps => {
            transfer_last_seen(conn)?;
            report.copied_atoms = copy_matched_atoms(conn)?;
            build_old_sentence_times(conn, config)?;
            report.inherited_atoms = disaggregate_times(conn, config)?;
            report.log_rows = copy_log(conn)?;
        }
        TransferVariant::MemoryStrength => {
            report.solved_atoms = transfer_strengths(conn, config, now)?;
        }
    }
    tx.commit()?;
    store.recompute_all_min_unknown()?;

    tracing::info!(
        "transfer ({:?}): {} matched sentences, {} copied, {} inherited, {} solved, {} log rows",
        report.variant,
        report.matched_sentences,
        report.copied_atoms,
        report.inherited_atoms,
        report.solved_atoms,
        report.log_rows
    );
    Ok(report)
}

fn transfer_last_seen(conn: &Connection) -> Result<()> {
    if !old_table_columns(conn, "sentence")?
        .iter()
        .any(|c| c == "last_seen")
    {
        return Ok(());
    }
    conn.execute(
        "UPDATE sentence SET last_seen = \
             (SELECT MAX(IFNULL(sentence.last_seen, 0), o.last_seen) \
                FROM old.sentence o \
               WHERE o.text = sentence.text AND o.last_seen IS NOT NULL) \
          WHERE EXISTS (SELECT 1 FROM old.sentence o \
                         WHERE o.text = sentence.text AND o.last_seen IS NOT NULL)",
        [],
    )?;
    Ok(())
}

/// Key-matched atoms keep their exact old pair — the lossless path.
fn copy_matched_atoms(conn: &Connection) -> Result<u64> {
    let mut copied = 0u64;
    for slot in AtomSlot::ALL {
        let spec = kind_spec(slot.kind());
        let (refresh, relearn) = state_columns(slot);
        let matches: Vec<String> = spec
            .key_columns
            .iter()
            .map(|col| format!("o.{col} = {table}.{col}", table = spec.table))
            .collect();
        let matches = matches.join(" AND ");
        let sql = format!(
            "UPDATE {table} SET ({refresh}, {relearn}) = \
                 (SELECT o.{refresh}, o.{relearn} FROM old.{table} o WHERE {matches}) \
              WHERE EXISTS (SELECT 1 FROM old.{table} o \
                             WHERE {matches} AND o.{refresh} IS NOT NULL)",
            table = spec.table,
        );
        copied += conn.execute(&sql, [])? as u64;
    }
    Ok(copied)
}

/// Per old sentence and review type, the earliest refresh and scheduled
/// refresh over that type's known atoms.
fn build_old_sentence_times(conn: &Connection, config: &MemoryConfig) -> Result<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS temp.old_times;
         CREATE TEMP TABLE old_times (
             text         TEXT NOT NULL,
             review_type  INTEGER NOT NULL,
             last_refresh REAL NOT NULL,
             next_refresh REAL NOT NULL,
             PRIMARY KEY (text, review_type)
         );",
    )?;
    for review_type in ReviewType::ALL {
        let unions: Vec<String> = review_type
            .slots()
            .iter()
            .map(|&slot| {
                let spec = kind_spec(slot.kind());
                let (refresh, relearn) = state_columns(slot);
                format!(
                    "SELECT os.text AS text, a.{refresh} AS lr, a.{relearn} AS lrel \
                       FROM old.sentence os \
                       JOIN old.{link} l ON l.sentence_id = os.id \
                       JOIN old.{table} a ON a.id = l.{link_id} \
                      WHERE a.{refresh} IS NOT NULL AND a.{relearn} IS NOT NULL",
                    link = spec.link_table,
                    table = spec.table,
                    link_id = spec.link_id,
                )
            })
            .collect();
        let sql = format!(
            "INSERT INTO old_times \
             SELECT t.text, {code}, MIN(t.lr), \
                    MIN(t.lr - ?1 * (?2 + t.lr - t.lrel)) \
               FROM ({unions}) t GROUP BY t.text",
            code = review_type.code(),
            unions = unions.join(" UNION ALL "),
        );
        conn.execute(&sql, params![config.log_retention(), config.baseline_strength])?;
    }
    Ok(())
}

/// Fill atoms the rebuild introduced (those with no key match in the old
/// store) from the sentence aggregates: max over matched linked sentences,
/// merged with any already-set value via the ifnull/max rule, then invert
/// the next-refresh definition to recover `last_relearn`. Key-matched atoms
/// already carry their exact old pair and are left untouched, which is what
/// makes transfer-to-self the identity.
fn disaggregate_times(conn: &Connection, config: &MemoryConfig) -> Result<u64> {
    let log_retention = config.log_retention();
    let mut inherited = 0u64;
    for slot in AtomSlot::ALL {
        let spec = kind_spec(slot.kind());
        let (refresh, relearn) = state_columns(slot);
        let codes: Vec<String> = ReviewType::types_for(slot)
            .iter()
            .map(|t| t.code().to_string())
            .collect();
        let matches: Vec<String> = spec
            .key_columns
            .iter()
            .map(|col| format!("o.{col} = a.{col}"))
            .collect();
        let select = format!(
            "SELECT a.id, a.{refresh}, a.{relearn}, \
                    MAX(t.last_refresh), MAX(t.next_refresh) \
               FROM {table} a \
               JOIN {link} l ON l.{link_id} = a.id \
               JOIN sentence s ON s.id = l.sentence_id \
               JOIN temp.old_times t ON t.text = s.text \
                    AND t.review_type IN ({codes}) \
              WHERE NOT EXISTS (SELECT 1 FROM old.{table} o WHERE {matches}) \
              GROUP BY a.id",
            table = spec.table,
            link = spec.link_table,
            link_id = spec.link_id,
            codes = codes.join(", "),
            matches = matches.join(" AND "),
        );
        let mut stmt = conn.prepare(&select)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    MemoryState::new(row.get(1)?, row.get(2)?),
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let update = format!(
            "UPDATE {table} SET {refresh} = ?1, {relearn} = ?2 WHERE id = ?3",
            table = spec.table,
        );
        for (atom_id, existing, candidate_refresh, candidate_next) in rows {
            let was_unseen = existing.is_unseen();
            let final_refresh = existing.last_refresh.unwrap_or(0.0).max(candidate_refresh);
            let final_next = existing
                .next_refresh(config)
                .unwrap_or(0.0)
                .max(candidate_next);
            let spacing = ((final_next - final_refresh) / -log_retention
                - config.baseline_strength)
                .max(0.0);
            let final_relearn = final_refresh - spacing;
            conn.execute(&update, params![final_refresh, final_relearn, atom_id])?;
            if was_unseen {
                inherited += 1;
            }
        }
    }
    Ok(inherited)
}

fn copy_log(conn: &Connection) -> Result<u64> {
    let has_log: i64 = conn.query_row(
        "SELECT COUNT(*) FROM old.sqlite_master WHERE type = 'table' AND name = 'log'",
        [],
        |row| row.get(0),
    )?;
    if has_log == 0 {
        return Ok(0);
    }
    let copied = conn.execute(
        "INSERT INTO log (atom_kind, direction, frequency, \
             time_since_last_refresh, time_since_last_relearn, remembered) \
         SELECT atom_kind, direction, frequency, \
             time_since_last_refresh, time_since_last_relearn, remembered \
           FROM old.log ORDER BY id",
        [],
    )?;
    Ok(copied as u64)
}

/// Legacy stores carry one scalar strength per atom slot. Aggregate them
/// onto matched `(sentence, review type)` rows through a column-normalized
/// membership matrix, then least-squares the new membership matrix against
/// those row values.
fn transfer_strengths(conn: &Connection, config: &MemoryConfig, now: f64) -> Result<u64> {
    // Matched sentence pairs index the matrix rows, one per review type.
    let mut stmt =
        conn.prepare("SELECT s.id, o.id FROM sentence s JOIN old.sentence o ON o.text = s.text")?;
    let pairs = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<Vec<(i64, i64)>, _>>()?;
    drop(stmt);
    if pairs.is_empty() {
        return Ok(0);
    }

    let mut old_row_of: HashMap<i64, usize> = HashMap::new();
    let mut new_row_of: HashMap<i64, usize> = HashMap::new();
    for (i, (new_id, old_id)) in pairs.iter().enumerate() {
        new_row_of.insert(*new_id, i);
        old_row_of.insert(*old_id, i);
    }
    let row_count = pairs.len() * ReviewType::ALL.len();
    let row_index = |pair: usize, review_type: ReviewType| -> usize {
        pair * ReviewType::ALL.len() + review_type.code() as usize
    };

    // Old side: membership entries and per-column strengths.
    let mut old_columns: Vec<f64> = Vec::new();
    let mut old_entries: Vec<(usize, usize)> = Vec::new();
    for slot in AtomSlot::ALL {
        let spec = kind_spec(slot.kind());
        let strength = strength_column(slot);
        let sql = format!(
            "SELECT l.sentence_id, a.id, a.{strength} \
               FROM old.{link} l JOIN old.{table} a ON a.id = l.{link_id} \
              WHERE a.{strength} IS NOT NULL AND a.{strength} > 0 \
              ORDER BY a.id",
            link = spec.link_table,
            table = spec.table,
            link_id = spec.link_id,
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut column_of: HashMap<i64, usize> = HashMap::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let sentence_id: i64 = row.get(0)?;
            let atom_id: i64 = row.get(1)?;
            let value: f64 = row.get(2)?;
            let Some(&pair) = old_row_of.get(&sentence_id) else {
                continue;
            };
            let column = *column_of.entry(atom_id).or_insert_with(|| {
                old_columns.push(value);
                old_columns.len() - 1
            });
            for review_type in ReviewType::types_for(slot) {
                old_entries.push((row_index(pair, review_type), column));
            }
        }
    }
    let sentence_memory =
        normalized_membership(row_count, old_columns.len(), &old_entries).matvec(&old_columns);

    // New side: membership of every atom slot linked to a matched sentence.
    let mut new_slots: Vec<(AtomSlot, i64)> = Vec::new();
    let mut new_entries: Vec<(usize, usize)> = Vec::new();
    for slot in AtomSlot::ALL {
        let spec = kind_spec(slot.kind());
        let sql = format!(
            "SELECT l.sentence_id, a.id \
               FROM {link} l JOIN {table} a ON a.id = l.{link_id} \
              ORDER BY a.id",
            link = spec.link_table,
            table = spec.table,
            link_id = spec.link_id,
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut column_of: HashMap<i64, usize> = HashMap::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let sentence_id: i64 = row.get(0)?;
            let atom_id: i64 = row.get(1)?;
            let Some(&pair) = new_row_of.get(&sentence_id) else {
                continue;
            };
            let column = *column_of.entry(atom_id).or_insert_with(|| {
                new_slots.push((slot, atom_id));
                new_slots.len() - 1
            });
            for review_type in ReviewType::types_for(slot) {
                new_entries.push((row_index(pair, review_type), column));
            }
        }
    }
    if new_slots.is_empty() {
        return Ok(0);
    }

    let matrix = normalized_membership(row_count, new_slots.len(), &new_entries);
    let solution = least_squares(&matrix, &sentence_memory, SolveOptions::default())
        .map_err(|e| StoreError::TransferFailed(e.to_string()))?;

    let mut solved = 0u64;
    for ((slot, atom_id), strength) in new_slots.into_iter().zip(solution) {
        if strength <= 0.0 {
            continue;
        }
        let spec = kind_spec(slot.kind());
        let (refresh, relearn) = state_columns(slot);
        // A strength of `x` days maps onto the pair as `baseline + s = x`,
        // stamped at transfer time.
        let spacing = (strength - config.baseline_strength).max(0.0);
        conn.execute(
            &format!(
                "UPDATE {table} SET {refresh} = ?1, {relearn} = ?2 WHERE id = ?3",
                table = spec.table,
            ),
            params![now, now - spacing, atom_id],
        )?;
        solved += 1;
    }
    Ok(solved)
}

/// Indicator matrix with each column scaled to sum to one.
fn normalized_membership(rows: usize, cols: usize, entries: &[(usize, usize)]) -> CsrMatrix {
    let mut column_counts = vec![0usize; cols];
    for &(_, col) in entries {
        column_counts[col] += 1;
    }
    let triplets: Vec<(usize, usize, f64)> = entries
        .iter()
        .map(|&(row, col)| (row, col, 1.0 / column_counts[col] as f64))
        .collect();
    CsrMatrix::from_triplets(rows, cols, &triplets)
}
