use rusqlite::Connection;

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    // Force-checkpoint any stale WAL data into the main DB on startup.
    // Errors are non-fatal — in-memory DBs and fresh files legitimately fail this.
    let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sentence (
            id                                INTEGER PRIMARY KEY,
            text                              TEXT NOT NULL UNIQUE,
            segmented_text                    TEXT NOT NULL DEFAULT '',
            pronunciation                     TEXT NOT NULL DEFAULT '',
            source_database                   TEXT,
            source_url                        TEXT,
            source_id                         TEXT,
            license_url                       TEXT,
            creator                           TEXT,
            last_seen                         REAL,
            minimum_unknown_frequency         REAL,
            id_for_minimum_unknown_frequency  INTEGER
        );

        CREATE TABLE IF NOT EXISTS lemma (
            id            INTEGER PRIMARY KEY,
            text          TEXT NOT NULL,
            disambiguator TEXT NOT NULL,
            frequency     REAL NOT NULL DEFAULT 0,
            last_refresh  REAL,
            last_relearn  REAL,
            UNIQUE (text, disambiguator)
        );

        CREATE TABLE IF NOT EXISTS grammar (
            id            INTEGER PRIMARY KEY,
            form          TEXT NOT NULL UNIQUE,
            frequency     REAL NOT NULL DEFAULT 0,
            last_refresh  REAL,
            last_relearn  REAL
        );

        CREATE TABLE IF NOT EXISTS grapheme (
            id            INTEGER PRIMARY KEY,
            text          TEXT NOT NULL UNIQUE,
            frequency     REAL NOT NULL DEFAULT 0,
            last_refresh  REAL,
            last_relearn  REAL
        );

        CREATE TABLE IF NOT EXISTS pronunciation (
            id                    INTEGER PRIMARY KEY,
            word                  TEXT NOT NULL,
            pronunciation         TEXT NOT NULL,
            frequency             REAL NOT NULL DEFAULT 0,
            forward_last_refresh  REAL,
            forward_last_relearn  REAL,
            backward_last_refresh REAL,
            backward_last_relearn REAL,
            UNIQUE (word, pronunciation)
        );

        CREATE TABLE IF NOT EXISTS sound (
            id            INTEGER PRIMARY KEY,
            text          TEXT NOT NULL UNIQUE,
            frequency     REAL NOT NULL DEFAULT 0,
            last_refresh  REAL,
            last_relearn  REAL
        );

        CREATE TABLE IF NOT EXISTS sentence_lemma (
            sentence_id INTEGER NOT NULL REFERENCES sentence(id),
            lemma_id    INTEGER NOT NULL REFERENCES lemma(id),
            position    INTEGER NOT NULL DEFAULT 0,
            UNIQUE (sentence_id, lemma_id)
        );

        CREATE TABLE IF NOT EXISTS sentence_grammar (
            sentence_id INTEGER NOT NULL REFERENCES sentence(id),
            grammar_id  INTEGER NOT NULL REFERENCES grammar(id),
            position    INTEGER NOT NULL DEFAULT 0,
            UNIQUE (sentence_id, grammar_id)
        );

        CREATE TABLE IF NOT EXISTS sentence_grapheme (
            sentence_id INTEGER NOT NULL REFERENCES sentence(id),
            grapheme_id INTEGER NOT NULL REFERENCES grapheme(id),
            position    INTEGER NOT NULL DEFAULT 0,
            UNIQUE (sentence_id, grapheme_id)
        );

        CREATE TABLE IF NOT EXISTS sentence_pronunciation (
            sentence_id      INTEGER NOT NULL REFERENCES sentence(id),
            pronunciation_id INTEGER NOT NULL REFERENCES pronunciation(id),
            position         INTEGER NOT NULL DEFAULT 0,
            UNIQUE (sentence_id, pronunciation_id)
        );

        CREATE TABLE IF NOT EXISTS sentence_sound (
            sentence_id INTEGER NOT NULL REFERENCES sentence(id),
            sound_id    INTEGER NOT NULL REFERENCES sound(id),
            position    INTEGER NOT NULL DEFAULT 0,
            UNIQUE (sentence_id, sound_id)
        );

        CREATE TABLE IF NOT EXISTS totals (
            id                  INTEGER PRIMARY KEY CHECK (id = 0),
            lemma_total         REAL NOT NULL DEFAULT 0,
            grammar_total       REAL NOT NULL DEFAULT 0,
            grapheme_total      REAL NOT NULL DEFAULT 0,
            pronunciation_total REAL NOT NULL DEFAULT 0,
            sound_total         REAL NOT NULL DEFAULT 0
        );
        INSERT OR IGNORE INTO totals (id) VALUES (0);

        CREATE TABLE IF NOT EXISTS review (
            sentence_id INTEGER NOT NULL REFERENCES sentence(id),
            review_type INTEGER NOT NULL,
            UNIQUE (sentence_id, review_type)
        );

        CREATE TABLE IF NOT EXISTS log (
            id                       INTEGER PRIMARY KEY,
            atom_kind                INTEGER NOT NULL,
            direction                INTEGER,
            frequency                REAL NOT NULL,
            time_since_last_refresh  REAL NOT NULL,
            time_since_last_relearn  REAL NOT NULL,
            remembered               INTEGER NOT NULL
        );

        -- Currently unknown atoms per sentence. `packed` is the persisted
        -- identifier format: atom_id * 6 + slot, slots being lemma=0,
        -- grammar=1, grapheme=2, pronunciation forward=3 / backward=4,
        -- sound=5.
        CREATE VIEW IF NOT EXISTS unknown_atom (sentence_id, frequency, packed) AS
        SELECT sentence_lemma.sentence_id, lemma.frequency, lemma.id * 6 + 0
          FROM sentence_lemma JOIN lemma ON lemma.id = sentence_lemma.lemma_id
         WHERE lemma.last_relearn IS NULL
        UNION ALL
        SELECT sentence_grammar.sentence_id, grammar.frequency, grammar.id * 6 + 1
          FROM sentence_grammar JOIN grammar ON grammar.id = sentence_grammar.grammar_id
         WHERE grammar.last_relearn IS NULL
        UNION ALL
        SELECT sentence_grapheme.sentence_id, grapheme.frequency, grapheme.id * 6 + 2
          FROM sentence_grapheme JOIN grapheme ON grapheme.id = sentence_grapheme.grapheme_id
         WHERE grapheme.last_relearn IS NULL
        UNION ALL
        SELECT sentence_pronunciation.sentence_id, pronunciation.frequency,
               pronunciation.id * 6 + 3
          FROM sentence_pronunciation
          JOIN pronunciation ON pronunciation.id = sentence_pronunciation.pronunciation_id
         WHERE pronunciation.forward_last_relearn IS NULL
        UNION ALL
        SELECT sentence_pronunciation.sentence_id, pronunciation.frequency,
               pronunciation.id * 6 + 4
          FROM sentence_pronunciation
          JOIN pronunciation ON pronunciation.id = sentence_pronunciation.pronunciation_id
         WHERE pronunciation.backward_last_relearn IS NULL
        UNION ALL
        SELECT sentence_sound.sentence_id, sound.frequency, sound.id * 6 + 5
          FROM sentence_sound JOIN sound ON sound.id = sentence_sound.sound_id
         WHERE sound.last_relearn IS NULL;

        CREATE INDEX IF NOT EXISTS idx_sentence_lemma_sentence ON sentence_lemma(sentence_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_lemma_lemma ON sentence_lemma(lemma_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_grammar_sentence ON sentence_grammar(sentence_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_grammar_grammar ON sentence_grammar(grammar_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_grapheme_sentence ON sentence_grapheme(sentence_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_grapheme_grapheme ON sentence_grapheme(grapheme_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_pronunciation_sentence ON sentence_pronunciation(sentence_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_pronunciation_pronunciation ON sentence_pronunciation(pronunciation_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_sound_sentence ON sentence_sound(sentence_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_sound_sound ON sentence_sound(sound_id);
        CREATE INDEX IF NOT EXISTS idx_sentence_min_unknown ON sentence(id_for_minimum_unknown_frequency);
        CREATE INDEX IF NOT EXISTS idx_review_sentence ON review(sentence_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

/// Verify the SQLite build supports tuple-assignment UPDATE
/// (`UPDATE t SET (a, b) = (SELECT ...)`), which the minimum-unknown
/// propagation relies on. Available since SQLite 3.15.
pub fn probe_tuple_assignment(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TEMP TABLE tuple_probe (a INTEGER, b INTEGER);
         INSERT INTO tuple_probe VALUES (0, 0);",
    )?;
    let probe = conn.execute_batch("UPDATE tuple_probe SET (a, b) = (SELECT 1, 2);");
    conn.execute_batch("DROP TABLE tuple_probe;")?;
    probe.map_err(|_| {
        StoreError::Unsupported(
            "tuple-assignment UPDATE is unavailable; SQLite 3.15 or newer is required".to_string(),
        )
    })
}
