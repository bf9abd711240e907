//! Gloss lookup against the external dictionary database
//! (`entry` + `gloss` tables produced by the JMdict converter).

use std::path::Path;

use anyhow::{Result, bail};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

pub struct Dictionary {
    conn: Connection,
}

impl Dictionary {
    /// Open the dictionary read-only. A missing file is fatal for the
    /// commands that present glosses.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("dictionary database missing: {}", path.display());
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Gloss for a lemma, trying each language in preference order.
    /// Entries whose part of speech matches the disambiguator win; a gloss
    /// under any other part of speech is still better than nothing.
    pub fn gloss(&self, lemma: &str, disambiguator: &str, languages: &[String]) -> Option<String> {
        for lang in languages {
            match self.lookup(lemma, disambiguator, lang) {
                Ok(Some(gloss)) => return Some(gloss),
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("gloss lookup failed for {lemma}: {e}");
                    return None;
                }
            }
        }
        None
    }

    fn lookup(
        &self,
        lemma: &str,
        disambiguator: &str,
        lang: &str,
    ) -> rusqlite::Result<Option<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT g.gloss FROM entry e \
               JOIN gloss g ON g.ent_seq = e.ent_seq AND g.variant = e.variant \
              WHERE e.lemma = ?1 AND g.lang = ?2 \
              ORDER BY CASE WHEN e.pos = ?3 THEN 0 ELSE 1 END, e.variant \
              LIMIT 1",
        )?;
        stmt.query_row(params![lemma, lang, disambiguator], |row| row.get(0))
            .optional()
    }
}
