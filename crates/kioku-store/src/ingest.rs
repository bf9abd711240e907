//! Transactional ingestion of analyzed sentence records.

use std::collections::HashSet;

use kioku_core::atom::AtomKind;
use kioku_core::tokenizer::{AtomKey, SentenceRecord};

use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    pub sentences: u64,
    pub duplicates: u64,
    pub links: u64,
}

/// Record-at-a-time ingester. Each record commits atomically; call
/// [`Ingestor::finish`] once the stream ends to refresh totals and the
/// per-sentence minimum-unknown state.
pub struct Ingestor<'a> {
    store: &'a Store,
    stats: IngestStats,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            stats: IngestStats::default(),
        }
    }

    /// Ingest one record. Returns false when the sentence text already
    /// existed, in which case no atom work happens — re-ingesting a stream
    /// is a no-op.
    pub fn ingest(&mut self, record: &SentenceRecord) -> Result<bool> {
        let tx = self.store.conn().unchecked_transaction()?;
        let (sentence_id, created) = self.store.upsert_sentence(
            &record.text,
            &record.segmented_text(),
            &record.pronunciation_text(),
            &record.meta,
        )?;
        if !created {
            tx.commit()?;
            self.stats.duplicates += 1;
            tracing::debug!("duplicate sentence skipped: {}", record.text);
            return Ok(false);
        }

        // Atoms repeated within one sentence count once; keep the first
        // occurrence position.
        let mut seen: HashSet<AtomKey> = HashSet::new();
        for (position, key) in record.atoms().into_iter().enumerate() {
            if !seen.insert(key.clone()) {
                continue;
            }
            let atom_id = self.store.upsert_atom(&key)?;
            if self
                .store
                .link(sentence_id, key.kind(), atom_id, position as i64)?
            {
                self.stats.links += 1;
            }
        }
        tx.commit()?;
        self.stats.sentences += 1;
        Ok(true)
    }

    /// Close the stream: refresh per-kind totals and recompute
    /// `minimum_unknown_frequency` and review membership store-wide.
    pub fn finish(self) -> Result<IngestStats> {
        for kind in AtomKind::ALL {
            self.store.recompute_totals(kind)?;
        }
        self.store.recompute_all_min_unknown()?;
        tracing::info!(
            "ingested {} sentences ({} duplicates, {} links)",
            self.stats.sentences,
            self.stats.duplicates,
            self.stats.links
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kioku_core::atom::SLOT_COUNT;

    use crate::testutil::{cat_record, record_from, token};

    fn atom_frequency(store: &Store, table: &str, key: &str) -> f64 {
        let column = match table {
            "grammar" => "form",
            _ => "text",
        };
        store
            .conn()
            .query_row(
                &format!("SELECT frequency FROM {table} WHERE {column} = ?1"),
                [key],
                |row| row.get(0),
            )
            .unwrap()
    }

    /// Ingesting 猫が鳴く: every atom at frequency 1, minimum unknown
    /// frequency 1, review queue empty.
    #[test]
    fn test_single_sentence_three_atoms() {
        let store = Store::open_in_memory().unwrap();
        let mut ingestor = Ingestor::new(&store);
        assert!(ingestor.ingest(&cat_record()).unwrap());
        ingestor.finish().unwrap();

        assert_eq!(atom_frequency(&store, "lemma", "猫"), 1.0);
        assert_eq!(atom_frequency(&store, "lemma", "鳴く"), 1.0);
        assert_eq!(atom_frequency(&store, "grammar", "v5k,終止形"), 1.0);

        let sentence = store.sentence_by_text("猫が鳴く").unwrap().unwrap();
        assert_eq!(sentence.minimum_unknown_frequency, Some(1.0));
        assert!(sentence.id_for_minimum_unknown_frequency.is_some());
        assert!(store.review_entries().unwrap().is_empty());
    }

    #[test]
    fn test_reingest_is_noop() {
        let store = Store::open_in_memory().unwrap();
        let mut ingestor = Ingestor::new(&store);
        ingestor.ingest(&cat_record()).unwrap();
        let stats = ingestor.finish().unwrap();
        let links_before = stats.links;

        let mut ingestor = Ingestor::new(&store);
        assert!(!ingestor.ingest(&cat_record()).unwrap());
        let stats = ingestor.finish().unwrap();
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.links, 0);

        assert_eq!(store.total_sentences().unwrap(), 1);
        assert_eq!(atom_frequency(&store, "lemma", "猫"), 1.0);
        let total_links: i64 = store
            .conn()
            .query_row(
                "SELECT (SELECT COUNT(*) FROM sentence_lemma) \
                      + (SELECT COUNT(*) FROM sentence_grammar) \
                      + (SELECT COUNT(*) FROM sentence_grapheme) \
                      + (SELECT COUNT(*) FROM sentence_pronunciation) \
                      + (SELECT COUNT(*) FROM sentence_sound)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(total_links as u64, links_before);
    }

    #[test]
    fn test_repeated_atom_counts_once_per_sentence() {
        let store = Store::open_in_memory().unwrap();
        let mut ingestor = Ingestor::new(&store);
        // 猫猫 — the lemma, grapheme, pronunciation and sound atoms all
        // appear twice within the single sentence.
        let record = record_from(
            "猫猫",
            vec![token("猫", "猫", "名詞,一般", None, Some("ネコ")); 2],
        );
        ingestor.ingest(&record).unwrap();
        ingestor.finish().unwrap();

        assert_eq!(atom_frequency(&store, "lemma", "猫"), 1.0);
        assert_eq!(atom_frequency(&store, "grapheme", "猫"), 1.0);
        assert_eq!(atom_frequency(&store, "sound", "ネ"), 1.0);
    }

    #[test]
    fn test_frequency_accumulates_across_sentences() {
        let store = Store::open_in_memory().unwrap();
        let mut ingestor = Ingestor::new(&store);
        ingestor.ingest(&cat_record()).unwrap();
        ingestor
            .ingest(&record_from(
                "猫だ",
                vec![
                    token("猫", "猫", "名詞,一般", None, Some("ネコ")),
                    token("だ", "だ", "助動詞,*", Some("特殊・ダ,基本形"), Some("ダ")),
                ],
            ))
            .unwrap();
        ingestor.finish().unwrap();

        assert_eq!(atom_frequency(&store, "lemma", "猫"), 2.0);
        assert_eq!(atom_frequency(&store, "lemma", "鳴く"), 1.0);
    }

    /// Totals invariant: after recompute, each kind total equals the sum
    /// of its atoms' frequencies.
    #[test]
    fn test_totals_match_frequency_sums() {
        let store = Store::open_in_memory().unwrap();
        let mut ingestor = Ingestor::new(&store);
        ingestor.ingest(&cat_record()).unwrap();
        ingestor
            .ingest(&record_from(
                "猫だ",
                vec![
                    token("猫", "猫", "名詞,一般", None, Some("ネコ")),
                    token("だ", "だ", "助動詞,*", Some("特殊・ダ,基本形"), Some("ダ")),
                ],
            ))
            .unwrap();
        ingestor.finish().unwrap();

        let totals = store.totals().unwrap();
        for kind in AtomKind::ALL {
            let spec_table = match kind {
                AtomKind::Lemma => "lemma",
                AtomKind::Grammar => "grammar",
                AtomKind::Grapheme => "grapheme",
                AtomKind::Pronunciation => "pronunciation",
                AtomKind::Sound => "sound",
            };
            let sum: f64 = store
                .conn()
                .query_row(
                    &format!("SELECT COALESCE(SUM(frequency), 0) FROM {spec_table}"),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(totals.get(kind), sum, "totals mismatch for {kind}");
        }
    }

    #[test]
    fn test_min_unknown_points_at_linked_atom() {
        let store = Store::open_in_memory().unwrap();
        let mut ingestor = Ingestor::new(&store);
        ingestor.ingest(&cat_record()).unwrap();
        ingestor.finish().unwrap();

        let sentence = store.sentence_by_text("猫が鳴く").unwrap().unwrap();
        let packed = sentence.id_for_minimum_unknown_frequency.unwrap();
        let (atom_id, slot) = kioku_core::unpack_atom_id(packed).unwrap();
        // The packed target resolves to a real atom of that kind.
        assert!(store.atom_key(slot.kind(), atom_id).is_ok());
        assert_eq!(packed % SLOT_COUNT, slot.index());
    }
}
