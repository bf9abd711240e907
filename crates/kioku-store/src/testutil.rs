//! Shared fixtures for store tests.

use kioku_core::tokenizer::{SentenceRecord, SourceMeta, Token};

pub fn token(
    surface: &str,
    base: &str,
    disambiguator: &str,
    grammar: Option<&str>,
    pronunciation: Option<&str>,
) -> Token {
    Token {
        surface: surface.to_string(),
        base: base.to_string(),
        disambiguator: disambiguator.to_string(),
        grammar: grammar.map(str::to_string),
        pronunciation: pronunciation.map(str::to_string),
    }
}

pub fn record_from(text: &str, tokens: Vec<Token>) -> SentenceRecord {
    SentenceRecord::assemble(SourceMeta::default(), text.to_string(), tokens).unwrap()
}

pub fn record_with_source(text: &str, tokens: Vec<Token>, database: &str) -> SentenceRecord {
    SentenceRecord::assemble(
        SourceMeta {
            database: Some(database.to_string()),
            ..SourceMeta::default()
        },
        text.to_string(),
        tokens,
    )
    .unwrap()
}

/// 猫が鳴く — noun, particle, godan verb.
pub fn cat_record() -> SentenceRecord {
    record_from(
        "猫が鳴く",
        vec![
            token("猫", "猫", "名詞,一般", None, Some("ネコ")),
            token("が", "が", "助詞,格助詞", None, Some("ガ")),
            token("鳴く", "鳴く", "動詞,自立", Some("v5k,終止形"), Some("ナク")),
        ],
    )
}
