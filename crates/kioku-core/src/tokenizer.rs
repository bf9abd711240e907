//! Parsing of external morphological-analyzer output.
//!
//! The analyzer itself is a separate process (see the CLI crate); this
//! module turns its line protocol into [`SentenceRecord`]s and decomposes
//! tokens into atom keys. One input sentence produces tab-separated lines
//! `surface\tpos1,pos2,pos3,pos4,conjugation,form,base,pronunciation`
//! terminated by `EOS`, with `*` marking unknown fields.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::atom::AtomKind;

static FURIGANA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^|\[\]]*)\|[^\[\]]*\]").unwrap());

/// Unknown-field marker in analyzer output.
pub const UNKNOWN_FIELD: &str = "*";

/// Sentinel terminating one sentence's worth of analyzer output.
pub const END_OF_SENTENCE: &str = "EOS";

const ANALYSIS_FIELDS: usize = 8;

/// Strip `[ruby|reading]` furigana notation, keeping the ruby text.
/// Applied to raw sentences before they are fed to the analyzer.
pub fn strip_furigana(text: &str) -> String {
    FURIGANA.replace_all(text, "$1").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    /// An analyzer line did not match the expected field layout.
    MalformedLine(String),
    /// Concatenated surfaces did not reproduce the input sentence.
    Mismatch { expected: String, analyzed: String },
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenizeError::MalformedLine(line) => {
                write!(f, "malformed analyzer line: {line:?}")
            }
            TokenizeError::Mismatch { expected, analyzed } => write!(
                f,
                "analyzer output {analyzed:?} does not reconstruct input {expected:?}"
            ),
        }
    }
}

impl std::error::Error for TokenizeError {}

/// One analyzed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub surface: String,
    /// Dictionary form; falls back to the surface for unknown words.
    pub base: String,
    /// Part-of-speech pair distinguishing homograph lemmas.
    pub disambiguator: String,
    /// Conjugation class and form, `None` for non-conjugating tokens.
    pub grammar: Option<String>,
    /// Phonetic rendering, `None` when the analyzer does not know it.
    pub pronunciation: Option<String>,
}

/// Parse one analyzer output line.
pub fn parse_analysis_line(line: &str) -> Result<Token, TokenizeError> {
    let (surface, analysis) = line
        .split_once('\t')
        .ok_or_else(|| TokenizeError::MalformedLine(line.to_string()))?;
    let fields: Vec<&str> = analysis.split(',').collect();
    if fields.len() != ANALYSIS_FIELDS || surface.is_empty() {
        return Err(TokenizeError::MalformedLine(line.to_string()));
    }

    let disambiguator = format!("{},{}", fields[0], fields[1]);
    let grammar = if fields[4] == UNKNOWN_FIELD && fields[5] == UNKNOWN_FIELD {
        None
    } else {
        Some(format!("{},{}", fields[4], fields[5]))
    };
    let base = if fields[6] == UNKNOWN_FIELD {
        surface.to_string()
    } else {
        fields[6].to_string()
    };
    let pronunciation = if fields[7] == UNKNOWN_FIELD {
        None
    } else {
        Some(fields[7].to_string())
    };

    Ok(Token {
        surface: surface.to_string(),
        base,
        disambiguator,
        grammar,
        pronunciation,
    })
}

/// Provenance of a sentence, carried through to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub database: Option<String>,
    pub url: Option<String>,
    pub id: Option<String>,
    pub license: Option<String>,
    pub creator: Option<String>,
}

/// A fully analyzed sentence ready for ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub meta: SourceMeta,
    /// The raw sentence, furigana already stripped.
    pub text: String,
    pub tokens: Vec<Token>,
}

impl SentenceRecord {
    /// Reconcile analyzer output with the input sentence: the concatenated
    /// surfaces must reproduce it exactly.
    pub fn assemble(
        meta: SourceMeta,
        text: String,
        tokens: Vec<Token>,
    ) -> Result<Self, TokenizeError> {
        let analyzed: String = tokens.iter().map(|t| t.surface.as_str()).collect();
        if analyzed != text {
            return Err(TokenizeError::Mismatch {
                expected: text,
                analyzed,
            });
        }
        Ok(Self { meta, text, tokens })
    }

    /// Space-joined surface tokens.
    pub fn segmented_text(&self) -> String {
        let surfaces: Vec<&str> = self.tokens.iter().map(|t| t.surface.as_str()).collect();
        surfaces.join(" ")
    }

    /// Space-joined phonetic tokens, aligned with [`Self::segmented_text`].
    /// Tokens without a known pronunciation fall back to their surface.
    pub fn pronunciation_text(&self) -> String {
        let sounds: Vec<&str> = self
            .tokens
            .iter()
            .map(|t| t.pronunciation.as_deref().unwrap_or(t.surface.as_str()))
            .collect();
        sounds.join(" ")
    }

    /// All atom keys of the sentence in positional occurrence order.
    /// Repeats are kept; link uniqueness in the store collapses them.
    pub fn atoms(&self) -> Vec<AtomKey> {
        self.tokens.iter().flat_map(token_atoms).collect()
    }
}

/// Natural key of an atom, by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum AtomKey {
    Lemma { text: String, disambiguator: String },
    Grammar { form: String },
    Grapheme { text: String },
    Pronunciation { word: String, pronunciation: String },
    Sound { text: String },
}

impl AtomKey {
    pub fn kind(&self) -> AtomKind {
        match self {
            AtomKey::Lemma { .. } => AtomKind::Lemma,
            AtomKey::Grammar { .. } => AtomKind::Grammar,
            AtomKey::Grapheme { .. } => AtomKind::Grapheme,
            AtomKey::Pronunciation { .. } => AtomKind::Pronunciation,
            AtomKey::Sound { .. } => AtomKind::Sound,
        }
    }

    /// Human-readable key, for breakdown output.
    pub fn label(&self) -> String {
        match self {
            AtomKey::Lemma {
                text,
                disambiguator,
            } => format!("{text} ({disambiguator})"),
            AtomKey::Grammar { form } => form.clone(),
            AtomKey::Grapheme { text } => text.clone(),
            AtomKey::Pronunciation {
                word,
                pronunciation,
            } => format!("{word} [{pronunciation}]"),
            AtomKey::Sound { text } => text.clone(),
        }
    }
}

/// Decompose one token into its atom keys, in positional order.
pub fn token_atoms(token: &Token) -> Vec<AtomKey> {
    let mut atoms = Vec::new();
    atoms.push(AtomKey::Lemma {
        text: token.base.clone(),
        disambiguator: token.disambiguator.clone(),
    });
    if let Some(form) = &token.grammar {
        atoms.push(AtomKey::Grammar { form: form.clone() });
    }
    if let Some(pronunciation) = &token.pronunciation {
        atoms.push(AtomKey::Pronunciation {
            word: token.surface.clone(),
            pronunciation: pronunciation.clone(),
        });
        for ch in pronunciation.chars() {
            atoms.push(AtomKey::Sound {
                text: ch.to_string(),
            });
        }
    }
    for ch in token.surface.chars() {
        atoms.push(AtomKey::Grapheme {
            text: ch.to_string(),
        });
    }
    atoms
}
