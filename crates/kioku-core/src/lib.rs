//! Sentence memory engine: pure scheduling math and analyzer parsing.
//!
//! Sentences decompose into memory atoms (lemmas, grammar forms, graphemes,
//! directional pronunciations, sounds). Each atom slot carries a nullable
//! `(last_refresh, last_relearn)` pair driving a forgetting curve, a review
//! utility, and a next-refresh time.
//!
//! Zero I/O — persistence and queries live in `kioku-store`, subprocess and
//! terminal handling in `kioku-cli`.

pub mod atom;
pub mod memory;
pub mod select;
pub mod solver;
pub mod time;
pub mod tokenizer;

pub use atom::{
    AtomKind, AtomSlot, Direction, ReviewType, SLOT_COUNT, pack_atom_id, unpack_atom_id,
};
pub use memory::{
    MemoryConfig, MemoryState, RELEARN_GRACE_DAYS, ReviewOutcome, TouchMode, forgetting_curve,
    learn_value,
};
pub use select::{novelty, rank_candidates};
pub use solver::{CsrMatrix, SolveError, SolveOptions, least_squares};
pub use time::{days_to_iso8601, format_duration_days, now_days};
pub use tokenizer::{
    AtomKey, END_OF_SENTENCE, SentenceRecord, SourceMeta, Token, TokenizeError, UNKNOWN_FIELD,
    parse_analysis_line, strip_furigana, token_atoms,
};
