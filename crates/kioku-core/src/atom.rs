use serde::{Deserialize, Serialize};

/// Number of memory slots in the packed-identifier encoding.
/// Part of the on-disk format: `sentence.id_for_minimum_unknown_frequency`
/// stores `atom_id * SLOT_COUNT + slot_index`.
pub const SLOT_COUNT: i64 = 6;

/// The five structural kinds of memory atoms a sentence decomposes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomKind {
    /// Dictionary form of a word, disambiguated by part of speech.
    Lemma,
    /// A conjugation/inflection form.
    Grammar,
    /// A single written character.
    Grapheme,
    /// A word paired with its reading. Carries two memory slots.
    Pronunciation,
    /// A single phonetic character.
    Sound,
}

impl AtomKind {
    pub const ALL: [AtomKind; 5] = [
        AtomKind::Lemma,
        AtomKind::Grammar,
        AtomKind::Grapheme,
        AtomKind::Pronunciation,
        AtomKind::Sound,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AtomKind::Lemma => "lemma",
            AtomKind::Grammar => "grammar",
            AtomKind::Grapheme => "grapheme",
            AtomKind::Pronunciation => "pronunciation",
            AtomKind::Sound => "sound",
        }
    }

    pub fn code(self) -> i64 {
        match self {
            AtomKind::Lemma => 0,
            AtomKind::Grammar => 1,
            AtomKind::Grapheme => 2,
            AtomKind::Pronunciation => 3,
            AtomKind::Sound => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AtomKind::Lemma),
            1 => Some(AtomKind::Grammar),
            2 => Some(AtomKind::Grapheme),
            3 => Some(AtomKind::Pronunciation),
            4 => Some(AtomKind::Sound),
            _ => None,
        }
    }
}

impl std::fmt::Display for AtomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recall direction for pronunciation atoms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Writing → reading.
    Forward,
    /// Reading → writing.
    Backward,
}

impl Direction {
    pub fn code(self) -> i64 {
        match self {
            Direction::Forward => 0,
            Direction::Backward => 1,
        }
    }
}

/// A memory slot: an atom kind, split by direction for pronunciations.
///
/// Every slot owns an independent `(last_refresh, last_relearn)` pair.
/// Slot indices are persisted inside packed identifiers and must not be
/// reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomSlot {
    Lemma,
    Grammar,
    Grapheme,
    PronunciationForward,
    PronunciationBackward,
    Sound,
}

impl AtomSlot {
    pub const ALL: [AtomSlot; 6] = [
        AtomSlot::Lemma,
        AtomSlot::Grammar,
        AtomSlot::Grapheme,
        AtomSlot::PronunciationForward,
        AtomSlot::PronunciationBackward,
        AtomSlot::Sound,
    ];

    pub fn index(self) -> i64 {
        match self {
            AtomSlot::Lemma => 0,
            AtomSlot::Grammar => 1,
            AtomSlot::Grapheme => 2,
            AtomSlot::PronunciationForward => 3,
            AtomSlot::PronunciationBackward => 4,
            AtomSlot::Sound => 5,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(AtomSlot::Lemma),
            1 => Some(AtomSlot::Grammar),
            2 => Some(AtomSlot::Grapheme),
            3 => Some(AtomSlot::PronunciationForward),
            4 => Some(AtomSlot::PronunciationBackward),
            5 => Some(AtomSlot::Sound),
            _ => None,
        }
    }

    pub fn kind(self) -> AtomKind {
        match self {
            AtomSlot::Lemma => AtomKind::Lemma,
            AtomSlot::Grammar => AtomKind::Grammar,
            AtomSlot::Grapheme => AtomKind::Grapheme,
            AtomSlot::PronunciationForward | AtomSlot::PronunciationBackward => {
                AtomKind::Pronunciation
            }
            AtomSlot::Sound => AtomKind::Sound,
        }
    }

    /// Direction within the kind; only pronunciations are directional.
    pub fn direction(self) -> Option<Direction> {
        match self {
            AtomSlot::PronunciationForward => Some(Direction::Forward),
            AtomSlot::PronunciationBackward => Some(Direction::Backward),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AtomSlot::Lemma => "lemma",
            AtomSlot::Grammar => "grammar",
            AtomSlot::Grapheme => "grapheme",
            AtomSlot::PronunciationForward => "pronunciation→",
            AtomSlot::PronunciationBackward => "pronunciation←",
            AtomSlot::Sound => "sound",
        }
    }
}

/// Pack an atom row id and its slot into the persisted identifier.
pub fn pack_atom_id(atom_id: i64, slot: AtomSlot) -> i64 {
    atom_id * SLOT_COUNT + slot.index()
}

/// Inverse of [`pack_atom_id`]. Negative inputs are malformed.
pub fn unpack_atom_id(packed: i64) -> Option<(i64, AtomSlot)> {
    if packed < 0 {
        return None;
    }
    let slot = AtomSlot::from_index(packed.rem_euclid(SLOT_COUNT))?;
    Some((packed / SLOT_COUNT, slot))
}

/// A directional review modality. Each type names the slots it exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    /// Show the written sentence, recall its pronunciation.
    WritingToPronunciation,
    /// Show the pronunciation, recall the writing.
    PronunciationToWriting,
}

impl ReviewType {
    pub const ALL: [ReviewType; 2] = [
        ReviewType::WritingToPronunciation,
        ReviewType::PronunciationToWriting,
    ];

    pub fn code(self) -> i64 {
        match self {
            ReviewType::WritingToPronunciation => 0,
            ReviewType::PronunciationToWriting => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ReviewType::WritingToPronunciation),
            1 => Some(ReviewType::PronunciationToWriting),
            _ => None,
        }
    }

    /// Slots a review of this type exercises. Lemma and grammar knowledge is
    /// required on both sides; graphemes belong to the reading direction and
    /// sounds to the writing direction, matching what the learner produces.
    pub fn slots(self) -> &'static [AtomSlot] {
        match self {
            ReviewType::WritingToPronunciation => &[
                AtomSlot::Lemma,
                AtomSlot::Grammar,
                AtomSlot::Grapheme,
                AtomSlot::PronunciationForward,
            ],
            ReviewType::PronunciationToWriting => &[
                AtomSlot::Lemma,
                AtomSlot::Grammar,
                AtomSlot::Sound,
                AtomSlot::PronunciationBackward,
            ],
        }
    }

    pub fn includes(self, slot: AtomSlot) -> bool {
        self.slots().contains(&slot)
    }

    /// Review types that exercise the given slot.
    pub fn types_for(slot: AtomSlot) -> Vec<ReviewType> {
        ReviewType::ALL
            .into_iter()
            .filter(|t| t.includes(slot))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewType::WritingToPronunciation => "writing→pronunciation",
            ReviewType::PronunciationToWriting => "pronunciation→writing",
        }
    }
}

impl std::fmt::Display for ReviewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
