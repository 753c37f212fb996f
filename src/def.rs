//! Reserved vocabulary ids and default hyperparameters.

/// Sentence-boundary ids, reserved in both the word and stem vocabularies.
pub const START: usize = 0;
pub const STOP: usize = 1;
/// Fallback stem for decoding words whose stem is out of vocabulary.
pub const UNK_STEM: usize = 2;
/// The stem placeholder inside a pattern, always morpheme id 0.
pub const STEM: usize = 0;
/// The single-placeholder pattern `[STEM]`, always pattern id 0.
pub const TRIVIAL_PATTERN: usize = 0;

pub const START_WORD: &str = "<s>";
pub const STOP_WORD: &str = "</s>";
pub const UNK_WORD: &str = "<unk>";
pub const STEM_MORPH: &str = "stem";

// Main PYP
pub const INITIAL_THETA: f64 = 1.0;
pub const INITIAL_D: f64 = 0.8;
// Stem PYP
pub const STEM_THETA: f64 = 1.0;
pub const STEM_D: f64 = 0.8;
// Pattern PYP
pub const PATTERN_THETA: f64 = 1.0;
pub const PATTERN_D: f64 = 0.8;
// Morpheme prior
pub const MORPHEME_PRIOR: f64 = 1.0;
// Length prior
pub const LENGTH_SHAPE: f64 = 1.0;
pub const LENGTH_RATE: f64 = 1.0;
