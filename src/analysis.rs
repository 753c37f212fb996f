//! Consuming the morphological analyzer's output.
//!
//! An analysis string is a `+`-delimited concatenation of exactly one stem
//! token and zero or more capitalized morpheme tags, e.g.
//! `oku+Prog+Pst+A3sg`. The analyzer itself is external; this module maps
//! its strings onto interned ids and keeps one cached candidate list per
//! word type.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::corpus::{Corpus, Vocabulary};
use crate::def::{
    START, START_WORD, STEM, STEM_MORPH, STOP, STOP_WORD, TRIVIAL_PATTERN, UNK_STEM, UNK_WORD,
};
use crate::error::{AnalysisError, Error};
use crate::pattern::PatternSet;

/// One candidate decomposition of a word: a stem id and an interned pattern
/// holding the morpheme sequence with the STEM placeholder in stem position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub stem: usize,
    pub pattern: usize,
}

/// External morphological analyzer, consumed as an opaque function from a
/// word to its candidate analysis strings.
pub trait Analyzer {
    fn get_analyses(&self, word: &str) -> Vec<String>;
}

/// Treats every word as its own single-stem analysis. Stands in for the
/// analyzer when none is configured.
#[derive(Debug, Default)]
pub struct PassthroughAnalyzer;

impl Analyzer for PassthroughAnalyzer {
    fn get_analyses(&self, word: &str) -> Vec<String> {
        vec![word.replace('+', "#")]
    }
}

/// Precomputed analyzer output: one line per word, tab-separated, the word
/// first and its candidate analyses after it.
#[derive(Debug)]
pub struct TsvAnalyzer {
    table: HashMap<String, Vec<String>>,
    word_re: Regex,
}

impl TsvAnalyzer {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let mut table = HashMap::new();
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t').map(str::to_string);
            let word = fields
                .next()
                .filter(|w| !w.is_empty())
                .ok_or_else(|| Error::BadTableLine(line.clone()))?;
            let analyses: Vec<String> = fields.filter(|a| !a.is_empty()).collect();
            table.insert(word, analyses);
        }
        Ok(Self::from_table(table))
    }

    pub fn from_table(table: HashMap<String, Vec<String>>) -> Self {
        Self {
            table,
            word_re: Regex::new(r"^\p{L}+$").expect("valid word pattern"),
        }
    }
}

impl Analyzer for TsvAnalyzer {
    fn get_analyses(&self, word: &str) -> Vec<String> {
        let word = word.replace('+', "#");
        // Only alphabetic words longer than three characters are worth
        // sending through morphology; everything else stands for itself.
        if word.chars().count() > 3 && self.word_re.is_match(&word) {
            match self.table.get(&word) {
                Some(analyses) if !analyses.is_empty() => return analyses.clone(),
                _ => {}
            }
        }
        vec![word]
    }
}

enum Tok<'a> {
    Stem(&'a str),
    Morph(&'a str),
}

fn is_morph(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_uppercase())
}

fn tokenize(raw: &str) -> Result<Vec<Tok>, AnalysisError> {
    let mut toks = Vec::new();
    let mut seen_stem = false;
    for piece in raw.split('+').filter(|p| !p.is_empty()) {
        if is_morph(piece) {
            toks.push(Tok::Morph(piece));
        } else {
            if seen_stem {
                return Err(AnalysisError::ExtraStem(raw.to_string()));
            }
            seen_stem = true;
            toks.push(Tok::Stem(piece));
        }
    }
    if !seen_stem {
        return Err(AnalysisError::NoStem(raw.to_string()));
    }
    Ok(toks)
}

/// The model-facing view of the analyzed vocabulary: interning tables for
/// words, stems and morphemes, the pattern set, and one candidate-analysis
/// list per word type. Built unfrozen during corpus reading, then frozen for
/// the lifetime of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    pub words: Vocabulary,
    pub stems: Vocabulary,
    pub morphemes: Vocabulary,
    pub patterns: PatternSet,
    pub analyses: Vec<Vec<Analysis>>,
}

impl Lexicon {
    pub fn new() -> Self {
        let mut lex = Self {
            words: Vocabulary::with_reserved(&[START_WORD, STOP_WORD]),
            stems: Vocabulary::with_reserved(&[START_WORD, STOP_WORD, UNK_WORD]),
            morphemes: Vocabulary::with_reserved(&[STEM_MORPH]),
            patterns: PatternSet::new(),
            analyses: Vec::new(),
        };
        let trivial = lex.patterns.intern(vec![STEM]);
        debug_assert_eq!(trivial, TRIVIAL_PATTERN);
        lex.analyses.push(vec![Analysis {
            stem: START,
            pattern: trivial,
        }]);
        lex.analyses.push(vec![Analysis {
            stem: STOP,
            pattern: trivial,
        }]);
        lex
    }

    pub fn freeze(&mut self) {
        self.words.freeze();
        self.stems.freeze();
        self.morphemes.freeze();
    }

    fn intern_analysis(&mut self, raw: &str) -> Result<Analysis, Error> {
        let toks = tokenize(raw)?;
        let mut stem = UNK_STEM;
        let mut pattern = Vec::with_capacity(toks.len());
        for tok in toks {
            match tok {
                Tok::Stem(s) => {
                    stem = self.stems.intern(s)?;
                    pattern.push(STEM);
                }
                Tok::Morph(m) => pattern.push(self.morphemes.intern(m)?),
            }
        }
        Ok(Analysis {
            stem,
            pattern: self.patterns.intern(pattern),
        })
    }

    fn lookup_analysis(&self, raw: &str) -> Result<Analysis, AnalysisError> {
        let oov = |kind: &'static str, item: &str| AnalysisError::Oov {
            kind,
            item: item.to_string(),
            analysis: raw.to_string(),
        };
        let toks = tokenize(raw)?;
        let mut stem = UNK_STEM;
        let mut pattern = Vec::with_capacity(toks.len());
        for tok in toks {
            match tok {
                Tok::Stem(s) => {
                    stem = self.stems.lookup(s).ok_or_else(|| oov("stem", s))?;
                    pattern.push(STEM);
                }
                Tok::Morph(m) => {
                    pattern.push(self.morphemes.lookup(m).ok_or_else(|| oov("morpheme", m))?)
                }
            }
        }
        let pattern = self
            .patterns
            .lookup(&pattern)
            .ok_or_else(|| oov("pattern", raw))?;
        Ok(Analysis { stem, pattern })
    }

    fn trivial_analysis(&mut self, word: &str) -> Result<Analysis, Error> {
        Ok(Analysis {
            stem: self.stems.intern(word)?,
            pattern: TRIVIAL_PATTERN,
        })
    }

    /// Interns a word together with its candidate analyses. Malformed
    /// candidates are dropped with a warning; a word whose candidates all
    /// fail gets the trivial whole-word analysis, so no word type is ever
    /// left without candidates.
    pub fn add_word(&mut self, word: &str, analyzer: &dyn Analyzer) -> Result<usize, Error> {
        if let Some(id) = self.words.lookup(word) {
            return Ok(id);
        }
        let id = self.words.intern(word)?;
        let mut candidates = Vec::new();
        for raw in analyzer.get_analyses(word) {
            match self.intern_analysis(&raw) {
                Ok(analysis) => candidates.push(analysis),
                Err(e) => warn!("dropping analysis '{}' of '{}': {}", raw, word, e),
            }
        }
        if candidates.is_empty() {
            candidates.push(self.trivial_analysis(word)?);
        }
        debug_assert_eq!(id, self.analyses.len());
        self.analyses.push(candidates);
        Ok(id)
    }

    /// Candidate analyses of a possibly unknown word under frozen
    /// vocabularies. Candidates touching out-of-vocabulary stems, morphemes
    /// or patterns are skipped with a warning; if everything is skipped the
    /// word falls back to whole-word-as-stem, or to the reserved unknown
    /// stem when even the word itself is unknown.
    pub fn frozen_candidates(&self, word: &str, analyzer: &dyn Analyzer) -> Vec<Analysis> {
        let mut candidates = Vec::new();
        for raw in analyzer.get_analyses(word) {
            match self.lookup_analysis(&raw) {
                Ok(analysis) => candidates.push(analysis),
                Err(e) => warn!("skipping analysis '{}' of '{}': {}", raw, word, e),
            }
        }
        if candidates.is_empty() {
            candidates.push(Analysis {
                stem: self.stems.lookup(word).unwrap_or(UNK_STEM),
                pattern: TRIVIAL_PATTERN,
            });
        }
        candidates
    }

    /// Renders an analysis back into analyzer notation, the stem substituted
    /// at its placeholder position.
    pub fn render(&self, analysis: &Analysis) -> String {
        self.patterns
            .get(analysis.pattern)
            .iter()
            .map(|&m| {
                if m == STEM {
                    self.stems.get(analysis.stem)
                } else {
                    self.morphemes.get(m)
                }
            })
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Analyzes and encodes a whole tokenized corpus.
    pub fn encode_corpus(
        &mut self,
        sentences: &[Vec<String>],
        analyzer: &dyn Analyzer,
    ) -> Result<Corpus, Error> {
        let mut corpus = Corpus::default();
        for sentence in sentences {
            let mut encoded = Vec::with_capacity(sentence.len());
            for word in sentence {
                encoded.push(self.add_word(word, analyzer)?);
            }
            corpus.push(encoded);
        }
        Ok(corpus)
    }

    /// Encodes a corpus against the word vocabulary alone, for models
    /// without a morphological component.
    pub fn encode_plain(&mut self, sentences: &[Vec<String>]) -> Result<Corpus, Error> {
        let mut corpus = Corpus::default();
        for sentence in sentences {
            let mut encoded = Vec::with_capacity(sentence.len());
            for word in sentence {
                encoded.push(self.words.intern(word)?);
            }
            corpus.push(encoded);
        }
        Ok(corpus)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer_with(entries: &[(&str, &[&str])]) -> TsvAnalyzer {
        TsvAnalyzer::from_table(
            entries
                .iter()
                .map(|(w, az)| {
                    (
                        (*w).to_string(),
                        az.iter().map(|a| (*a).to_string()).collect(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn analyses_split_into_stem_and_morphemes() {
        let mut lex = Lexicon::new();
        let analyzer = analyzer_with(&[("okudum", &["oku+Pst+A1sg"])]);
        let w = lex.add_word("okudum", &analyzer).unwrap();
        let candidates = &lex.analyses[w];
        assert_eq!(candidates.len(), 1);
        let a = candidates[0];
        assert_eq!(lex.stems.get(a.stem), "oku");
        assert_eq!(lex.patterns.get(a.pattern).len(), 3);
        assert_eq!(lex.patterns.get(a.pattern)[0], STEM);
        assert_eq!(lex.render(&a), "oku+Pst+A1sg");
    }

    #[test]
    fn ambiguous_words_keep_all_candidates() {
        let mut lex = Lexicon::new();
        let analyzer = analyzer_with(&[("koyun", &["koyun", "koy+P2sg", "koyu+P2sg"])]);
        let w = lex.add_word("koyun", &analyzer).unwrap();
        assert_eq!(lex.analyses[w].len(), 3);
    }

    #[test]
    fn malformed_candidates_fall_back_to_the_whole_word() {
        let mut lex = Lexicon::new();
        // Two stems in one candidate, and a tags-only candidate.
        let analyzer = analyzer_with(&[("broken", &["bro+ken+Tag", "Tag+Tag"])]);
        let w = lex.add_word("broken", &analyzer).unwrap();
        assert_eq!(lex.analyses[w].len(), 1);
        assert_eq!(lex.analyses[w][0].pattern, TRIVIAL_PATTERN);
        assert_eq!(lex.stems.get(lex.analyses[w][0].stem), "broken");
    }

    #[test]
    fn tokenizer_rejects_stemless_and_double_stem_strings() {
        assert!(matches!(tokenize("Tag+Tag"), Err(AnalysisError::NoStem(_))));
        assert!(matches!(
            tokenize("one+two+Tag"),
            Err(AnalysisError::ExtraStem(_))
        ));
        assert!(tokenize("word").is_ok());
    }

    #[test]
    fn short_or_nonalphabetic_words_bypass_the_analyzer() {
        let analyzer = analyzer_with(&[("word", &["wor+D"])]);
        assert_eq!(analyzer.get_analyses("a1b"), vec!["a1b".to_string()]);
        assert_eq!(analyzer.get_analyses("ab"), vec!["ab".to_string()]);
        assert_eq!(analyzer.get_analyses("word"), vec!["wor+D".to_string()]);
        assert_eq!(analyzer.get_analyses("a+b"), vec!["a#b".to_string()]);
    }

    #[test]
    fn frozen_lookup_skips_oov_candidates() {
        let mut lex = Lexicon::new();
        let analyzer = analyzer_with(&[("seen", &["seen", "see+Tag"])]);
        lex.add_word("seen", &analyzer).unwrap();
        lex.freeze();

        // Known word: both candidates survive.
        assert_eq!(lex.frozen_candidates("seen", &analyzer).len(), 2);

        // Unknown morpheme: candidate dropped, whole-word stem known.
        let eval = analyzer_with(&[("seen", &["see+Novel"]), ("seeing", &["see+Tag"])]);
        let survivors = lex.frozen_candidates("seen", &eval);
        assert_eq!(survivors.len(), 1);
        assert_eq!(lex.stems.get(survivors[0].stem), "seen");

        // Known morphology for an unknown word still works.
        let survivors = lex.frozen_candidates("seeing", &eval);
        assert_eq!(survivors.len(), 1);
        assert_eq!(lex.stems.get(survivors[0].stem), "see");

        // Nothing known at all: the unknown stem carries the word.
        let survivors = lex.frozen_candidates("zzz", &PassthroughAnalyzer);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].stem, UNK_STEM);
        assert_eq!(survivors[0].pattern, TRIVIAL_PATTERN);
    }

    #[test]
    fn corpus_encoding_caches_one_candidate_list_per_type() {
        let mut lex = Lexicon::new();
        let analyzer = PassthroughAnalyzer;
        let sentences = vec![
            vec!["the".to_string(), "cat".to_string()],
            vec!["the".to_string(), "dog".to_string()],
        ];
        let corpus = lex.encode_corpus(&sentences, &analyzer).unwrap();
        assert_eq!(corpus.num_sentences(), 2);
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.sentence(0)[0], corpus.sentence(1)[0]);
        assert_eq!(lex.words.len(), lex.analyses.len());
    }
}
