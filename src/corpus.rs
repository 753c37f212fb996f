//! Vocabulary interning and encoded corpora.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::def::{START, STOP};
use crate::error::Error;

/// Bidirectional string/id interning. Once frozen, unknown strings are
/// rejected instead of being assigned fresh ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "VocabularyRepr", into = "VocabularyRepr")]
pub struct Vocabulary {
    word2id: HashMap<String, usize>,
    id2word: Vec<String>,
    frozen: bool,
}

#[derive(Serialize, Deserialize)]
struct VocabularyRepr {
    id2word: Vec<String>,
    frozen: bool,
}

impl From<VocabularyRepr> for Vocabulary {
    fn from(repr: VocabularyRepr) -> Self {
        let word2id = repr
            .id2word
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Self {
            word2id,
            id2word: repr.id2word,
            frozen: repr.frozen,
        }
    }
}

impl From<Vocabulary> for VocabularyRepr {
    fn from(v: Vocabulary) -> Self {
        Self {
            id2word: v.id2word,
            frozen: v.frozen,
        }
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self {
            word2id: HashMap::new(),
            id2word: Vec::new(),
            frozen: false,
        }
    }

    pub fn with_reserved(reserved: &[&str]) -> Self {
        let mut v = Self::new();
        for w in reserved {
            v.word2id.insert((*w).to_string(), v.id2word.len());
            v.id2word.push((*w).to_string());
        }
        v
    }

    pub fn intern(&mut self, word: &str) -> Result<usize, Error> {
        if let Some(&id) = self.word2id.get(word) {
            return Ok(id);
        }
        if self.frozen {
            return Err(Error::Oov(word.to_string()));
        }
        let id = self.id2word.len();
        self.word2id.insert(word.to_string(), id);
        self.id2word.push(word.to_string());
        Ok(id)
    }

    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.word2id.get(word).cloned()
    }

    pub fn get(&self, id: usize) -> &str {
        &self.id2word[id]
    }

    pub fn len(&self) -> usize {
        self.id2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2word.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

/// Sentences of vocabulary-encoded word ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    sentences: Vec<Vec<usize>>,
}

impl Corpus {
    pub fn new(sentences: Vec<Vec<usize>>) -> Self {
        Self { sentences }
    }

    pub fn push(&mut self, sentence: Vec<usize>) {
        self.sentences.push(sentence);
    }

    pub fn num_sentences(&self) -> usize {
        self.sentences.len()
    }

    pub fn sentence(&self, i: usize) -> &[usize] {
        &self.sentences[i]
    }

    pub fn sentences(&self) -> &[Vec<usize>] {
        &self.sentences
    }

    /// Token count, boundary symbols excluded.
    pub fn len(&self) -> usize {
        self.sentences.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads whitespace-tokenized sentences, skipping empty lines.
pub fn read_tokenized(path: &Path) -> Result<Vec<Vec<String>>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut sentences = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        sentences.push(line.split_whitespace().map(str::to_string).collect());
    }
    Ok(sentences)
}

/// The n-gram occurrences of one sentence: `order - 1` START symbols of
/// padding, then the words, then one STOP. Order 1 yields each word alone,
/// without boundary events.
pub fn ngrams(sentence: &[usize], order: usize) -> Vec<Vec<usize>> {
    assert!(order >= 1);
    if order == 1 {
        return sentence.iter().map(|&w| vec![w]).collect();
    }
    let mut padded = vec![START; order - 1];
    padded.extend_from_slice(sentence);
    padded.push(STOP);
    padded.windows(order).map(|w| w.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_assigns_stable_ids() {
        let mut v = Vocabulary::with_reserved(&["<s>", "</s>"]);
        assert_eq!(v.lookup("<s>"), Some(START));
        assert_eq!(v.lookup("</s>"), Some(STOP));
        let a = v.intern("spam").unwrap();
        let b = v.intern("eggs").unwrap();
        assert_eq!(v.intern("spam").unwrap(), a);
        assert_ne!(a, b);
        assert_eq!(v.get(b), "eggs");
    }

    #[test]
    fn frozen_vocabulary_rejects_new_words() {
        let mut v = Vocabulary::new();
        v.intern("known").unwrap();
        v.freeze();
        assert_eq!(v.lookup("known"), Some(0));
        assert!(v.intern("novel").is_err());
        assert!(v.intern("known").is_ok());
    }

    #[test]
    fn vocabulary_serde_rebuilds_the_reverse_map() {
        let mut v = Vocabulary::with_reserved(&["<s>", "</s>"]);
        v.intern("alpha").unwrap();
        v.freeze();
        let json = serde_json::to_string(&v).unwrap();
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
        assert_eq!(back.lookup("alpha"), Some(2));
        assert!(back.is_frozen());
    }

    #[test]
    fn ngrams_pad_with_start_and_close_with_stop() {
        let sentence = [7, 8, 9];
        assert_eq!(
            ngrams(&sentence, 1),
            vec![vec![7], vec![8], vec![9]]
        );
        assert_eq!(
            ngrams(&sentence, 2),
            vec![
                vec![START, 7],
                vec![7, 8],
                vec![8, 9],
                vec![9, STOP],
            ]
        );
        assert_eq!(
            ngrams(&sentence, 3),
            vec![
                vec![START, START, 7],
                vec![START, 7, 8],
                vec![7, 8, 9],
                vec![8, 9, STOP],
            ]
        );
    }
}
