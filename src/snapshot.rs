//! Whole-state model snapshots.
//!
//! A snapshot is the serialized ownership tree of the trained model plus the
//! lexicon it was trained against; loading one reproduces the seating state
//! exactly. Snapshots are only ever written whole: the file is staged next
//! to its destination and renamed into place, so an interrupted run leaves
//! no partial snapshot behind.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::Lexicon;
use crate::error::Error;
use crate::morpho::MorphoProcess;
use crate::ngram::{PypLm, SeqModel};
use crate::process::Base;

/// The trained top-level model: an n-gram chain, or a bare process for
/// unigram runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopModel {
    Ngram(PypLm),
    Flat(Base),
}

impl TopModel {
    /// The morphological component of this model, if it has one.
    pub fn morpho(&self) -> Option<&MorphoProcess> {
        match self {
            TopModel::Ngram(lm) => lm.base().morpho(),
            TopModel::Flat(base) => base.morpho(),
        }
    }
}

impl SeqModel for TopModel {
    fn order(&self) -> usize {
        match self {
            TopModel::Ngram(lm) => lm.order(),
            TopModel::Flat(base) => SeqModel::order(base),
        }
    }

    fn increment<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        match self {
            TopModel::Ngram(lm) => lm.increment(seq, rng),
            TopModel::Flat(base) => SeqModel::increment(base, seq, rng),
        }
    }

    fn decrement<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        match self {
            TopModel::Ngram(lm) => lm.decrement(seq, rng),
            TopModel::Flat(base) => SeqModel::decrement(base, seq, rng),
        }
    }

    fn log_prob(&self, seq: &[usize]) -> f64 {
        match self {
            TopModel::Ngram(lm) => lm.log_prob(seq),
            TopModel::Flat(base) => SeqModel::log_prob(base, seq),
        }
    }

    fn log_likelihood(&self) -> f64 {
        match self {
            TopModel::Ngram(lm) => lm.log_likelihood(),
            TopModel::Flat(base) => SeqModel::log_likelihood(base),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub lexicon: Lexicon,
    pub model: TopModel,
}

impl Snapshot {
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let staged = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&staged)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&staged, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let reader = BufReader::new(fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
