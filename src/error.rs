use thiserror::Error;

/// A candidate analysis string that cannot be mapped onto the model's
/// vocabularies. Recoverable: the caller may fall back to the trivial
/// whole-word analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("no stem in analysis '{0}'")]
    NoStem(String),
    #[error("more than one stem in analysis '{0}'")]
    ExtraStem(String),
    #[error("out-of-vocabulary {kind} '{item}' in analysis '{analysis}'")]
    Oov {
        kind: &'static str,
        item: String,
        analysis: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("out-of-vocabulary word '{0}'")]
    Oov(String),
    #[error("malformed analysis table line: '{0}'")]
    BadTableLine(String),
    #[error("snapshot does not contain a morphological model")]
    NoMorphology,
}
