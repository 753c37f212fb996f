pub mod def;

mod error;
pub use error::{AnalysisError, Error};

mod prob;
pub use prob::{CharLm, DirichletMultinomial, GammaPoisson, Uniform};

mod process;
pub use process::{Base, Process};

mod crp;
pub use crp::{Crp, Pyp};

mod ngram;
pub use ngram::{PypLm, SeqModel};

mod pattern;
pub use pattern::{BigramPattern, PatternSet, PoissonUnigramPattern};

mod morpho;
pub use morpho::MorphoProcess;

mod analysis;
pub use analysis::{Analysis, Analyzer, Lexicon, PassthroughAnalyzer, TsvAnalyzer};

mod corpus;
pub use corpus::{ngrams, read_tokenized, Corpus, Vocabulary};

mod trainer;
pub use trainer::{perplexity, Trainer};

mod snapshot;
pub use snapshot::{Snapshot, TopModel};
