use std::env::args;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use either::{Either, Left, Right};
use getopts::Options;
use tracing::info;
use tracing_subscriber::EnvFilter;

use morphlm::def::*;
use morphlm::{
    read_tokenized, Base, BigramPattern, CharLm, Corpus, Error, Lexicon, MorphoProcess,
    PoissonUnigramPattern, PypLm, Snapshot, TopModel, Trainer, TsvAnalyzer,
};

// Either Left(file) or Right(dir).
fn read_corpus(path: Either<&str, &str>) -> Result<Vec<Vec<String>>, Error> {
    match path {
        Left(file) => read_tokenized(Path::new(file)),
        Right(dir) => {
            let mut sentences = Vec::new();
            let mut files: Vec<PathBuf> =
                fs::read_dir(dir)?.map(|e| e.map(|e| e.path())).collect::<Result<_, _>>()?;
            files.sort();
            for file in files {
                sentences.extend(read_tokenized(&file)?);
            }
            Ok(sentences)
        }
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} -f FILE|-d DIR [options]", program);
    print!("{}", opts.usage(&brief));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "Print this help menu");
    opts.optopt("f", "file", "Path to the training corpus file", "FILENAME");
    opts.optopt("d", "dir", "Path to the training corpus directory", "DIRNAME");
    opts.optopt("t", "test", "Path to a held-out corpus", "FILENAME");
    opts.optopt(
        "a",
        "analyses",
        "Precomputed analyzer output (word TAB analysis...)",
        "FILENAME",
    );
    opts.optopt(
        "c",
        "charlm",
        "Stem scores from a character language model (stem TAB log10 prob)",
        "FILENAME",
    );
    opts.optopt("n", "order", "Language model order", "2");
    opts.optopt(
        "m",
        "model",
        "Pattern model: 1 Poisson-unigram, 2 bigram, 3 PYP-smoothed bigram",
        "2",
    );
    opts.optopt("i", "iterations", "Number of Gibbs sweeps", "100");
    opts.optopt("s", "seed", "Seed for the run", "1");
    opts.optopt("", "theta", "Strength of the top-level PYP", "1.0");
    opts.optopt("", "discount", "Discount of the top-level PYP", "0.8");
    opts.optopt("o", "output", "Path to write the model snapshot to", "FILENAME");
    opts.optflag(
        "",
        "bare",
        "With order 1: use the morphological process itself as the top level",
    );

    let matches = opts.parse(&args[1..]).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    if !matches.opts_present(&["f".to_owned(), "d".to_owned()]) {
        eprintln!("Please specify either the corpus file with -f or the corpus directory with -d!");
        process::exit(1);
    }

    if matches.opt_present("f") && matches.opt_present("d") {
        eprintln!("Please specify either the corpus file or directory, but not both!");
        process::exit(1);
    }

    if let Err(e) = run(&matches) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(matches: &getopts::Matches) -> Result<(), Error> {
    let order: usize = matches.opt_get_default("n", 2).unwrap_or(2);
    let variant: usize = matches.opt_get_default("m", 2).unwrap_or(2);
    let iterations: usize = matches.opt_get_default("i", 100).unwrap_or(100);
    let seed: u64 = matches.opt_get_default("s", 1).unwrap_or(1);
    let theta: f64 = matches.opt_get_default("theta", INITIAL_THETA).unwrap_or(INITIAL_THETA);
    let discount: f64 = matches.opt_get_default("discount", INITIAL_D).unwrap_or(INITIAL_D);
    let bare = matches.opt_present("bare");

    if order < 1 {
        eprintln!("The language model order must be at least 1!");
        process::exit(1);
    }

    let train_sentences = if let Some(file) = matches.opt_str("f") {
        read_corpus(Left(file.as_str()))?
    } else {
        let dir = matches.opt_str("d").expect("checked above");
        read_corpus(Right(dir.as_str()))?
    };
    let test_sentences = match matches.opt_str("t") {
        Some(file) => Some(read_tokenized(Path::new(&file))?),
        None => None,
    };

    let mut lexicon = Lexicon::new();
    let train_corpus;
    let test_corpus;
    let model;

    if let Some(table) = matches.opt_str("a") {
        info!("training a morphological LM of order {}", order);
        let analyzer = TsvAnalyzer::from_path(Path::new(&table))?;
        train_corpus = lexicon.encode_corpus(&train_sentences, &analyzer)?;
        test_corpus = match &test_sentences {
            Some(sentences) => Some(lexicon.encode_corpus(sentences, &analyzer)?),
            None => None,
        };
        lexicon.freeze();

        let n_analyses: usize = lexicon.analyses.iter().map(|a| a.len()).sum();
        info!(
            "corpus: {} tokens, vocabulary: {} words / {} stems / {} morphemes",
            train_corpus.len(),
            lexicon.words.len(),
            lexicon.stems.len(),
            lexicon.morphemes.len()
        );
        info!("analyses: {} total -> {} patterns", n_analyses, lexicon.patterns.len());

        let char_lm = match matches.opt_str("c") {
            Some(path) => CharLm::from_score_file(Path::new(&path), &lexicon.stems)?,
            None => CharLm::uniform(&lexicon.stems),
        };
        let stem_model = Base::pyp(STEM_THETA, STEM_D, Base::CharLm(char_lm));
        let pattern_model = match variant {
            1 => Base::PoissonUnigram(PoissonUnigramPattern::new(
                lexicon.morphemes.len(),
                MORPHEME_PRIOR,
                LENGTH_SHAPE,
                LENGTH_RATE,
                lexicon.patterns.clone(),
            )),
            2 => Base::Bigram(BigramPattern::new(
                lexicon.morphemes.len(),
                MORPHEME_PRIOR,
                lexicon.patterns.clone(),
            )),
            3 => Base::pyp(
                PATTERN_THETA,
                PATTERN_D,
                Base::Bigram(BigramPattern::new(
                    lexicon.morphemes.len(),
                    MORPHEME_PRIOR,
                    lexicon.patterns.clone(),
                )),
            ),
            _ => {
                eprintln!("Unknown pattern model variant {}; expected 1, 2 or 3.", variant);
                process::exit(1);
            }
        };
        let morpho = Base::Morpho(Box::new(MorphoProcess::new(
            stem_model,
            pattern_model,
            lexicon.analyses.clone(),
        )));
        model = if order == 1 && bare {
            info!("top level is the morphological process");
            TopModel::Flat(morpho)
        } else {
            info!("top level is a PYP chain (theta {}, discount {})", theta, discount);
            TopModel::Ngram(PypLm::new(theta, discount, order, morpho))
        };
    } else {
        info!("training a baseline word LM of order {}", order);
        train_corpus = lexicon.encode_plain(&train_sentences)?;
        test_corpus = match &test_sentences {
            Some(sentences) => Some(lexicon.encode_plain(sentences)?),
            None => None,
        };
        lexicon.freeze();
        info!(
            "corpus: {} tokens, vocabulary: {} words",
            train_corpus.len(),
            lexicon.words.len()
        );
        model = TopModel::Ngram(PypLm::new(
            theta,
            discount,
            order,
            Base::CharLm(CharLm::uniform(&lexicon.words)),
        ));
    }

    let mut trainer = Trainer::new(model, seed);
    trainer.run(&train_corpus, iterations);

    if let Some(test) = test_corpus {
        report_heldout(&trainer, &test);
    }

    if let Some(output) = matches.opt_str("o") {
        let snapshot = Snapshot {
            lexicon,
            model: trainer.into_model(),
        };
        let path = Path::new(&output);
        snapshot.save(path)?;
        info!("model written to {}", path.display());
    }

    Ok(())
}

fn report_heldout(trainer: &Trainer<TopModel>, test: &Corpus) {
    info!(
        "held-out: {} tokens, perplexity {:.3}",
        test.len(),
        trainer.perplexity(test)
    );
}
