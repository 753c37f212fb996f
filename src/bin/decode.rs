use std::env::args;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process;

use getopts::Options;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use morphlm::{Analyzer, Error, PassthroughAnalyzer, Snapshot, TsvAnalyzer};

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} -m SNAPSHOT [options] < corpus", program);
    print!("{}", opts.usage(&brief));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "Print this help menu");
    opts.optopt("m", "model", "Path to a trained model snapshot", "FILENAME");
    opts.optopt(
        "a",
        "analyses",
        "Precomputed analyzer output for words outside the snapshot",
        "FILENAME",
    );
    opts.optopt("f", "file", "Corpus to decode instead of stdin", "FILENAME");

    let matches = opts.parse(&args[1..]).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    if !matches.opt_present("m") {
        eprintln!("Please specify the model snapshot with -m!");
        process::exit(1);
    }

    if let Err(e) = run(&matches) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(matches: &getopts::Matches) -> Result<(), Error> {
    let snapshot_path = matches.opt_str("m").expect("checked above");
    let snapshot = Snapshot::load(Path::new(&snapshot_path))?;
    let lexicon = &snapshot.lexicon;
    let morpho = snapshot.model.morpho().ok_or(Error::NoMorphology)?;

    let analyzer: Box<dyn Analyzer> = match matches.opt_str("a") {
        Some(table) => Box::new(TsvAnalyzer::from_path(Path::new(&table))?),
        None => Box::new(PassthroughAnalyzer),
    };

    let reader: Box<dyn BufRead> = match matches.opt_str("f") {
        Some(file) => Box::new(BufReader::new(File::open(file)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    for line in reader.lines() {
        let line = line?;
        for word in line.split_whitespace() {
            let (log_prob, best) = match lexicon.words.lookup(word) {
                Some(id) => morpho.decode(id),
                None => {
                    warn!("'{}' is outside the snapshot vocabulary", word);
                    let candidates = lexicon.frozen_candidates(word, analyzer.as_ref());
                    morpho.best_analysis(&candidates)
                }
            };
            println!("{}\t{}\t{:.4}", word, lexicon.render(&best), log_prob);
        }
    }
    Ok(())
}
