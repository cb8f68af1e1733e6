use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::Parser;
use glossa_core::device_from_env;
use glossa_trainer::{TextClassifier, init_logging};

#[derive(Parser)]
#[command(name = "predict")]
#[command(about = "Score comments with a trained classifier")]
#[command(version)]
struct Cli {
    /// Model directory written by `train`
    #[arg(short, long, env = "GLOSSA_MODEL")]
    model: PathBuf,

    #[arg(short, long, env = "GLOSSA_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Comments to score; read one per line from stdin when omitted
    texts: Vec<String>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let texts = if cli.texts.is_empty() {
        io::stdin().lock().lines().collect::<io::Result<Vec<_>>>()?
    } else {
        cli.texts
    };

    let classifier = TextClassifier::load(&cli.model, device_from_env()?)?;
    let probs = classifier.predict_proba(&texts, cli.batch_size)?;
    for (prob, text) in probs.iter().zip(&texts) {
        println!("{prob:.4}\t{text}");
    }
    Ok(())
}

fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Prediction failed: {:#}", e);
        std::process::exit(1);
    }
}
