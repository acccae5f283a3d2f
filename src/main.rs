use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::info;
use seqbpe::{
    Trainer, TrainerConfig, alphabet,
    output::save_snapshot,
    reader::{self, InputFormat},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "BPE vocabulary training for genomic sequences", long_about = None)]
struct Cli {
    /// Input file with raw sequences
    input: PathBuf,

    /// Output prefix; files are written as <prefix>.<n>.{json,poses,bpe}
    output_prefix: PathBuf,

    /// Input format: fasta, fastq, reads or trf
    #[arg(short, long, default_value = "fasta")]
    format: InputFormat,

    /// Highest token id to assign; 0 runs until no pair repeats
    #[arg(long, value_name = "N", default_value_t = 0)]
    max_tokens: usize,

    /// Workers used to build the sequence list
    #[arg(short, long, value_name = "T")]
    threads: Option<usize>,

    /// Pairs seen fewer times are never merged
    #[arg(long, value_name = "FREQ", default_value_t = 2)]
    min_frequency: usize,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Only write the final snapshot
    #[arg(long)]
    no_snapshots: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, action = ArgAction::Count)]
    quiet: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let defaults = TrainerConfig::default();
    let mut cfg = TrainerConfig::builder()
        .min_frequency(cli.min_frequency)
        .n_threads(cli.threads.unwrap_or(defaults.n_threads))
        .show_progress(!cli.no_progress);
    if cli.max_tokens > 0 {
        cfg = cfg.max_tokens(cli.max_tokens);
    }
    if cli.no_snapshots {
        cfg = cfg.snapshot_points(Vec::new());
    }
    let cfg = cfg.build().context("invalid training configuration")?;

    let seqs = reader::read_path(&cli.input, cli.format)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let tokens = alphabet::encode_sequences(&seqs);
    drop(seqs);

    let start = Instant::now();
    let schedule = cfg.snapshot_schedule();
    let mut trainer = Trainer::new(&tokens, cfg).context("failed to build training state")?;
    drop(tokens);

    for point in schedule {
        if trainer.train_until(point)?.is_some() {
            break;
        }
        let tokens = trainer.tokens()?;
        save_snapshot(&cli.output_prefix, point, trainer.merges(), &tokens, false)
            .with_context(|| format!("failed to save snapshot {point}"))?;
    }
    let reason = trainer.train()?;

    let tokens = trainer.tokens()?;
    let label = trainer.next_token();
    let paths = save_snapshot(&cli.output_prefix, label, trainer.merges(), &tokens, true)
        .context("failed to save final snapshot")?;

    info!(
        "training complete: merges={} vocab={label} length={} stop=\"{reason}\" duration={:.2?}",
        trainer.merges().len(),
        tokens.len(),
        start.elapsed()
    );
    info!("model written to {}", paths.model.display());
    Ok(())
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}
