use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

mod circle;
mod convert;
mod graph;
mod invoke;
mod pipeline;
mod tree;

use invoke::ScriptEngine;
use pipeline::{PipelineConfig, DEFAULT_THRESHOLD};

#[derive(Parser)]
#[command(name = "simcluster")]
#[command(
    about = "Cluster pairwise similarity scores and emit tree, circle-packing and graph JSON.",
    long_about = None
)]
struct Args {
    // Locations
    /// Directory holding `<variant>.csv` inputs; all outputs are written here.
    #[arg(short = 'd', long = "results-dir", value_name = "DIR", default_value = "similarity-results")]
    results_dir: PathBuf,

    /// Clustering script that reads similarity-scores.txt and writes clusters.json.
    #[arg(
        short = 's',
        long = "cluster-script",
        value_name = "FILE",
        default_value = "tika-similarity/tikasimilarity/cluster/cluster-scores.py"
    )]
    cluster_script: PathBuf,

    /// Program used to run the clustering script.
    #[arg(short = 'p', long = "interpreter", value_name = "PROGRAM", default_value = "python3")]
    interpreter: String,

    // Clustering Options
    /// Similarity threshold passed to the clustering script.
    #[arg(short = 't', long = "threshold", value_name = "F", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Similarity metric to process; repeat for several (default: all three).
    #[arg(short = 'V', long = "variant", value_name = "NAME")]
    variants: Vec<String>,

    /// Exit with status 1 if any processed variant had a failing step.
    #[arg(long = "strict")]
    strict: bool,

    // Logging
    /// Verbosity level (0 = error, 1 = info, 2 = debug).
    #[arg(short = 'v', long = "verbose", value_name = "N", default_value_t = 1)]
    verbose: u8,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.results_dir);
        config.threshold = self.threshold;
        if !self.variants.is_empty() {
            config.variants = self.variants.clone();
        }
        config
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Err(e) = std::fs::create_dir_all(&args.results_dir) {
        error!("Could not create {}: {}", args.results_dir.display(), e);
        std::process::exit(1);
    }

    let config = args.pipeline_config();
    let engine = ScriptEngine::new(&args.interpreter, &args.cluster_script);
    let reports = pipeline::run(&config, &engine);
    pipeline::log_summary(&config.results_dir, &reports);

    if args.strict && reports.iter().any(|r| r.has_failure()) {
        std::process::exit(1);
    }
    info!("Done.");
}
