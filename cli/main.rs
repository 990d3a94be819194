#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process;

use topos::classify::task::{Task, run_task};
use topos::config::ToposConfig;
use topos::conversion::convert_file;
use topos::f_ratio::f_ratio_comparison;

#[derive(Parser)]
#[command(
    name = "topos",
    about = "Tumor and tissue-of-origin prediction from gene expression",
    long_about = "Classifies bulk or single-cell expression profiles as tumor or non-tumor and \
                  predicts their tissue of origin with linear SVMs trained on reference data."
)]
struct Cli {
    /// TOML file overriding reference data locations and classifier settings
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PredictionArgs {
    /// Testing expression matrix (TSV, samples × genes, TPM)
    #[arg(long = "testing_exp", value_name = "PATH")]
    testing_exp: PathBuf,

    /// Optional headerless list of genes to restrict the model to
    #[arg(long = "gene_list_path", value_name = "PATH")]
    gene_list_path: Option<PathBuf>,

    /// Directory receiving the prediction file (created if missing)
    #[arg(long = "prediction_directory", value_name = "DIR")]
    prediction_directory: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a raw count matrix into TPM
    #[command(name = "conversion", about = "Convert counts to TPM (outputs: TSV matrix)")]
    Conversion {
        #[arg(short = 'i', long = "input_matrix", value_name = "PATH")]
        input_matrix: PathBuf,

        #[arg(short = 'o', long = "output_file", value_name = "PATH")]
        output_file: PathBuf,
    },

    /// Rank genes by the one-way ANOVA F ratio between single-cell and bulk data
    #[command(name = "f_ratio", about = "Compare single-cell and bulk expression per gene")]
    FRatio {
        #[arg(short = 'o', long = "output_file", value_name = "PATH")]
        output_file: PathBuf,

        /// Single-cell TPM matrix; defaults to the configured reference
        #[arg(short = 's', long = "single_cell", value_name = "PATH")]
        single_cell: Option<PathBuf>,

        /// Bulk TPM matrix; defaults to the configured reference
        #[arg(short = 'b', long = "bulk", value_name = "PATH")]
        bulk: Option<PathBuf>,
    },

    /// Predict tumor vs. non-tumor for each testing sample
    #[command(name = "tumor_prediction", about = "Tumor vs. non-tumor prediction")]
    TumorPrediction(PredictionArgs),

    /// Predict the tissue of origin for each testing sample
    #[command(name = "too_prediction", about = "Tissue-of-origin prediction")]
    TooPrediction(PredictionArgs),
}

/// Multi-letter single-dash flags accepted for compatibility, with their long forms.
const LEGACY_FLAGS: [(&str, &str); 3] = [
    ("-tst", "--testing_exp"),
    ("-gl", "--gene_list_path"),
    ("-pd", "--prediction_directory"),
];

fn rewrite_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            for (legacy, long) in LEGACY_FLAGS {
                if text == legacy {
                    return OsString::from(long);
                }
                if let Some(value) = text.strip_prefix(legacy).and_then(|v| v.strip_prefix('=')) {
                    return OsString::from(format!("{long}={value}"));
                }
            }
            arg
        })
        .collect()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse_from(rewrite_legacy_flags(std::env::args_os()));
    let Cli { config, command } = cli;

    let result = match command {
        Commands::Conversion {
            input_matrix,
            output_file,
        } => run_conversion(input_matrix, output_file),
        Commands::FRatio {
            output_file,
            single_cell,
            bulk,
        } => run_f_ratio(config, output_file, single_cell, bulk),
        Commands::TumorPrediction(args) => run_prediction(Task::Tumor, config, args),
        Commands::TooPrediction(args) => run_prediction(Task::TissueOfOrigin, config, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_conversion(
    input_matrix: PathBuf,
    output_file: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Converting counts in '{}' to TPM", input_matrix.display());
    let tpm = convert_file(&input_matrix, &output_file)?;
    println!(
        "Wrote {} samples × {} genes to '{}'",
        tpm.n_samples(),
        tpm.n_genes(),
        output_file.display()
    );
    Ok(())
}

fn run_f_ratio(
    config: Option<PathBuf>,
    output_file: PathBuf,
    single_cell: Option<PathBuf>,
    bulk: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ToposConfig::load_or_default(config.as_deref())?;
    let single_cell = single_cell.unwrap_or(config.reference.single_cell);
    let bulk = bulk.unwrap_or(config.reference.bulk);

    println!(
        "Comparing single-cell '{}' against bulk '{}'",
        single_cell.display(),
        bulk.display()
    );
    let ranked = f_ratio_comparison(&single_cell, &bulk, &output_file)?;
    println!(
        "Ranked {} genes; results saved to '{}'",
        ranked.len(),
        output_file.display()
    );
    Ok(())
}

fn run_prediction(
    task: Task,
    config: Option<PathBuf>,
    args: PredictionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ToposConfig::load_or_default(config.as_deref())?;
    println!("--- Starting {task} prediction ---");
    println!("Testing data: {}", args.testing_exp.display());
    if let Some(list) = &args.gene_list_path {
        println!("Gene list: {}", list.display());
    }

    let outcome = run_task(
        task,
        &args.testing_exp,
        args.gene_list_path.as_deref(),
        &args.prediction_directory,
        &config,
    )?;

    println!(
        "Predicted {} samples using {} genes",
        outcome.predictions.len(),
        outcome.n_genes
    );
    println!("Predictions saved to: {}", outcome.output_path.display());
    Ok(())
}
