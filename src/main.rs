use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use faceage::clinical::{curate, join_clinical, link_photo_log, read_table, record_log_table, write_table};
use faceage::config::PipelineConfig;
use faceage::dataset::npz::{read_dataset, write_images};
use faceage::dataset::pipeline::{format_label_histogram, run_rebalance};
use faceage::dataset::faces_to_array;
use faceage::imaging::{RustfaceDetector, extract_faces_for_photos};

#[derive(Parser, Debug)]
#[command(name = "faceage", version, about = "Face-age dataset preparation")]
struct Cli {
    /// JSON pipeline configuration; defaults are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect and crop faces for every photo in a photo log
    Extract {
        #[arg(long)]
        photo_log: PathBuf,
        /// Directory holding `<photo id>.<ext>` images
        #[arg(long)]
        images: PathBuf,
        /// Output record log (CSV or Parquet)
        #[arg(long)]
        record_log: PathBuf,
        /// Output `.npz` with the face crops
        #[arg(long)]
        faces: PathBuf,
        /// SeetaFace model file
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Join a record log with the clinical database on pmrn
    Join {
        #[arg(long)]
        record_log: PathBuf,
        #[arg(long)]
        clinical: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Apply exclusion criteria and derive survival outcomes
    Curate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        days_cutoff: Option<i64>,
        #[arg(long)]
        tx_start_days_cutoff: Option<i64>,
    },
    /// Resample and augment labelled faces to a per-age quota
    Rebalance {
        /// One or more `.npz` inputs, concatenated in order
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        output: PathBuf,
        /// Per-age counts as CSV or Parquet
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        quota: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        lower_age: Option<i64>,
        #[arg(long)]
        upper_age: Option<i64>,
        #[arg(long)]
        seed: Option<u64>,
        /// Drop the overshoot of the last augmentation batch
        #[arg(long)]
        trim: bool,
    },
    /// Print the label histogram of an `.npz` dataset
    Summary {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let start = Instant::now();

    match cli.command {
        Command::Extract {
            photo_log,
            images,
            record_log,
            faces,
            model,
        } => {
            if let Some(model) = model {
                config.extraction.detector.model_path = model;
            }
            let log = read_table(&photo_log).context("reading photo log")?;
            let photos = link_photo_log(&log, &config.extraction.photo_log, &config.dates)?;
            let mut detector = RustfaceDetector::from_config(&config.extraction.detector)?;
            let extraction = extract_faces_for_photos(&images, &photos, &mut detector, &config.extraction)?;

            let flags: Vec<bool> = extraction.statuses.iter().map(|s| s.face_found()).collect();
            let table = record_log_table(&photos, &flags, &config.dates)?;
            write_table(&table, &record_log)?;
            write_images(&faces, &faces_to_array(&extraction.faces)?)?;
            info!(
                "Extracted {} faces, skipped {} photos",
                extraction.faces.len(),
                extraction.skipped()
            );
        }
        Command::Join {
            record_log,
            clinical,
            output,
        } => {
            let log = read_table(&record_log).context("reading record log")?;
            let clinical = read_table(&clinical).context("reading clinical database")?;
            let joined = join_clinical(&log, &clinical, &config.curation.columns.pmrn)?;
            write_table(&joined, &output)?;
        }
        Command::Curate {
            input,
            output,
            days_cutoff,
            tx_start_days_cutoff,
        } => {
            if let Some(days) = days_cutoff {
                config.curation.days_cutoff = days;
            }
            if let Some(days) = tx_start_days_cutoff {
                config.curation.tx_start_days_cutoff = days;
            }
            let table = read_table(&input).context("reading processed clinical table")?;
            let outcome = curate(&table, &config.curation, &config.dates)?;
            write_table(&outcome.table, &output)?;
        }
        Command::Rebalance {
            input,
            output,
            report,
            quota,
            batch_size,
            lower_age,
            upper_age,
            seed,
            trim,
        } => {
            let rebalance = &mut config.rebalance;
            if let Some(quota) = quota {
                rebalance.target_quota = quota;
            }
            if let Some(batch_size) = batch_size {
                rebalance.batch_size = batch_size;
            }
            if let Some(lower) = lower_age {
                rebalance.lower_age = lower;
            }
            if let Some(upper) = upper_age {
                rebalance.upper_age = upper;
            }
            if seed.is_some() {
                rebalance.seed = seed;
            }
            rebalance.trim_to_quota |= trim;

            let summary = run_rebalance(&input, &output, &config)?;
            let short: Vec<String> = summary.under_quota().map(|c| c.age.to_string()).collect();
            if !short.is_empty() {
                info!("Ages below quota: {}", short.join(", "));
            }
            if let Some(report) = report {
                write_table(&summary.to_record_batch()?, &report)?;
            }
        }
        Command::Summary { input } => {
            let dataset = read_dataset(&input)?;
            let (height, width) = dataset.image_size();
            println!("{} samples of {height}x{width}", dataset.len());
            println!("{}", format_label_histogram(&dataset));
        }
    }

    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
