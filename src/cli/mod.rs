//! Command-line interface for inspecting KITTI-style datasets.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::labels::ObjectClass;
use crate::core::writers::{write_boxes_csv, write_points_csv};
use crate::dataset::{KittiDataset, Split};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "kitti-dataset")]
#[command(about = "Inspect KITTI-style LiDAR object datasets", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Dataset selection shared by every subcommand.
#[derive(clap::Args)]
struct DatasetArgs {
    /// Dataset root (defaults to dataset.data_dir from the config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Split to read: train, val or test (defaults to dataset.split from the config)
    #[arg(short, long)]
    split: Option<Split>,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a split: record count, points and boxes per class
    Info {
        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Print one record
    Show {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Record index
        index: usize,
    },

    /// Write one record's points and boxes to CSV
    Export {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Record index
        index: usize,
        /// Output directory
        output_dir: PathBuf,
    },

    /// Decode every record and report failures
    Validate {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
}

/// Create a progress bar for per-record work
fn create_progress(len: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            let head: String = value.chars().take(34).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    if config.loader.num_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(config.loader.num_threads)
            .build_global()
        {
            warn!("Failed to configure {} loader threads: {}", config.loader.num_threads, e);
        }
    }

    let result = match cli.command {
        Commands::Info { dataset } => cmd_info(&dataset, &config),
        Commands::Show { dataset, index } => cmd_show(&dataset, index, &config),
        Commands::Export {
            dataset,
            index,
            output_dir,
        } => cmd_export(&dataset, index, &output_dir, &config),
        Commands::Validate { dataset } => cmd_validate(&dataset, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Open the dataset named by the arguments, falling back to the config.
fn open_dataset(
    args: &DatasetArgs,
    config: &PipelineConfig,
    with_transform: bool,
) -> Result<KittiDataset> {
    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| config.dataset.data_dir.clone())
        .ok_or_else(|| anyhow!("no dataset directory given (use --data-dir or dataset.data_dir)"))?;
    let split = args.split.unwrap_or(config.dataset.split);

    let transform = if with_transform {
        config.transform.build()
    } else {
        None
    };

    KittiDataset::open(&data_dir, split, transform)
        .with_context(|| format!("failed to open {} split at {}", split, data_dir.display()))
}

fn cmd_info(args: &DatasetArgs, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let dataset = open_dataset(args, config, true)?;

    let indices: Vec<usize> = (0..dataset.len()).collect();
    let pb = create_progress(dataset.len(), "Reading records");

    let mut total_points = 0usize;
    let mut class_counts: BTreeMap<ObjectClass, usize> = BTreeMap::new();

    for chunk in indices.chunks(config.loader.batch_size.max(1)) {
        let records = dataset.get_batch(chunk)?;
        for record in &records {
            total_points += record.points.len();
            for b in &record.boxes {
                *class_counts.entry(b.class).or_insert(0) += 1;
            }
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    let mut items = vec![
        ("Dataset", dataset.root().display().to_string()),
        ("Split", dataset.split().to_string()),
        ("Records", dataset.len().to_string()),
        ("Total points", total_points.to_string()),
    ];
    if dataset.split().has_labels() {
        for class in ObjectClass::ALL {
            let count = class_counts.get(&class).copied().unwrap_or(0);
            items.push((class.as_str(), count.to_string()));
        }
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Dataset Summary", &items);
    Ok(())
}

fn cmd_show(args: &DatasetArgs, index: usize, config: &PipelineConfig) -> Result<()> {
    let dataset = open_dataset(args, config, true)?;
    let record = dataset.get(index)?;

    println!("Record {} ({})", index, record.id);
    println!("  points: {}", record.points.len());
    println!("  boxes:  {}", record.boxes.len());
    for b in &record.boxes {
        let d = b.dimensions;
        let [x, y, z] = b.location;
        println!(
            "  {:<10} hwl=({:.2}, {:.2}, {:.2}) xyz=({:.2}, {:.2}, {:.2}) ry={:.2}",
            b.class, d.height, d.width, d.length, x, y, z, b.rotation_y
        );
    }
    Ok(())
}

fn cmd_export(
    args: &DatasetArgs,
    index: usize,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let dataset = open_dataset(args, config, true)?;
    let record = dataset.get(index)?;

    let points_path = output_dir.join(format!("{}_points.csv", record.id));
    let boxes_path = output_dir.join(format!("{}_boxes.csv", record.id));
    write_points_csv(&points_path, &record.points)?;
    write_boxes_csv(&boxes_path, &record.boxes)?;

    print_summary(
        "Export Complete",
        &[
            ("Record", record.id.clone()),
            ("Points", record.points.len().to_string()),
            ("Boxes", record.boxes.len().to_string()),
            ("Points CSV", points_path.display().to_string()),
            ("Boxes CSV", boxes_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_validate(args: &DatasetArgs, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let dataset = open_dataset(args, config, false)?;

    let pb = create_progress(dataset.len(), "Validating records");
    let failures: Vec<(String, String)> = (0..dataset.len())
        .into_par_iter()
        .filter_map(|i| {
            let outcome = dataset.get(i);
            pb.inc(1);
            outcome
                .err()
                .map(|e| (dataset.ids()[i].clone(), e.to_string()))
        })
        .collect();
    pb.finish_and_clear();

    for (id, message) in &failures {
        error!("{}: {}", id, message);
    }

    print_summary(
        "Validation Complete",
        &[
            ("Dataset", dataset.root().display().to_string()),
            ("Split", dataset.split().to_string()),
            ("Records", dataset.len().to_string()),
            ("Failures", failures.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} of {} records failed to load", failures.len(), dataset.len()))
    }
}
