//! voxcrate command-line interface
//!
//! Subcommands:
//! - `preprocess`: voxelize one fold of a dataset into `.npy` grids
//! - `inspect`: summarize (and optionally draw) the grids of a split
//! - `batches`: dry-run the batch path with a baseline classifier

mod settings;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;
use voxcrate_algorithms::{OriginPolicy, RotationAugmentation, ScalePolicy, Voxelizer};
use voxcrate_core::OccupancyPolicy;
use voxcrate_dataset::{
    evaluate, predict_all, report_line, BatchGenerator, DatasetBuilder, FailurePolicy, PriorClassifier,
    ProjectionVisualizer, Split,
};
use voxcrate_io::{BinPointReader, GridStore};

use settings::{load_labels, PreprocessSettings};

/// voxcrate - point cloud voxelization for VoxNet-style classifiers
#[derive(Parser, Debug)]
#[command(name = "voxcrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Voxelize one fold into persisted grids
    Preprocess(PreprocessArgs),
    /// Summarize the grids stored for one split
    Inspect(InspectArgs),
    /// Feed stored grids through a baseline classifier in batches
    Batches(BatchesArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum OccupancyArg {
    Binary,
    Count,
}

impl From<OccupancyArg> for OccupancyPolicy {
    fn from(arg: OccupancyArg) -> Self {
        match arg {
            OccupancyArg::Binary => OccupancyPolicy::Binary,
            OccupancyArg::Count => OccupancyPolicy::Count,
        }
    }
}

#[derive(Args, Debug)]
struct PreprocessArgs {
    /// JSON settings file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset directory holding objects/ and folds/
    #[arg(short, long)]
    dataset_dir: Option<PathBuf>,

    /// Fold index (folds/fold<N>.txt)
    #[arg(short, long)]
    fold: Option<usize>,

    /// Output directory for the generated grids
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// training or testing
    #[arg(short, long)]
    split: Option<Split>,

    /// Remove the output directory before writing
    #[arg(long)]
    clear_output: bool,

    /// Log a top-down rendering of every written grid
    #[arg(long)]
    visualize: bool,

    /// Cells per axis
    #[arg(long)]
    resolution: Option<usize>,

    /// Fixed cell edge length; keeps a fixed origin from the settings file,
    /// otherwise centers the grid on each object
    #[arg(long, conflicts_with = "adaptive")]
    cell_size: Option<f32>,

    /// Scale every object so its longest axis spans the grid
    #[arg(long)]
    adaptive: bool,

    #[arg(long, value_enum)]
    occupancy: Option<OccupancyArg>,

    /// Rotated copies per object about the vertical axis
    #[arg(long)]
    rotations: Option<usize>,

    /// Process entries one at a time
    #[arg(long)]
    sequential: bool,

    /// Worker threads for parallel processing
    #[arg(long)]
    threads: Option<usize>,

    /// Stop on the first malformed point file instead of skipping it
    #[arg(long)]
    abort_on_malformed: bool,

    /// JSON label dictionary (name -> id)
    #[arg(long)]
    labels: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Split directory, e.g. npy_generated/training
    dir: PathBuf,

    #[arg(long)]
    labels: Option<PathBuf>,

    /// Draw the first N grids
    #[arg(long, default_value_t = 0)]
    show: usize,
}

#[derive(Args, Debug)]
struct BatchesArgs {
    /// Split directory, e.g. npy_generated/testing
    dir: PathBuf,

    #[arg(short, long, default_value_t = 32)]
    batch_size: usize,

    /// Shuffle seed; store order when unset
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    labels: Option<PathBuf>,

    /// Print one report line per sample
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Preprocess(args) => preprocess(args),
        Command::Inspect(args) => inspect(args),
        Command::Batches(args) => batches(args),
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

/// Merge the settings file with command-line overrides
fn resolve_settings(args: &PreprocessArgs) -> Result<PreprocessSettings> {
    let mut settings = match &args.config {
        Some(path) => PreprocessSettings::from_file(path)?,
        None => PreprocessSettings::default(),
    };

    let build = &mut settings.build;
    if let Some(dir) = &args.dataset_dir {
        build.dataset_dir = dir.clone();
    }
    if let Some(fold) = args.fold {
        build.fold = fold;
    }
    if let Some(dir) = &args.output_dir {
        build.output_dir = dir.clone();
    }
    if let Some(split) = args.split {
        build.split = split;
    }
    build.clear_output |= args.clear_output;
    build.visualize |= args.visualize;
    if let Some(steps) = args.rotations {
        build.augmentation = RotationAugmentation::new(steps)?;
    }
    if args.sequential {
        build.parallel.enabled = false;
    }
    if let Some(threads) = args.threads {
        build.parallel.num_threads = Some(threads);
    }
    if args.abort_on_malformed {
        build.malformed_policy = FailurePolicy::Abort;
    }

    let voxelizer = &mut settings.voxelizer;
    if let Some(resolution) = args.resolution {
        voxelizer.resolution = resolution;
    }
    if args.adaptive {
        voxelizer.scale = ScalePolicy::Adaptive;
    } else if let Some(cell_size) = args.cell_size {
        let origin = match voxelizer.scale {
            ScalePolicy::Fixed { origin, .. } => origin,
            ScalePolicy::Adaptive => OriginPolicy::Centered,
        };
        voxelizer.scale = ScalePolicy::Fixed { cell_size, origin };
    }
    if let Some(occupancy) = args.occupancy {
        voxelizer.occupancy = occupancy.into();
    }

    if let Some(labels) = &args.labels {
        settings.labels = Some(labels.clone());
    }

    Ok(settings)
}

fn preprocess(args: PreprocessArgs) -> Result<()> {
    let settings = resolve_settings(&args)?;
    let labels = settings.label_dictionary()?;
    let reader = BinPointReader::new(settings.layout.clone()).context("invalid point record layout")?;
    let voxelizer = Voxelizer::new(settings.voxelizer).context("invalid voxelizer configuration")?;

    info!(
        "Preprocessing fold {} of {} into {}",
        settings.build.fold,
        settings.build.dataset_dir.display(),
        settings.build.output_dir.display()
    );

    let builder = DatasetBuilder::new(reader, voxelizer, &labels, settings.build.clone())?;
    let report = builder.run().context("dataset build failed")?;

    println!(
        "{} grids written to {}, {} samples skipped",
        report.written.len(),
        builder.store().dir().display(),
        report.skipped.len()
    );
    for skipped in &report.skipped {
        println!("  skipped {} [{}]: {}", skipped.source_name, skipped.sample_index, skipped.reason);
    }
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let labels = load_labels(args.labels.as_deref())?;
    let store = GridStore::open(&args.dir);
    let index = store.read_index()?;
    let samples = store.list()?;

    match &index {
        Some(index) => println!(
            "{}: {} samples, resolution {}, {:?} occupancy",
            args.dir.display(),
            index.samples.len(),
            index.resolution,
            index.occupancy
        ),
        None => println!("{}: {} grid files, no index", args.dir.display(), samples.len()),
    }

    let mut per_class = std::collections::BTreeMap::new();
    for sample in &samples {
        match sample.record(&labels) {
            Ok(record) => *per_class.entry(record.label.to_string()).or_insert(0usize) += 1,
            Err(e) => println!("  {}: {}", sample.path.display(), e),
        }
    }
    for (label, count) in &per_class {
        println!("  {:<20} {}", label, count);
    }

    let policy = index.map(|i| i.occupancy).unwrap_or(OccupancyPolicy::Count);
    let visualizer = ProjectionVisualizer::new();
    for sample in samples.iter().take(args.show) {
        let grid = store.load(&sample.path, policy)?;
        println!(
            "{} sample {}: {} occupied cells",
            sample.stem,
            sample.sample_index,
            grid.occupied_count()
        );
        print!("{}", visualizer.render(&grid));
    }
    Ok(())
}

fn batches(args: BatchesArgs) -> Result<()> {
    let labels = load_labels(args.labels.as_deref())?;
    let generator = BatchGenerator::from_store(GridStore::open(&args.dir), &labels, args.batch_size)?;
    if generator.is_empty() {
        bail!("no grids found in {}", args.dir.display());
    }
    info!(
        "{} samples in {} batches of up to {}",
        generator.len(),
        generator.num_batches(),
        generator.batch_size()
    );

    let truth: Vec<u32> = generator.records().map(|r| r.label.id).collect();
    let classifier = PriorClassifier::fit(&truth, labels.len())?;

    let results = match args.seed {
        Some(seed) => predict_all(&classifier, generator.epoch(&mut StdRng::seed_from_u64(seed)))?,
        None => predict_all(&classifier, generator.epoch_in_order())?,
    };

    if args.verbose {
        for (record, prediction) in &results {
            println!("{}: {}", record.storage_file_name(), report_line(prediction, record.label.id, &labels)?);
        }
    }

    let predicted: Vec<u32> = results.iter().map(|(_, p)| p.class).collect();
    let actual: Vec<u32> = results.iter().map(|(r, _)| r.label.id).collect();
    let evaluation = evaluate(&predicted, &actual, labels.len())?;
    print!("{}", evaluation.report(&labels));
    Ok(())
}
