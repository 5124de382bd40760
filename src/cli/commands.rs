//! CLI command definitions for idc-sampler.
//!
//! Three commands:
//! - `sample`: walk a bucket (or local tree), keep a diverse sample, write CSV
//! - `inspect`: extract and print the metadata of one local DICOM file
//! - `check`: check a store is reachable and show the first object key

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::SamplerConfig;
use crate::diversity::{SelectionPolicy, SequencePolicy};
use crate::export::HeaderPolicy;
use crate::metadata::{ExtractionProfile, MetadataRecord, RecordExtractor};
use crate::store::{first_object_key, open_store};
use crate::traversal::{sample_to_csv, SampleReport};

/// Diverse DICOM metadata sampler for public imaging buckets.
#[derive(Parser)]
#[command(name = "idc-sampler")]
#[command(about = "Sample DICOM objects with diverse metadata from an object store")]
#[command(version)]
#[command(
    long_about = "idc-sampler walks a paginated object store depth-first, reads DICOM metadata from each object, and keeps records that add at least one unseen field value until the target count is reached.\n\nExample usage:\n  idc-sampler sample --prefix cptac_ccrcc/ -n 5 -o dicom_metadata.csv"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Collect a bounded, diverse sample and export it as CSV.
    Sample(SampleArgs),

    /// Print the metadata record extracted from one local DICOM file.
    Inspect(InspectArgs),

    /// Verify a store is reachable and report the first object under a prefix.
    Check(CheckArgs),
}

/// Where objects come from.
#[derive(clap::Args, Debug, Default)]
pub struct StoreArgs {
    /// Bucket name (default: idc-open-data-two).
    #[arg(long)]
    pub bucket: Option<String>,

    /// S3 endpoint URL.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Sample a local directory tree instead of a bucket.
    #[arg(long, value_name = "DIR")]
    pub local: Option<PathBuf>,

    /// Entries per listing page.
    #[arg(long)]
    pub page_size: Option<usize>,

    /// YAML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for `idc-sampler sample`.
#[derive(Parser, Debug)]
pub struct SampleArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Start prefix; repeat to walk several in order.
    #[arg(short, long = "prefix")]
    pub prefixes: Vec<String>,

    /// Number of records to accept before stopping.
    #[arg(short = 'n', long)]
    pub target: Option<usize>,

    /// Only fetch keys ending with this suffix.
    #[arg(short, long)]
    pub extension: Option<String>,

    /// CSV output path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Field set to extract.
    #[arg(long, value_enum)]
    pub profile: Option<ExtractionProfile>,

    /// How multi-valued fields compare.
    #[arg(long, value_enum)]
    pub sequence_policy: Option<SequencePolicy>,

    /// How CSV columns are chosen.
    #[arg(long, value_enum)]
    pub header_policy: Option<HeaderPolicy>,

    /// Which records enter the sample.
    #[arg(long, value_enum)]
    pub selection: Option<SelectionPolicy>,

    /// Leave a field out of the novelty check; repeatable (e.g. S3Key).
    #[arg(long = "exclude-field", value_name = "FIELD")]
    pub exclude_fields: Vec<String>,

    /// Start from a randomly chosen sub-prefix of each start prefix.
    #[arg(long)]
    pub random_prefix: bool,

    /// Seed for --random-prefix.
    #[arg(long, requires = "random_prefix")]
    pub seed: Option<u64>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `idc-sampler inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// DICOM file to read.
    pub file: PathBuf,

    /// Field set to extract.
    #[arg(long, value_enum, default_value = "enriched")]
    pub profile: ExtractionProfile,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `idc-sampler check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Prefix to look under.
    #[arg(short, long, default_value = "")]
    pub prefix: String,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Sample(args) => run_sample_command(args).await,
        Commands::Inspect(args) => run_inspect_command(args).await,
        Commands::Check(args) => run_check_command(args).await,
    }
}

/// Config file, then environment, then store flags.
fn base_config(store: &StoreArgs) -> anyhow::Result<SamplerConfig> {
    let mut config = match &store.config {
        Some(path) => SamplerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SamplerConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;

    if let Some(bucket) = &store.bucket {
        config.s3.bucket = bucket.clone();
    }
    if let Some(endpoint) = &store.endpoint {
        config.s3.endpoint = endpoint.clone();
    }
    if let Some(page_size) = store.page_size {
        config.s3.page_size = page_size;
    }
    if let Some(local) = &store.local {
        config.local_root = Some(local.clone());
    }
    Ok(config)
}

fn sample_config(args: &SampleArgs) -> anyhow::Result<SamplerConfig> {
    let mut config = base_config(&args.store)?;

    if !args.prefixes.is_empty() {
        config.prefixes = args.prefixes.clone();
    }
    if let Some(target) = args.target {
        config.target_count = target;
    }
    if let Some(extension) = &args.extension {
        config.extension = extension.clone();
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(profile) = args.profile {
        config.profile = profile;
    }
    if let Some(policy) = args.sequence_policy {
        config.sequence_policy = policy;
    }
    if let Some(policy) = args.header_policy {
        config.header_policy = policy;
    }
    if let Some(selection) = args.selection {
        config.selection = selection;
    }
    if !args.exclude_fields.is_empty() {
        config.excluded_fields = args.exclude_fields.clone();
    }
    if args.random_prefix {
        config.random_prefix = true;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn run_sample_command(args: SampleArgs) -> anyhow::Result<()> {
    let config = sample_config(&args)?;
    let store = open_store(config.local_root.as_deref(), &config.s3);

    let report = sample_to_csv(&config, store.as_ref()).await?;

    if args.json {
        let output = serde_json::json!({
            "status": "success",
            "store": store.describe(),
            "accepted": report.run.records.len(),
            "target": config.target_count,
            "start_prefixes": report.run.start_prefixes,
            "output": report.export.as_ref().map(|e| e.path.display().to_string()),
            "stats": report.run.stats,
            "records": report.run.records,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SampleReport) {
    println!("Start prefixes: {:?}", report.run.start_prefixes);
    for (key, record) in report.run.iter() {
        println!("\nMetadata for file (S3 Key): {}", key);
        print_record(record);
    }

    let stats = &report.run.stats;
    println!();
    println!(
        "Accepted {} record(s) from {} object(s) ({} unreadable, {} missing, {} rejected)",
        stats.accepted,
        stats.objects_fetched,
        stats.parse_failures,
        stats.missing_objects,
        stats.rejected
    );
    match &report.export {
        Some(summary) => println!(
            "Wrote {} row(s) x {} column(s) to {}",
            summary.rows,
            summary.columns.len(),
            summary.path.display()
        ),
        None => println!("No records accepted; no CSV written"),
    }
}

fn print_record(record: &MetadataRecord) {
    for (tag, value) in record.iter() {
        println!("{}: {}", tag, value);
    }
}

async fn run_inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let key = args.file.display().to_string();

    let record = RecordExtractor::new(args.profile).extract(&bytes, &key)?;
    info!(file = %key, fields = record.len(), "Extracted metadata");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

async fn run_check_command(args: CheckArgs) -> anyhow::Result<()> {
    let config = base_config(&args.store)?;
    let store = open_store(config.local_root.as_deref(), &config.s3);

    let first = first_object_key(store.as_ref(), &args.prefix).await?;

    if args.json {
        let output = serde_json::json!({
            "status": "success",
            "store": store.describe(),
            "prefix": args.prefix,
            "first_object": first,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match first {
            Some(key) => println!("{} is reachable; first object: {}", store.describe(), key),
            None => println!("{} is reachable; no objects under '{}'", store.describe(), args.prefix),
        }
    }
    Ok(())
}
