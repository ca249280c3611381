use std::process::ExitCode;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_tox21::catalog::Catalog;
use kira_tox21::config::{ConfigLoader, ResolvedConfig};
use kira_tox21::domain::{OnError, OutputFormat};
use kira_tox21::error::KiraError;
use kira_tox21::output::{BuildResult, JsonOutput, write_table};
use kira_tox21::pipeline::{CancelToken, Pipeline, RunOptions, RunReport};
use kira_tox21::store::{CacheOptions, CachedClient, Store};
use kira_tox21::tripod::{AssayClient, TripodHttpClient};
use kira_tox21::tui::Tui;

#[derive(Parser)]
#[command(name = "kira-tox21")]
#[command(about = "Builds the full Tox21 dataset from the NIH raw assay data")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch every assay and write the fused dataset")]
    Build(BuildArgs),
    #[command(about = "List the Tox21 assay catalog")]
    Catalog,
    #[command(about = "Inspect or clear the archive cache")]
    Cache(CacheArgs),
}

#[derive(Args)]
struct BuildArgs {
    output: Utf8PathBuf,

    #[arg(long)]
    format: Option<OutputFormat>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long = "assay")]
    assays: Vec<String>,

    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    retries: Option<usize>,

    #[arg(long)]
    on_error: Option<OnError>,

    #[arg(long)]
    tripod_url: Option<String>,

    #[arg(long)]
    no_cache: bool,

    #[arg(long)]
    refresh: bool,

    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,

    #[arg(long, global = true)]
    cache_dir: Option<Utf8PathBuf>,
}

#[derive(Subcommand)]
enum CacheCommand {
    #[command(about = "List cached assay archives")]
    List,
    #[command(about = "Remove every cached archive")]
    Clear,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error.root() {
        KiraError::AssayNotFound(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_) => 2,
        KiraError::TripodHttp(_) | KiraError::TripodStatus { .. } => 3,
        KiraError::ArchiveFormat(_) => 4,
        KiraError::FusionConflict(_) => 5,
        KiraError::Cancelled => 130,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => run_build(args, cli.non_interactive),
        Commands::Catalog => {
            JsonOutput::print_catalog(&Catalog::tox21().entries()).into_diagnostic()?;
            Ok(())
        }
        Commands::Cache(args) => run_cache(args),
    }
}

fn run_build(args: BuildArgs, non_interactive: bool) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(args.config.as_deref())?;
    let resolved = apply_overrides(resolved, &args)?;
    let format = args
        .format
        .or_else(|| infer_format(&args.output))
        .unwrap_or(resolved.format);

    let client = build_client(&resolved, &args)?;
    let pipeline = Pipeline::new(
        client,
        RunOptions {
            on_error: resolved.on_error,
        },
    );
    let catalog = resolved.catalog;
    let cancel = CancelToken::new();

    let report: RunReport = if non_interactive {
        pipeline.run(&catalog, &JsonOutput, &cancel)?
    } else {
        let mut tui = Tui::new(catalog.len(), cancel.clone());
        tui.run(move |sink| pipeline.run(&catalog, sink, &cancel))?
    };

    let output = write_table(&report.table, &args.output, format)?;
    let result = BuildResult {
        output,
        summary: report.summary,
    };
    if non_interactive {
        JsonOutput::print_build(&result).into_diagnostic()?;
    } else {
        print_build_summary(&result);
    }
    Ok(())
}

fn apply_overrides(
    mut resolved: ResolvedConfig,
    args: &BuildArgs,
) -> Result<ResolvedConfig, KiraError> {
    if !args.assays.is_empty() {
        resolved.catalog = Catalog::subset(&args.assays)?;
    }
    if let Some(timeout) = args.timeout {
        resolved.tripod.timeout = Duration::from_secs(timeout);
    }
    if let Some(retries) = args.retries {
        resolved.tripod.retries = retries;
    }
    if let Some(url) = &args.tripod_url {
        resolved.tripod.base_url = url.clone();
    }
    if let Some(on_error) = args.on_error {
        resolved.on_error = on_error;
    }
    if args.no_cache {
        resolved.cache = false;
    }
    Ok(resolved)
}

fn infer_format(path: &Utf8Path) -> Option<OutputFormat> {
    match path.extension() {
        Some("parquet") | Some("pq") => Some(OutputFormat::Parquet),
        Some("csv") | Some("gz") => Some(OutputFormat::Csv),
        _ => None,
    }
}

fn build_client(
    resolved: &ResolvedConfig,
    args: &BuildArgs,
) -> Result<Box<dyn AssayClient>, KiraError> {
    let tripod = TripodHttpClient::with_options(resolved.tripod.clone())?;
    if !resolved.cache {
        return Ok(Box::new(tripod));
    }
    let store = open_store(args.cache_dir.clone())?;
    store.ensure_cache_root()?;
    Ok(Box::new(CachedClient::new(
        store,
        tripod,
        CacheOptions {
            refresh: args.refresh,
        },
    )))
}

fn open_store(cache_dir: Option<Utf8PathBuf>) -> Result<Store, KiraError> {
    match cache_dir {
        Some(root) => Ok(Store::new_with_root(root)),
        None => Store::new(),
    }
}

fn run_cache(args: CacheArgs) -> miette::Result<()> {
    let store = open_store(args.cache_dir)?;
    match args.command {
        CacheCommand::List => {
            let entries = store.list_cached()?;
            JsonOutput::print_cache(&entries).into_diagnostic()?;
        }
        CacheCommand::Clear => {
            store.clear()?;
            println!("cleared {}", store.cache_root());
        }
    }
    Ok(())
}

fn print_build_summary(result: &BuildResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    let summary = &result.summary;
    println!("{cyan}KIRA-TOX21 summary{reset}");
    println!(
        "{green}Compounds: {}   Assays: {}   Elapsed: {:.1}s{reset}",
        summary.compounds,
        summary.assays,
        summary.elapsed_ms as f64 / 1000.0
    );
    println!(
        "{green}Output: {} ({}{}){reset}",
        result.output.path,
        result.output.format,
        if result.output.gzip { ", gzip" } else { "" }
    );
    if !summary.substituted.is_empty() {
        println!(
            "{yellow}Substituted with missing labels: {}{reset}",
            summary
                .substituted
                .iter()
                .map(|assay| assay.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
