//! Thin command-line front end over the pipeline. All business logic
//! lives in the library; this binary only parses arguments, wires the
//! collaborators together, and prints results.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use jobpilot::adapter::AdapterRegistry;
use jobpilot::browser::NullBrowserLauncher;
use jobpilot::config::{load_config, ApplyMode, Config};
use jobpilot::db::{job_repo, Database};
use jobpilot::docs::MarkdownDocumentBuilder;
use jobpilot::error::{ConfigError, JobpilotError};
use jobpilot::pipeline::Pipeline;
use jobpilot::report;
use jobpilot::DiscoveryCriteria;

const USAGE: &str = "\
Usage: jobpilot [--config <path>] <command> [options]

Commands:
  discover <urls-file>                    Ingest job URLs from a text file
  discover-board <source> <board>         Pull listings from a platform board
      [--limit <n>]
  enrich <job-id-or-url>                  Fetch platform detail for one job
  prepare <job-id-or-url>                 Generate tailored documents
  apply <job-id-or-url>                   Run one apply attempt
      [--auto] [--assisted] [--dry-run]
  batch [--limit <n>] [--auto]            Apply to prepared jobs in sequence
      [--dry-run]
  list [--limit <n>]                      List tracked jobs
  status                                  Per-status job counts
  report [--format json|csv]              Export the tracker";

fn init_logging() {
    tracing_log::LogTracer::init().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".jobpilot").join("config.json"))
}

struct Args {
    config_path: Option<PathBuf>,
    command: String,
    positional: Vec<String>,
    auto: bool,
    assisted: bool,
    dry_run: bool,
    limit: Option<u64>,
    format: Option<String>,
}

fn parse_args(raw: Vec<String>) -> Result<Args, String> {
    let mut args = Args {
        config_path: None,
        command: String::new(),
        positional: Vec::new(),
        auto: false,
        assisted: false,
        dry_run: false,
        limit: None,
        format: None,
    };

    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().ok_or("--config requires a path")?;
                args.config_path = Some(PathBuf::from(value));
            }
            "--limit" => {
                let value = iter.next().ok_or("--limit requires a number")?;
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --limit value '{}'", value))?;
                args.limit = Some(parsed);
            }
            "--format" => {
                let value = iter.next().ok_or("--format requires json or csv")?;
                args.format = Some(value);
            }
            "--auto" => args.auto = true,
            "--assisted" => args.assisted = true,
            "--dry-run" => args.dry_run = true,
            "--help" | "-h" => return Err(String::new()),
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{}'", other));
            }
            other => {
                if args.command.is_empty() {
                    args.command = other.to_string();
                } else {
                    args.positional.push(other.to_string());
                }
            }
        }
    }

    if args.command.is_empty() {
        return Err(String::new());
    }
    if args.auto && args.assisted {
        return Err("--auto and --assisted are mutually exclusive".to_string());
    }
    Ok(args)
}

fn mode_override(args: &Args) -> Option<ApplyMode> {
    if args.auto {
        Some(ApplyMode::Auto)
    } else if args.assisted {
        Some(ApplyMode::Assisted)
    } else {
        None
    }
}

fn load_config_from(args: &Args) -> Result<Config, JobpilotError> {
    let path = args
        .config_path
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| ConfigError::Validation {
            message: "could not determine config path; pass --config".to_string(),
        })?;
    Ok(load_config(&path)?)
}

fn positional<'a>(args: &'a Args, index: usize, name: &str) -> Result<&'a str, JobpilotError> {
    args.positional
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| {
            JobpilotError::Config(ConfigError::Validation {
                message: format!("missing argument <{}>", name),
            })
        })
}

fn print_record(record: &jobpilot::JobRecord) {
    println!(
        "{}  [{}]  {}  {} - {}",
        record.job_id, record.status, record.platform, record.company, record.title
    );
    if let Some(detail) = &record.status_detail {
        println!("    detail: {}", detail);
    }
}

async fn run(args: Args) -> Result<(), JobpilotError> {
    let config = Arc::new(load_config_from(&args)?);
    let db_path = config
        .database_path()
        .ok_or_else(|| ConfigError::Validation {
            message: "could not determine database path; set database_path".to_string(),
        })?;
    let db = Database::open(&db_path)?;
    let registry = AdapterRegistry::with_default_adapters(&config)?;
    let pipeline = Pipeline::new(
        config.clone(),
        db.clone(),
        registry,
        Box::new(MarkdownDocumentBuilder::new()),
        Arc::new(NullBrowserLauncher),
    );

    match args.command.as_str() {
        "discover" => {
            let path = PathBuf::from(positional(&args, 0, "urls-file")?);
            let summary = pipeline.discover_from_file(&path)?;
            println!(
                "{} new, {} duplicate, {} skipped",
                summary.inserted, summary.duplicates, summary.skipped
            );
        }
        "discover-board" => {
            let source = positional(&args, 0, "source")?.to_string();
            let board = positional(&args, 1, "board")?.to_string();
            let criteria = DiscoveryCriteria {
                board,
                limit: args.limit.unwrap_or(50) as usize,
            };
            let summary = pipeline.discover_from_source(&source, &criteria).await?;
            println!("{} new, {} duplicate", summary.inserted, summary.duplicates);
        }
        "enrich" => {
            let record = pipeline.enrich_job(positional(&args, 0, "job")?).await?;
            print_record(&record);
        }
        "prepare" => {
            let record = pipeline.prepare_job(positional(&args, 0, "job")?).await?;
            print_record(&record);
            if let Some(path) = &record.resume_path {
                println!("    resume: {}", path);
            }
            if let Some(path) = &record.cover_letter_path {
                println!("    cover letter: {}", path);
            }
        }
        "apply" => {
            let item = pipeline
                .apply_job(positional(&args, 0, "job")?, mode_override(&args), args.dry_run)
                .await?;
            println!("{}  {:?}", item.job_id, item.outcome);
        }
        "batch" => {
            let items = pipeline
                .apply_batch(args.limit.unwrap_or(10), mode_override(&args), args.dry_run)
                .await?;
            for item in &items {
                println!("{}  {:?}", item.job_id, item.outcome);
            }
            println!("{} jobs processed", items.len());
        }
        "list" => {
            let records = job_repo::list(&db, args.limit.unwrap_or(50))?;
            for record in &records {
                print_record(record);
            }
            println!("{} jobs", records.len());
        }
        "status" => {
            for (status, count) in job_repo::status_counts(&db)? {
                println!("{:>6}  {}", count, status);
            }
        }
        "report" => {
            let dir = config.output_directory.join(&config.reports_directory);
            let path = match args.format.as_deref() {
                Some("csv") => report::export_csv(&db, &dir)?,
                Some("json") | None => report::export_json(&db, &dir)?,
                Some(other) => {
                    return Err(ConfigError::Validation {
                        message: format!("unknown report format '{}'", other),
                    }
                    .into());
                }
            };
            println!("Report written to {}", path.display());
        }
        other => {
            return Err(ConfigError::Validation {
                message: format!("unknown command '{}'", other),
            }
            .into());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();

    let args = match parse_args(std::env::args().skip(1).collect()) {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}\n", message);
            }
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
