//! Stockpile CLI
//!
//! Command-line tool for validating, importing and exporting product CSV files.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use stockpile_core::{
    discover_import_files, export_records, find_duplicates, logging, missing_columns,
    parse_records, Action, Conflict, Decision, DecisionSource, ExportFormat, FixedDecision,
    HistoryEntry, ImportConfig, ImportFile, ImportHistory, ImportOutcome, ImportWorkflow,
    JsonFileStore, Notifier, ParseOptions, Record, RecordStore, ResolutionMode, Response,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Parser)]
#[command(name = "stockpile")]
#[command(about = "Product inventory CSV import with duplicate resolution", long_about = None)]
#[command(version)]
struct Cli {
    /// Import configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a CSV file has every required column
    Validate {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Parse and display the products in a CSV file
    Parse {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List the products in a CSV file that collide with the inventory
    Check {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Inventory store (JSON)
        #[arg(short, long)]
        store: PathBuf,
    },

    /// Import CSV files into the inventory
    Import {
        /// CSV files to import, in order
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Directories to search for CSV files
        #[arg(short, long)]
        dir: Vec<PathBuf>,

        /// Inventory store (JSON)
        #[arg(short, long)]
        store: PathBuf,

        /// Resolve every conflict with this action instead of prompting (replace, skip, rename)
        #[arg(short, long)]
        action: Option<String>,

        /// Honor each prompted decision instead of applying the last one to all
        #[arg(long)]
        per_conflict: bool,

        /// Append completed imports to this history file
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Export the inventory to a file
    Export {
        /// Inventory store (JSON)
        #[arg(short, long)]
        store: PathBuf,

        /// Output format (csv or json)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default import configuration to a file
    InitConfig {
        /// Output config file path
        #[arg(short, long, default_value = "stockpile.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show recorded imports
    History {
        /// History file
        #[arg(long)]
        history: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> stockpile_core::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _guard = logging::init_logging(cli.log_dir.as_deref(), filter)?;

    let config = match &cli.config {
        Some(path) => ImportConfig::load(path)?,
        None => ImportConfig::default(),
    };

    match cli.command {
        Commands::Validate { file } => cmd_validate(&config, &file),
        Commands::Parse { file, limit } => cmd_parse(&config, &file, limit),
        Commands::Check { file, store } => cmd_check(&config, &file, &store).await,
        Commands::Import {
            file,
            dir,
            store,
            action,
            per_conflict,
            history,
        } => {
            let mut config = config;
            if per_conflict {
                config.resolution_mode = ResolutionMode::PerConflict;
            }
            cmd_import(config, &file, &dir, &store, action.as_deref(), history.as_deref()).await
        }
        Commands::Export {
            store,
            format,
            output,
        } => cmd_export(&store, &format, &output).await,
        Commands::InitConfig { output, force } => cmd_init_config(&config, &output, force),
        Commands::History { history } => cmd_history(&history),
    }
}

fn read_text(path: &Path) -> stockpile_core::Result<String> {
    std::fs::read_to_string(path).map_err(|e| stockpile_core::Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn cmd_validate(config: &ImportConfig, file: &Path) -> stockpile_core::Result<()> {
    let text = read_text(file)?;
    let missing = missing_columns(&text, config);

    if missing.is_empty() {
        println!("{}: all required columns present", file.display());
        return Ok(());
    }

    println!("{}: missing required columns:", file.display());
    for column in &missing {
        println!("  {}", column);
    }
    println!();
    println!("Required columns: {}", config.required_columns.join(", "));
    std::process::exit(2);
}

fn cmd_parse(config: &ImportConfig, file: &Path, limit: Option<usize>) -> stockpile_core::Result<()> {
    let text = read_text(file)?;
    let batch = parse_records(&text, &ParseOptions::from_config(config));

    println!("File: {}", file.display());
    println!("Products: {}", batch.len());
    println!("Dropped rows: {}", batch.dropped_lines.len());
    if !batch.synthesized.is_empty() {
        println!("Generated ids: {}", batch.synthesized.len());
    }
    println!();

    let row_limit = limit.unwrap_or(batch.len());
    print_records(&batch.records[..row_limit.min(batch.len())]);
    if batch.len() > row_limit {
        println!("... ({} more rows)", batch.len() - row_limit);
    }

    if !batch.dropped_lines.is_empty() {
        let lines: Vec<String> = batch.dropped_lines.iter().map(|l| l.to_string()).collect();
        println!();
        println!("Dropped lines: {}", lines.join(", "));
    }

    Ok(())
}

async fn cmd_check(config: &ImportConfig, file: &Path, store_path: &Path) -> stockpile_core::Result<()> {
    let text = read_text(file)?;
    let batch = parse_records(&text, &ParseOptions::from_config(config));
    let existing = JsonFileStore::new(store_path).read().await?;

    let conflicts = find_duplicates(&existing, &batch.records);
    println!(
        "{} products parsed, {} already in the inventory of {}",
        batch.len(),
        conflicts.len(),
        existing.len()
    );

    for conflict in &conflicts {
        println!(
            "  {} (row {}): '{}' would collide with '{}'",
            conflict.incoming.id,
            conflict.batch_index + 1,
            conflict.incoming.name,
            conflict.existing.name
        );
    }

    Ok(())
}

async fn cmd_import(
    config: ImportConfig,
    files: &[PathBuf],
    dirs: &[PathBuf],
    store_path: &Path,
    action: Option<&str>,
    history_path: Option<&Path>,
) -> stockpile_core::Result<()> {
    let mut paths: Vec<PathBuf> = files.to_vec();
    if !dirs.is_empty() {
        paths.extend(discover_import_files(dirs, &config)?);
    }
    if paths.is_empty() {
        println!("No files to import.");
        return Ok(());
    }

    let mut decisions: Box<dyn DecisionSource> = match action {
        Some(action) => Box::new(FixedDecision(action.parse::<Action>()?)),
        None => Box::new(PromptDecisions::new()),
    };

    let mode = config.resolution_mode;
    let workflow = ImportWorkflow::new(JsonFileStore::new(store_path), ConsoleNotifier, config);
    let mut history = match history_path {
        Some(path) => Some(ImportHistory::load(path)?),
        None => None,
    };

    // Imports run one after another; the store is never written concurrently
    for path in &paths {
        let file = ImportFile::read(path).await?;
        println!("Importing {}", path.display());

        match workflow.import(&file, decisions.as_mut()).await? {
            ImportOutcome::Completed { report, records } => {
                println!("  Inventory now holds {} products", records.len());
                if let Some(history) = history.as_mut() {
                    history.add_entry(HistoryEntry::from_report(&report, mode));
                }
            }
            ImportOutcome::Rejected(_) => {}
            ImportOutcome::Cancelled => {
                println!("  Import cancelled, inventory unchanged");
            }
        }
    }

    if let (Some(history), Some(path)) = (history, history_path) {
        history.save(path)?;
    }

    Ok(())
}

async fn cmd_export(store_path: &Path, format: &str, output: &Path) -> stockpile_core::Result<()> {
    let format: ExportFormat = format.parse()?;
    let records = JsonFileStore::new(store_path).read().await?;

    let written = export_records(&records, format, output)?;
    println!("Exported {} products to {}", written, output.display());

    Ok(())
}

fn cmd_init_config(config: &ImportConfig, output: &Path, force: bool) -> stockpile_core::Result<()> {
    if output.exists() && !force {
        return Err(stockpile_core::Error::InvalidConfig(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        )));
    }

    config.save(output)?;
    println!("Wrote import configuration to {}", output.display());

    Ok(())
}

fn cmd_history(history_path: &Path) -> stockpile_core::Result<()> {
    let history = ImportHistory::load(history_path)?;

    if history.total_entries() == 0 {
        println!("No imports recorded.");
        return Ok(());
    }

    println!("Imports ({}):", history.total_entries());
    for entry in &history.entries {
        let stats = &entry.stats;
        println!(
            "  {}  {}  +{} added, {} replaced, {} skipped, {} renamed",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.file_name,
            stats.added,
            stats.replaced,
            stats.skipped,
            stats.renamed
        );
    }

    let totals = history.totals();
    println!();
    println!(
        "Totals: {} added, {} duplicates ({} replaced, {} skipped, {} renamed)",
        totals.added, totals.duplicates_found, totals.replaced, totals.skipped, totals.renamed
    );

    Ok(())
}

fn print_records(records: &[Record]) {
    println!("ID\tName\tPrice\tCategory\tStock\tDescription");
    println!("{}", "-".repeat(72));
    for record in records {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            record.id, record.name, record.price, record.category, record.stock, record.description
        );
    }
}

/// Prints notices: successes to stdout, failures to stderr
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, success: bool) {
        if success {
            println!("  {}", message);
        } else {
            eprintln!("  {}", message);
        }
    }
}

/// Asks about each conflict on stdin
struct PromptDecisions {
    lines: Lines<BufReader<Stdin>>,
}

impl PromptDecisions {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl DecisionSource for PromptDecisions {
    async fn decide(&mut self, conflict: &Conflict) -> Response {
        println!();
        println!(
            "Duplicate {} of {}: product id '{}'",
            conflict.position, conflict.total, conflict.incoming.id
        );
        println!("  existing: {}", describe(&conflict.existing));
        println!("  incoming: {}", describe(&conflict.incoming));

        loop {
            println!("[r]eplace, [s]kip, re[n]ame (add 'all' to apply to the rest), [c]ancel import:");
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                // Closing stdin abandons the import
                Ok(None) | Err(_) => return Response::Cancel,
            };
            match parse_answer(&line) {
                Some(response) => return response,
                None => println!("Unrecognized answer '{}'", line.trim()),
            }
        }
    }
}

fn describe(record: &Record) -> String {
    format!(
        "{} | {} | {} | stock {}",
        record.name, record.category, record.price, record.stock
    )
}

/// Parse a prompt answer such as "r", "skip all" or "cancel"
fn parse_answer(line: &str) -> Option<Response> {
    let mut words = line.split_whitespace().map(|w| w.to_lowercase());
    let first = words.next()?;

    let action = match first.as_str() {
        "c" | "cancel" | "q" | "quit" => return Some(Response::Cancel),
        "r" => Action::Replace,
        "s" => Action::Skip,
        "n" => Action::Rename,
        other => other.parse::<Action>().ok()?,
    };

    let apply_to_all = match words.next().as_deref() {
        None => false,
        Some("a") | Some("all") => true,
        Some(_) => return None,
    };
    if words.next().is_some() {
        return None;
    }

    Some(Response::Resolve(Decision::new(action, apply_to_all)))
}
