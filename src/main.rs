//! CLI entry point for `emlinfo`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use emlinfo::batch::{Batch, BatchOptions, BatchStats};
use emlinfo::config::Config;
use emlinfo::error::EmlError;

#[derive(Parser)]
#[command(
    name = "emlinfo",
    version,
    about = "Extract metadata from EML files into an XML document",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// EML files or directories (searched recursively)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,

    /// Directory for emlOutput.xml
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Include every header of each message in the output
    #[arg(long)]
    headers: bool,

    /// Store non-text parts of each message below DIR
    #[arg(long, value_name = "DIR")]
    attachments: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = emlinfo::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match (cli.debug, cli.verbose) {
        (true, _) => "debug",
        (false, 0) => config.general.log_level.as_str(),
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => {
            if cli.paths.is_empty() {
                anyhow::bail!("at least one EML file or directory is required (see --help)");
            }
            if let Some(dir) = cli.output {
                config.output.directory = dir;
            }
            if cli.headers {
                config.output.include_headers = true;
            }
            if let Some(dir) = cli.attachments {
                config.attachments.extract = true;
                config.attachments.directory = Some(dir);
            }
            cmd_run(&cli.paths, &config, cli.json)
        }
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_file = emlinfo::config::log_file_path(config);
    let log_dir = log_file.parent().map(Path::to_path_buf);
    match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::never(dir, "emlinfo.log");
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
        None => {
            // Fall back to stderr only
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
        }
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "emlinfo", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Process every path into one output document and print a summary.
fn cmd_run(paths: &[PathBuf], config: &Config, json: bool) -> anyhow::Result<()> {
    let output_dir = &config.output.directory;
    if output_dir.exists() && !output_dir.is_dir() {
        anyhow::bail!("Output '{}' is not a directory", output_dir.display());
    }
    std::fs::create_dir_all(output_dir).map_err(|e| EmlError::io(output_dir, e))?;

    let output_path = config.output_path();
    let file = File::create(&output_path).map_err(|e| EmlError::io(&output_path, e))?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {pos} files  {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let mut batch = Batch::new(
        BufWriter::new(file),
        &output_path,
        BatchOptions::from_config(config),
    )?;

    for path in paths {
        let result = batch.process_path(path, &|current| {
            pb.inc(1);
            pb.set_message(current.display().to_string());
        });
        if let Err(e) = result {
            pb.finish_and_clear();
            tracing::error!(error = %e, "Stopping");
            return Err(e.into());
        }
    }

    let outcome = batch.finish()?;
    pb.finish_and_clear();

    let output_size = std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);
    let elapsed = start.elapsed();

    if json {
        print_summary_json(&output_path, output_size, &outcome.stats, elapsed)
    } else {
        print_summary_table(&output_path, output_size, &outcome.stats, elapsed);
        Ok(())
    }
}

/// Print the run summary in a human-readable table.
fn print_summary_table(output: &Path, output_size: u64, stats: &BatchStats, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Output", output.display());
    println!("  {:<20} {}", "Output size", format_size(output_size, BINARY));
    println!("  {:<20} {}", "Files seen", stats.files_seen);
    println!("  {:<20} {}", "Emails written", stats.emails_written);
    println!("  {:<20} {}", "Rejected", stats.rejected);
    println!("  {:<20} {}", "Failed", stats.failed);
    println!("  {:<20} {}", "Placeholders", stats.placeholders);
    println!("  {:<20} {}", "Broken threads", stats.broken_threads);
    if stats.attachments > 0 {
        println!("  {:<20} {}", "Attachments", stats.attachments);
    }
    println!("  {:<20} {:.2?}", "Time", elapsed);
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(
    output: &Path,
    output_size: u64,
    stats: &BatchStats,
    elapsed: Duration,
) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "output": output.to_string_lossy(),
        "output_size": output_size,
        "stats": stats,
        "elapsed_ms": elapsed.as_millis(),
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
