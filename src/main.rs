use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use paper_digest::config::{find_config_file, load_config, Config, LOCAL_CONFIG_FILE};
use paper_digest::pipeline::{Pipeline, PipelineError, RunReport};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Digest - rank recent arXiv papers with LLMs and deliver a digest
#[derive(Parser, Debug)]
#[command(name = "paper-digest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rank recent arXiv papers with LLMs and deliver a digest by email or webhook", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Log line format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

/// Log line format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline once: fetch, rank, analyze and deliver
    Run,

    /// Write a default configuration file
    Init {
        /// Where to write (default: ./paper-digest.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration with secrets masked
    ShowConfig,
}

/// Print environment variables and exit
fn print_env_vars() {
    println!("Paper Digest Environment Variables");
    println!("==================================");
    println!();
    println!("Secrets:");
    println!("  LLM_API_KEY                 Key for the completion API");
    println!("  TAVILY_API_KEY              Enables community feedback search");
    println!("  BREVO_API_KEY               Enables email delivery (with sender and recipients)");
    println!("  BREVO_SENDER_EMAIL          Verified sender address");
    println!("  BREVO_SENDER_NAME           Sender display name (default: Paper Digest)");
    println!("  WEBHOOK_URL                 Enables webhook delivery");
    println!();
    println!("Defaults:");
    println!("  LLM_API_ENDPOINT            OpenAI-compatible base URL");
    println!("  SEARCH_TOPICS               Comma-separated topics");
    println!("  ACCEPTANCE_CRITERIA         What the reader wants to see");
    println!("  EMAIL_ADDRESS_LIST          Comma-separated recipients");
    println!();
    println!("Overrides (any config key, `__` between sections):");
    println!("  PAPER_DIGEST_SEARCH__DAYS_START=3");
    println!("  PAPER_DIGEST_PIPELINE__SCORE_THRESHOLD=60");
    println!("  PAPER_DIGEST_LLM__ANALYZER_MODEL=gpt-4o");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                    Rust logging level (e.g., debug, info, warn, error)");
    std::process::exit(0);
}

fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let level = if cli.quiet { "error" } else { log_level };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_digest={}", level)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Resolve the configuration file: `--config`, then the default locations
fn resolve_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(find_config_file);
    match &path {
        Some(path) => tracing::info!("Using config file: {}", path.display()),
        None => tracing::info!("No config file found; using defaults and environment"),
    }
    load_config(path.as_deref()).context("Failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show environment variables and exit if requested
    if cli.env {
        print_env_vars();
    }

    init_tracing(&cli);

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => {
            let config = resolve_config(&cli)?;
            let pipeline = Pipeline::from_config(config)?;

            let outcome = tokio::select! {
                outcome = pipeline.run() => outcome,
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted; abandoning run");
                    anyhow::bail!("Run interrupted");
                }
            };

            match outcome {
                Ok(report) => {
                    output_report(&report, cli.output);
                    Ok(())
                }
                Err(PipelineError::DeliveryFailed { summary, report }) => {
                    output_report(&report, cli.output);
                    anyhow::bail!("Delivery failed on every channel: {}", summary)
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Init { path, force } => {
            let path = path.clone().unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }

            let body = Config::template().to_toml()?;
            let content = format!(
                "# Paper Digest configuration\n\
                 # Secrets are read from the environment: LLM_API_KEY, TAVILY_API_KEY,\n\
                 # BREVO_API_KEY, WEBHOOK_URL. Run `paper-digest --env` for the full list.\n\n{}",
                body
            );
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Commands::ShowConfig => {
            let config = resolve_config(&cli)?;
            print!("{}", config.redacted().to_toml()?);
            if config.channel_count() == 0 {
                eprintln!("warning: no notification channel is configured; `run` will fail");
            }
            Ok(())
        }
    }
}

fn output_report(report: &RunReport, format: OutputFormat) {
    let actual_format = if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    };

    match actual_format {
        OutputFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize run report: {}", e),
        },
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};

            let mut summary = Table::new();
            summary.load_preset(comfy_table::presets::UTF8_FULL);
            summary.set_header(vec!["Stage", "Result"]);
            summary.add_row(vec!["Window".to_string(), report.window.to_string()]);
            summary.add_row(vec!["Fetched".to_string(), report.fetched.to_string()]);
            summary.add_row(vec![
                "Filter".to_string(),
                format!(
                    "{} kept, {}/{} batches failed",
                    report.kept, report.filter.failed_batches, report.filter.total_batches
                ),
            ]);
            summary.add_row(vec![
                "Scorer".to_string(),
                format!(
                    "{}/{} batches failed",
                    report.scorer.failed_batches, report.scorer.total_batches
                ),
            ]);
            summary.add_row(vec![
                "Selected".to_string(),
                format!(
                    "{} ({} analysis failures, {} degraded)",
                    report.selected,
                    report.analysis_failures(),
                    report.degraded.len()
                ),
            ]);
            if let Some(delivery) = &report.delivery {
                summary.add_row(vec!["Delivery".to_string(), delivery.summary()]);
            }
            println!("{summary}");

            if !report.entries.is_empty() {
                let mut table = Table::new();
                table.load_preset(comfy_table::presets::UTF8_FULL);
                table.set_header(vec!["Rating", "Score", "Title", "ID"]);
                for entry in &report.entries {
                    let title = if entry.title.chars().count() > 60 {
                        format!("{}...", entry.title.chars().take(57).collect::<String>())
                    } else {
                        entry.title.clone()
                    };
                    table.add_row(vec![
                        Cell::new(entry.rating).add_attribute(Attribute::Bold),
                        Cell::new(entry.selection_score),
                        Cell::new(title),
                        Cell::new(&entry.paper_id),
                    ]);
                }
                println!("{table}");
            }

            if let Some(notice) = &report.notice {
                println!("{}", notice);
            }
        }
        OutputFormat::Auto => unreachable!(),
    }
}
