use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vertretung::config::{Config, LoggingConfig};
use vertretung::content::{build_servable_content, TenantSource};
use vertretung::crawler::WorkerRegistry;
use vertretung::export::normalize;
use vertretung::merge::{merge_day_schedules, MergeOptions};
use vertretung::models::DaySchedule;
use vertretung::parser::{parse_plan_file, Locale, ParseOptions};

#[derive(Parser)]
#[command(
    name = "vertretung",
    version,
    about = "Indiware schedule crawler: fetches, merges and compiles substitution plans",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json), overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll all configured institutions until Ctrl-C
    Run {
        /// TOML configuration file; environment variables are used otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Parse one plan file and print the day schedule as JSON
    Parse {
        /// Plan file path
        file: PathBuf,

        /// Accept any class name (teacher-keyed files)
        #[arg(long, default_value = "false")]
        relaxed: bool,

        /// Language of the plan date (de, en)
        #[arg(long, default_value = "de")]
        locale: Locale,
    },

    /// Parse, merge and compile local plan files into servable content
    Compile {
        /// Plan file paths
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Gate the content behind this password
        #[arg(long)]
        password: Option<String>,

        /// Use unprefixed legacy naming
        #[arg(long, default_value = "false")]
        legacy: bool,

        /// Skip course selection
        #[arg(long, default_value = "false")]
        without_courses: bool,
    },

    /// Print the normalized persistence batch of one plan file
    Export {
        /// Plan file path
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Run { config } => Some(load_config(config.as_deref())?),
        _ => None,
    };

    // Initialize tracing/logging
    let logging = config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    setup_tracing(&logging, cli.log_format.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Run { .. } => run(config.unwrap_or_default()).await?,
        Commands::Parse {
            file,
            relaxed,
            locale,
        } => {
            let options = ParseOptions {
                locale,
                relaxed_class_names: relaxed,
                ..ParseOptions::default()
            };
            let schedule = read_plan(&file, &options)?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        Commands::Compile {
            files,
            password,
            legacy,
            without_courses,
        } => {
            let options = ParseOptions::default();
            let days = files
                .iter()
                .map(|file| read_plan(file, &options))
                .collect::<Result<Vec<_>>>()?;

            let schedule = merge_day_schedules(&days, MergeOptions::default())?;
            let content = build_servable_content(
                legacy,
                TenantSource {
                    schedule: &schedule,
                    password: password.as_deref(),
                    with_courses: !without_courses,
                },
                None,
            )?;
            println!("{}", serde_json::to_string_pretty(&content)?);
        }
        Commands::Export { file } => {
            let options = ParseOptions {
                relaxed_class_names: true,
                ..ParseOptions::default()
            };
            let schedule = read_plan(&file, &options)?;
            println!("{}", serde_json::to_string_pretty(&normalize(&schedule))?);
        }
    }

    Ok(())
}

fn setup_tracing(logging: &LoggingConfig, format: Option<&str>, verbose: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(logging.filter_directive(verbose))
        .context("Invalid log level")?;

    match format.unwrap_or(logging.format.as_str()) {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn read_plan(path: &Path, options: &ParseOptions) -> Result<DaySchedule> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = vertretung::utils::decode_body(&bytes, "")?;
    let schedule = parse_plan_file(&text, options)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(schedule)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(config: Config) -> Result<()> {
    if config.institutions.is_empty() {
        tracing::warn!("no institutions configured");
    }

    let registry = WorkerRegistry::start(&config)?;
    tracing::info!(workers = registry.handles().len(), "vertretung started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("shutting down");
    registry.shutdown().await?;

    Ok(())
}
