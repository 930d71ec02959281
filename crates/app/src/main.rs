use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use services::sessions::{LiveQuiz, QuizLoopService};
use services::{Clock, ProgressLedger};
use storage::catalog::load_catalog_file;
use storage::repository::Storage;
use theory_core::model::{LicenseType, QuestionCatalog, QuizNumber};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod terminal;

use config::Config;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidType { raw: String },
    InvalidQuiz { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidType { raw } => write!(
                f,
                "invalid --type value: {raw} (expected one of {})",
                LicenseType::ALL.map(LicenseType::as_str).join(", ")
            ),
            ArgsError::InvalidQuiz { raw } => write!(f, "invalid --quiz value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app quiz   --type <type> --quiz <n> [--auto-next]");
    eprintln!("  app saved  --type <type>");
    eprintln!("  app wrong  --type <type>");
    eprintln!("  app scores --type <type>");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>     default {}", config::DEFAULT_DB_URL);
    eprintln!("  --catalog <path>      default {}", config::DEFAULT_CATALOG);
    eprintln!();
    eprintln!(
        "Types: {}",
        LicenseType::ALL.map(LicenseType::as_str).join(", ")
    );
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  THEORY_DB_URL, THEORY_CATALOG, THEORY_AUTO_ADVANCE, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    Saved,
    Wrong,
    Scores,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "saved" => Some(Self::Saved),
            "wrong" => Some(Self::Wrong),
            "scores" => Some(Self::Scores),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    catalog: PathBuf,
    license: LicenseType,
    quiz: Option<QuizNumber>,
    auto_next: bool,
}

impl Args {
    fn parse(
        cmd: Command,
        config: &Config,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(config.db_url.clone());
        let mut catalog = config.catalog_path.clone();
        let mut license = None;
        let mut quiz = None;
        let mut auto_next = config.auto_advance;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--catalog" => {
                    catalog = PathBuf::from(require_value(args, "--catalog")?);
                }
                "--type" => {
                    let value = require_value(args, "--type")?;
                    let parsed = value
                        .parse::<LicenseType>()
                        .map_err(|_| ArgsError::InvalidType { raw: value.clone() })?;
                    license = Some(parsed);
                }
                "--quiz" if cmd == Command::Quiz => {
                    let value = require_value(args, "--quiz")?;
                    let parsed = value
                        .parse::<QuizNumber>()
                        .map_err(|_| ArgsError::InvalidQuiz { raw: value.clone() })?;
                    quiz = Some(parsed);
                }
                "--auto-next" if cmd == Command::Quiz => auto_next = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let license = license.ok_or(ArgsError::MissingFlag { flag: "--type" })?;
        if cmd == Command::Quiz && quiz.is_none() {
            return Err(ArgsError::MissingFlag { flag: "--quiz" });
        }

        Ok(Self {
            db_url,
            catalog,
            license,
            quiz,
            auto_next,
        })
    }
}

fn is_in_memory(db_url: &str) -> bool {
    db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:")
}

/// Rewrite a SQLite URL or bare path to `sqlite://<absolute path>`, keeping any
/// `?query` suffix.
fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim();
    if is_in_memory(trimmed) {
        return trimmed.to_string();
    }

    let rest = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let (path_str, query) = match rest.split_once('?') {
        Some((path, query)) => (path, format!("?{query}")),
        None => (rest, String::new()),
    };
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}{query}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if is_in_memory(db_url) {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing(rust_log: &str) {
    // stdout belongs to the quiz; logs go to stderr.
    let stderr_layer = log_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    tracing_subscriber::registry()
        .with(EnvFilter::new(rust_log))
        .with(stderr_layer)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    init_tracing(&config.rust_log);

    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next().as_deref() {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(cmd, &config, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite and load the catalog here so services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let catalog: Arc<dyn QuestionCatalog> = Arc::new(load_catalog_file(&parsed.catalog)?);
    let clock = Clock::default_clock();
    let ledger = ProgressLedger::new(clock, Arc::clone(&storage.preferences));
    tracing::debug!(db = %parsed.db_url, catalog = %parsed.catalog.display(), "storage ready");

    let mut input = terminal::stdin_lines();
    match cmd {
        Command::Quiz => {
            let Some(quiz) = parsed.quiz else {
                return Err(ArgsError::MissingFlag { flag: "--quiz" }.into());
            };
            let service = QuizLoopService::new(clock, catalog, ledger)
                .with_auto_advance(parsed.auto_next);
            println!(
                "{}, quiz {quiz}",
                parsed.license.display_name()
            );
            let live = LiveQuiz::start(service, parsed.license, quiz)?;
            terminal::run_quiz(live, &mut input).await?;
        }
        Command::Saved => {
            terminal::run_saved(&ledger, catalog.as_ref(), parsed.license, &mut input).await?;
        }
        Command::Wrong => {
            terminal::run_wrong(&ledger, catalog.as_ref(), parsed.license, &mut input).await?;
        }
        Command::Scores => {
            terminal::print_scores(&ledger, catalog.as_ref(), parsed.license).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
