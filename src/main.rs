use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use growth_coach::adapters::ai::{AnthropicConfig, AnthropicProvider};
use growth_coach::adapters::embedding::HashingEmbedder;
use growth_coach::adapters::memory::{InMemoryMemoryStore, InMemorySessionRepository};
use growth_coach::adapters::postgres::{self, PostgresMemoryStore, PostgresSessionRepository};
use growth_coach::application::workflow::response::render_plan;
use growth_coach::application::{
    CoachService, InspectError, InspectQuery, InspectedSession, Inspector, RetryPolicy,
    SessionHandle, SessionManager, TurnReport, WorkflowEngine, WorkflowError,
};
use growth_coach::config::{AppConfig, ConfigError, LogFormat, StoreBackend, ValidationError};
use growth_coach::domain::foundation::UserId;
use growth_coach::domain::session::SessionError;
use growth_coach::domain::vault::{CryptoVault, VaultError};
use growth_coach::ports::{AIError, MemoryStore, SessionRepository, StoreError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive coaching session
    Chat {
        #[arg(short, long, env = "GROWTH_COACH_USER")]
        user: String,
    },
    /// Decrypt and display stored sessions
    Inspect {
        /// List recent sessions (the default)
        #[arg(long, conflicts_with_all = ["session_suffix", "user_suffix"])]
        list: bool,

        #[arg(long)]
        session_suffix: Option<String>,

        #[arg(long, conflicts_with = "session_suffix")]
        user_suffix: Option<String>,

        /// Decrypt turn contents
        #[arg(long)]
        show_full: bool,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Permanently delete everything stored for a user
    Purge {
        #[arg(short, long)]
        user: String,

        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] AIError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Inspect(#[from] InspectError),
    #[error("{0}")]
    Usage(String),
    #[error("terminal: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);

    let result = match args.command {
        Command::Chat { user } => chat(&config, &user).await,
        Command::Inspect {
            list: _,
            session_suffix,
            user_suffix,
            show_full,
            limit,
        } => {
            let query = match (session_suffix, user_suffix) {
                (Some(s), _) => InspectQuery::SessionSuffix(s),
                (None, Some(u)) => InspectQuery::UserSuffix(u),
                (None, None) => InspectQuery::Recent,
            };
            inspect(&config, query, show_full, limit).await
        }
        Command::Purge { user, yes } => purge(&config, &user, yes).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn stores(
    config: &AppConfig,
) -> Result<(Arc<dyn SessionRepository>, Arc<dyn MemoryStore>), CliError> {
    match config.store.backend() {
        Some(StoreBackend::Postgres) => {
            let pool = postgres::connect(
                &config.store.url,
                config.store.max_connections,
                config.store.acquire_timeout(),
            )
            .await?;
            Ok((
                Arc::new(PostgresSessionRepository::new(pool.clone())),
                Arc::new(PostgresMemoryStore::new(pool)),
            ))
        }
        Some(StoreBackend::Memory) => {
            tracing::warn!("using the in-process store; nothing survives this process");
            Ok((
                Arc::new(InMemorySessionRepository::new()),
                Arc::new(InMemoryMemoryStore::new()),
            ))
        }
        None => Err(ValidationError::UnsupportedStoreUrl.into()),
    }
}

async fn service(config: &AppConfig) -> Result<CoachService, CliError> {
    config.validate()?;
    let vault = Arc::new(CryptoVault::from_secret(&config.vault.secret())?);
    let (sessions, store) = stores(config).await?;

    let api_key = config.ai.anthropic_api_key.clone().unwrap_or_default();
    let provider = AnthropicProvider::new(
        AnthropicConfig::new(secrecy::Secret::new(api_key))
            .with_model(&config.ai.model)
            .with_base_url(&config.ai.base_url)
            .with_timeout(config.ai.timeout()),
    )?;

    let engine = WorkflowEngine::new(
        vault.clone(),
        store.clone(),
        Arc::new(HashingEmbedder::new(config.workflow.embedding_dimensions)),
        Arc::new(provider),
        RetryPolicy::from_config(&config.workflow),
    )
    .with_seeding(config.workflow.seed_k);

    Ok(CoachService::new(
        Arc::new(SessionManager::new(vault, sessions, store)),
        Arc::new(engine),
    ))
}

const HELP: &str = "\
Commands:
  weekly <text>   report how the week went
  plan            show your current plan
  history         show this session's turns
  clear           start over with a fresh session
  help            show this message
  exit            end the session
Anything else is treated as a request.";

async fn chat(config: &AppConfig, user: &str) -> Result<(), CliError> {
    let coach = service(config).await?;
    let user_id = UserId::new(user).map_err(|e| CliError::Usage(e.to_string()))?;

    let resolved = coach.open(&user_id).await?;
    let mut handle = resolved.handle;
    if resolved.interrupted_turn {
        println!("Your last message may not have been fully processed. Feel free to repeat it.");
    }
    println!("Growth Coach is ready. Type 'help' for commands.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        match command.to_ascii_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "help" => println!("{}\n", HELP),
            "history" => print_history(&coach, &handle).await?,
            "plan" => match coach.current_plan(&handle).await? {
                Some(plan) => println!("{}\n", render_plan(&plan)),
                None => println!("No plan yet. Tell me about your goals to get started.\n"),
            },
            "clear" => {
                coach.clear(&handle).await?;
                handle = coach.open(&user_id).await?.handle;
                println!("Session cleared. Starting fresh.\n");
            }
            "weekly" => {
                if rest.is_empty() {
                    println!("Usage: weekly <how your week went>\n");
                    continue;
                }
                respond(coach.weekly_update(&handle, rest).await)?;
            }
            _ => respond(coach.request(&handle, line).await)?,
        }
    }

    coach.close(&handle).await?;
    println!("Goodbye! Keep up the great work.");
    Ok(())
}

/// Prints a turn's response. Invalid input is reported and the loop goes
/// on; other failures end the session.
fn respond(result: Result<TurnReport, WorkflowError>) -> Result<(), CliError> {
    match result {
        Ok(report) => {
            println!("\nCoach:\n{}\n", report.response());
            Ok(())
        }
        Err(WorkflowError::InvalidInput(msg)) => {
            println!("{}\n", msg);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn print_history(coach: &CoachService, handle: &SessionHandle) -> Result<(), CliError> {
    let turns = coach.history(handle).await?;
    if turns.is_empty() {
        println!("No turns in this session yet.\n");
        return Ok(());
    }
    for recorded in turns {
        let turn = &recorded.turn;
        println!(
            "[{}] {} ({}, {}): {}",
            recorded.sequence,
            turn.created_at.to_rfc3339(),
            turn.mode,
            turn.outcome.label(),
            turn.input
        );
        if let Some(version) = turn.outputs.plan_version {
            println!("    plan {}", version);
        }
    }
    println!();
    Ok(())
}

async fn inspect(
    config: &AppConfig,
    query: InspectQuery,
    show_full: bool,
    limit: usize,
) -> Result<(), CliError> {
    config.vault.validate()?;
    config.store.validate()?;
    let vault = Arc::new(CryptoVault::from_secret(&config.vault.secret())?);
    let (sessions, store) = stores(config).await?;

    let found = Inspector::new(vault, sessions, store)
        .inspect(&query, show_full, limit)
        .await?;
    if found.is_empty() {
        println!("No matching sessions.");
    }
    for session in &found {
        print_inspected(session);
    }
    Ok(())
}

fn print_inspected(inspected: &InspectedSession) {
    let s = &inspected.summary;
    println!(
        "session {}  user {}  {}  turns {}  updated {}",
        s.session_id,
        s.user_key,
        s.status,
        s.turn_count,
        s.updated_at.to_rfc3339()
    );
    if let Some(err) = &s.integrity_error {
        println!("  record integrity: {}", err);
    }
    for t in &inspected.turns {
        match &t.content {
            Ok(turn) => {
                println!(
                    "  [{}] {} {} {}",
                    t.sequence,
                    t.stored_at.to_rfc3339(),
                    turn.mode,
                    turn.outcome.label()
                );
                println!("    input: {}", turn.input);
                for line in turn.response.lines() {
                    println!("    | {}", line);
                }
            }
            Err(e) => println!("  [{}] {}", t.sequence, e),
        }
    }
}

async fn purge(config: &AppConfig, user: &str, yes: bool) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::Usage(
            "purge deletes all of a user's data; pass --yes to confirm".to_string(),
        ));
    }
    config.vault.validate()?;
    config.store.validate()?;
    let vault = Arc::new(CryptoVault::from_secret(&config.vault.secret())?);
    let (sessions, store) = stores(config).await?;
    let user_id = UserId::new(user).map_err(|e| CliError::Usage(e.to_string()))?;

    let report = SessionManager::new(vault, sessions, store)
        .purge_user(&user_id)
        .await?;
    println!("Deleted {} session(s) and all related data.", report.sessions_deleted);
    Ok(())
}
