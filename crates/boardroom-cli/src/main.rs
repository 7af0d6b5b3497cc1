use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod play;

use boardroom_core::*;
use boardroom_provider::OpenAiProvider;
use boardroom_server::state::AppState;
use play::{run_play, PlayOptions};

const DEFAULT_SERVER_URL: &str = "http://localhost:5001/api";

#[derive(Parser)]
#[command(
    name = "boardroom",
    version,
    about = "AI boardroom: business personas discussing startup monetisation"
)]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Config root directory (contains config/, data/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP API server")]
    Serve {
        #[arg(long, help = "Bind address, overrides BOARDROOM_BIND and main.yaml")]
        bind: Option<String>,
    },
    #[command(about = "Run an interactive boardroom session in the terminal")]
    Play {
        #[arg(long, help = "Topic id for `start` without arguments")]
        topic: Option<String>,
        #[arg(long, help = "Discussion subject when the topic is `custom`")]
        custom_topic: Option<String>,
        #[arg(
            long,
            default_value = DEFAULT_SERVER_URL,
            conflicts_with = "local",
            help = "Base URL of a running boardroom API"
        )]
        server: String,
        #[arg(long, help = "Generate messages in-process instead of calling a server")]
        local: bool,
        #[arg(long, help = "Keep conversation logs in memory only")]
        ephemeral: bool,
    },
    #[command(subcommand, about = "Archived conversation logs")]
    Logs(LogsCommands),
    #[command(about = "List personas in turn order")]
    Agents,
    #[command(about = "List discussion topics")]
    Topics,
    #[command(about = "Validate config files")]
    Validate,
}

#[derive(Subcommand)]
enum LogsCommands {
    #[command(about = "List archived conversations, newest first")]
    List,
    #[command(about = "Print one archived conversation")]
    Show {
        #[arg(help = "Log ID")]
        log_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "boardroom.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let root = cli.config_root;
    match command {
        Commands::Validate => {
            let config = load_config(&root.join("config"))?;
            println!(
                "Config valid. {} personas, {} topics, opener: {}.",
                config.personas.len(),
                config.topics.len(),
                config.main.conversation.opener
            );
        }
        Commands::Agents => {
            let (_, roster) = load_roster(&root)?;
            for persona in roster.personas.iter() {
                println!("{:<14} {:<18} {}", persona.id, persona.name, persona.title);
            }
        }
        Commands::Topics => {
            let (_, roster) = load_roster(&root)?;
            for topic in roster.topic_infos() {
                println!("{:<14} {}", topic.id, topic.description);
            }
        }
        Commands::Logs(LogsCommands::List) => {
            let (config, _) = load_roster(&root)?;
            let store = LogStore::open(log_storage(&root, &config, false));
            if store.is_empty() {
                println!("No conversation logs.");
            }
            for log in store.list() {
                println!(
                    "{}  {}  ({} messages)  {}",
                    log.id,
                    log.title,
                    log.messages.len(),
                    log.preview()
                );
            }
        }
        Commands::Logs(LogsCommands::Show { log_id }) => {
            let (config, _) = load_roster(&root)?;
            let store = LogStore::open(log_storage(&root, &config, false));
            let log = store
                .view(&log_id)
                .ok_or_else(|| anyhow!("conversation log not found: {log_id}"))?;
            play::print_log(log);
        }
        Commands::Serve { bind } => {
            let (config, roster) = load_roster(&root)?;
            let bind = resolve_bind(bind, &config);
            let generator = build_generator(&config, roster);
            boardroom_server::serve(AppState::new(generator), &bind).await?;
        }
        Commands::Play {
            topic,
            custom_topic,
            server,
            local,
            ephemeral,
        } => {
            let (config, roster) = load_roster(&root)?;
            let source: Arc<dyn MessageSource> = if local {
                let generator: Arc<dyn MessageSource> = build_generator(&config, roster);
                generator
            } else {
                let client = ApiClient::new(server);
                if let Err(e) = client.health().await {
                    tracing::warn!(error = %e, "boardroom server is not reachable yet");
                }
                Arc::new(client)
            };
            let options = PlayOptions {
                topic: topic.unwrap_or_else(|| config.main.conversation.default_topic.clone()),
                custom_topic,
                default_topic: config.main.conversation.default_topic.clone(),
                logs: LogStore::open(log_storage(&root, &config, ephemeral)),
                source,
            };
            run_play(options).await?;
        }
    }

    Ok(())
}

fn load_roster(root: &Path) -> Result<(BoardroomConfig, Arc<Roster>)> {
    let config = load_config(&root.join("config"))?;
    let roster = Arc::new(Roster::from_config(&config)?);
    Ok((config, roster))
}

fn build_generator(config: &BoardroomConfig, roster: Arc<Roster>) -> Arc<MessageGenerator> {
    let model = &config.main.model;
    if model.api_key.is_empty() {
        tracing::warn!("model.api_key is empty, generation calls will be rejected upstream");
    }
    let provider = Arc::new(OpenAiProvider::with_timeout(
        model.api_key.clone(),
        model.api_base.clone(),
        Duration::from_secs(model.timeout_secs),
    ));
    let settings = GenerationSettings {
        model: model.model.clone(),
        max_tokens: model.max_tokens,
        temperature: model.temperature,
    };
    Arc::new(MessageGenerator::new(provider, roster, settings))
}

fn log_storage(
    root: &Path,
    config: &BoardroomConfig,
    ephemeral: bool,
) -> Arc<dyn KeyValueStorage> {
    if ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(FileStorage::new(root.join(&config.main.storage.data_dir)))
    }
}

fn resolve_bind(flag: Option<String>, config: &BoardroomConfig) -> String {
    flag.or_else(|| {
        std::env::var("BOARDROOM_BIND")
            .ok()
            .filter(|v| !v.trim().is_empty())
    })
    .unwrap_or_else(|| config.main.server.bind.clone())
}
