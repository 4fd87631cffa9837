//! Kindred - terminal companion with long-term memory

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use kindred::KindredError;
use kindred::classifier::KeywordClassifier;
use kindred::companion::{Companion, ReplyOrigin};
use kindred::config::{Config, StorageBackend};
use kindred::embedding::{EMBEDDING_DIMENSION, Embedder, FastEmbedder};
use kindred::error::Result;
use kindred::generation::{FallbackGenerator, Generator, RemoteGenerator};
use kindred::index::{InMemoryIndex, LanceMemoryIndex, PersistentMemoryIndex};
use kindred::memory::{OwnerId, SessionStore};
use kindred::orchestrator::MemoryOrchestrator;
use kindred::personality::{PersonalityContextAdapter, PersonalityVariant};

/// Kindred - a personality-driven companion that remembers you
#[derive(Parser)]
#[command(name = "kindred")]
#[command(about = "A personality-driven companion that remembers you")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Owner id memories are stored under (overrides config)
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Personality to start with (overrides config)
    #[arg(long, short = 'p', global = true)]
    pub personality: Option<PersonalityVariant>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive chat (default command)
    Chat,
    /// List the available personalities
    Personalities,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Personalities) => {
            print_personalities();
            Ok(())
        }
        None | Some(Command::Chat) => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(user) = cli.user {
                config.companion.user_id = user;
            }
            if let Some(personality) = cli.personality {
                config.companion.personality = personality;
            }
            chat(config).await
        }
    }
}

/// Log filter used when RUST_LOG is unset. Kept quiet since logs share the
/// terminal with the chat.
const DEFAULT_LOG_FILTER: &str = "warn,kindred=info";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_personalities() {
    for variant in PersonalityVariant::ALL {
        println!(
            "{:<14} {} - {}",
            variant.as_str(),
            variant.display_name(),
            variant.description()
        );
    }
}

fn print_help() {
    println!("/personality        show the current personality and the choices");
    println!("/personality <name> switch personality");
    println!("/clear              forget this session (long-term memories are kept)");
    println!("/stats              show memory and mood statistics");
    println!("/help               show this list");
    println!("/quit               leave the chat");
}

async fn build_index(config: &Config) -> Result<Arc<dyn PersistentMemoryIndex>> {
    if config.embedding.dimension != EMBEDDING_DIMENSION {
        return Err(KindredError::Config(format!(
            "Embedding model '{}' produces {} dimensions, config says {}",
            config.embedding.model, EMBEDDING_DIMENSION, config.embedding.dimension
        )));
    }

    tracing::info!("Loading embedding model: {}", config.embedding.model);
    let embedder: Arc<dyn Embedder> = Arc::new(FastEmbedder::new()?);

    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory long-term index");
            Ok(Arc::new(InMemoryIndex::with_salience(
                embedder,
                config.salience,
            )))
        }
        StorageBackend::Lance => {
            let data_dir = &config.storage.data_dir;
            std::fs::create_dir_all(data_dir).map_err(|e| {
                KindredError::Storage(format!(
                    "Failed to create data directory {}: {}",
                    data_dir.display(),
                    e
                ))
            })?;

            let path = data_dir.join("memories.lance");
            tracing::info!("Opening long-term index at: {}", path.display());
            let index =
                LanceMemoryIndex::open_with_salience(&path, embedder, config.salience).await?;
            Ok(Arc::new(index))
        }
    }
}

fn build_generator(config: &Config) -> Arc<dyn Generator> {
    match RemoteGenerator::new(&config.generation) {
        Ok(generator) => Arc::new(generator),
        Err(e) => {
            tracing::warn!("Remote generation disabled, using fallback replies: {}", e);
            Arc::new(FallbackGenerator::new())
        }
    }
}

async fn chat(config: Config) -> Result<()> {
    let owner = OwnerId::try_from(config.companion.user_id.as_str())?;
    let index = build_index(&config).await?;

    let orchestrator = MemoryOrchestrator::new(
        SessionStore::new(config.memory.session_capacity),
        index,
        Arc::new(KeywordClassifier::new()),
        config.memory.clone(),
    );
    let mut companion = Companion::new(
        orchestrator,
        PersonalityContextAdapter::new(&config.companion, &config.generation),
        build_generator(&config),
        config.companion.personality,
        owner,
    );

    let name = config.companion.name.clone();
    println!("{name}: {}", companion.greeting());
    println!("(type /help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("quit" | "exit"), _) => break,
                (Some("help"), _) => print_help(),
                (Some("clear"), _) => {
                    companion.clear_session();
                    println!("Session cleared. Long-term memories are kept.");
                }
                (Some("stats"), _) => {
                    let stats = companion.stats().await;
                    let long_term = stats
                        .memory
                        .long_term_records
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "unavailable".to_string());
                    println!("owner:        {}", stats.memory.owner);
                    println!(
                        "session:      {}/{} turns",
                        stats.memory.session_turns, stats.memory.session_capacity
                    );
                    println!(
                        "long-term:    {} ({})",
                        long_term, stats.memory.long_term_backend
                    );
                    println!("personality:  {}", stats.personality);
                    println!("mood:         {:.1}/1.0", stats.mood_level);
                    println!("interactions: {}", stats.interactions);
                }
                (Some("personality"), None) => {
                    println!("Current personality: {}", companion.personality());
                    print_personalities();
                }
                (Some("personality"), Some(requested)) => match requested.parse::<PersonalityVariant>() {
                    Ok(variant) => {
                        companion.set_personality(variant);
                        println!("{name}: {}", variant.greeting());
                    }
                    Err(e) => println!("{e}"),
                },
                _ => println!("Unknown command: /{command}"),
            }
            continue;
        }

        let outcome = companion.respond(input).await;
        println!("{name}: {}", outcome.reply);
        if outcome.origin == ReplyOrigin::Fallback {
            tracing::debug!("Reply came from the fallback generator");
        }
    }

    println!("{name}: Goodbye! See you next time.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_default_filter_hides_debug_output() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["kindred", "-u", "jisoo", "-p", "playful", "chat"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("jisoo"));
        assert_eq!(cli.personality, Some(PersonalityVariant::Playful));
        assert!(matches!(cli.command, Some(Command::Chat)));
    }
}
