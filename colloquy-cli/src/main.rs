//! Colloquy CLI - chat with a local model across resumable conversations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use colloquy_core::prelude::*;

#[derive(Parser)]
#[command(name = "colloquy")]
#[command(about = "Chat with a locally hosted model across resumable conversations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a configuration file (otherwise colloquy.toml + env)
    #[arg(short, long, env = "COLLOQUY_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume an existing conversation by id
        #[arg(short, long)]
        resume: Option<String>,
    },
    /// List conversations, most recently active first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every turn of a conversation
    Replay {
        /// Conversation id
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Irreversibly delete all conversation history
    Erase {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ColloquyConfig::from_file(path)?,
        None => ColloquyConfig::load()?,
    };

    match cli.command {
        Commands::Version => {
            println!("colloquy {}", env!("CARGO_PKG_VERSION"));
            println!("colloquy-core {}", colloquy_core::VERSION);
        }
        Commands::Chat { resume } => {
            let service = build_service(&config).await?;
            run_chat(&service, resume).await?;
        }
        Commands::List { json } => {
            let service = build_service(&config).await?;
            let listing = service.list_conversations().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else if listing.is_empty() {
                println!("No conversations yet.");
            } else {
                for summary in listing {
                    println!(
                        "{}  {}  {}",
                        summary.id,
                        summary.last_activity.format("%Y-%m-%d %H:%M"),
                        summary.title
                    );
                }
            }
        }
        Commands::Replay { id, json } => {
            let service = build_service(&config).await?;
            let turns = service.replay(&id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&turns)?);
            } else if turns.is_empty() {
                println!("No turns recorded for {}.", id);
            } else {
                for turn in turns {
                    println!("[{}] You: {}", turn.timestamp.format("%H:%M"), turn.user_text);
                    println!("[{}] AI: {}", turn.timestamp.format("%H:%M"), turn.assistant_text);
                    println!();
                }
            }
        }
        Commands::Erase { yes } => {
            if !yes {
                anyhow::bail!("refusing to erase without --yes");
            }
            let service = build_service(&config).await?;
            let deleted = service.erase_all().await?;
            println!("Deleted {} turns.", deleted);
        }
    }

    Ok(())
}

/// Wire the service from configuration: store backend + provider.
async fn build_service(config: &ColloquyConfig) -> Result<ChatService> {
    let store: Arc<dyn HistoryStore> = match &config.store.mode {
        StoreMode::Memory => {
            tracing::warn!("using in-memory store; history will not survive exit");
            Arc::new(MemoryHistoryStore::new())
        }
        StoreMode::Embedded { data_dir } => {
            Arc::new(SurrealHistoryStore::connect_embedded(data_dir).await?)
        }
        StoreMode::Server { url } => Arc::new(
            SurrealHistoryStore::connect_server(url, config.store.connect_timeout).await?,
        ),
    };

    let provider = build_provider(&config.llm);
    tracing::info!(
        model = %provider.model_info().model_name,
        provider = %provider.model_info().provider,
        "inference provider ready"
    );

    Ok(ChatService::new(config, store, provider))
}

/// Interactive REPL. In-session commands: /new, /switch <id>, /list, /quit.
async fn run_chat(service: &ChatService, resume: Option<String>) -> Result<()> {
    let mut conversation_id = match resume {
        Some(id) => {
            let replayed = service.switch_to(&id).await?;
            for turn in &replayed {
                println!("You: {}", turn.user_text);
                println!("AI: {}", turn.assistant_text);
            }
            println!("-- resumed {} ({} turns) --", id, replayed.len());
            id
        }
        None => {
            let id = service.new_conversation();
            println!("-- new conversation {} --", id);
            id
        }
    };

    if let Err(e) = service.health_check().await {
        println!("warning: {} (history will not be saved)", e);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();

        match line.as_str() {
            "" => continue,
            "/quit" => break,
            "/new" => {
                conversation_id = service.new_conversation();
                println!("-- new conversation {} --", conversation_id);
            }
            "/list" => match service.list_conversations().await {
                Ok(listing) => {
                    for summary in listing {
                        println!(
                            "{}  {}  {}",
                            summary.id,
                            summary.last_activity.format("%Y-%m-%d %H:%M"),
                            summary.title
                        );
                    }
                }
                Err(e) => println!("warning: {}", e),
            },
            _ if line.starts_with("/switch ") => {
                let id = line.trim_start_matches("/switch ").trim().to_string();
                match service.switch_to(&id).await {
                    Ok(replayed) => {
                        conversation_id = id;
                        println!(
                            "-- switched to {} ({} turns) --",
                            conversation_id,
                            replayed.len()
                        );
                    }
                    Err(e) => println!("warning: {}", e),
                }
            }
            _ => match service.send_message(&conversation_id, &line).await {
                Ok(outcome) => {
                    println!("{}", outcome.response);
                    if !outcome.persisted {
                        println!("(warning: turn was not saved to history)");
                    }
                }
                Err(ColloquyError::InvalidInput(_)) => continue,
                Err(e) => println!("error: {}", e),
            },
        }
    }

    Ok(())
}
