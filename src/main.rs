//! Terminal front-end for the assistant.

use anyhow::{Context, Result};
use clap::Parser;
use polyglot_assistant::config::{
    Config, ProviderKind, SETTING_LANGUAGE, SETTING_MEMORY, SETTING_PROVIDER,
};
use polyglot_assistant::{Database, Normalizer, Session, UploadedFile};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HISTORY_LIMIT: usize = 20;

const HELP: &str = "\
Commands:
  /upload <path>...   add files to the conversation context
  /remove <name>      hide an uploaded file (its context is kept until /clear)
  /clear              drop all uploaded files and their context
  /files              list uploaded files
  /search <query>     summarize a topic as if searching the web
  /web <message>      send a message grounded in a search summary
  /memory on|off      remember the last five turns
  /lang <code>        reply language (en, tr, ur, hi, zh, es, fr, de, ar)
  /provider <name>    switch backend (gemini, groq, openai)
  /models             list models offered by the provider
  /history            show recent messages from earlier sessions
  /help               show this help
  /quit               exit
Anything else is sent as a chat message.";

/// Multilingual chat assistant with file context and web-search summaries.
#[derive(Parser, Debug)]
#[command(name = "polyglot-assistant", version, about)]
struct CliArgs {
    /// Backend to use (gemini, groq, openai).
    #[arg(short = 'p', long = "provider")]
    provider: Option<ProviderKind>,

    /// Reply language code.
    #[arg(short = 'l', long = "language")]
    language: Option<String>,

    /// Start with conversation memory enabled.
    #[arg(short = 'm', long = "memory")]
    memory: bool,

    /// Directory for the history database.
    #[arg(short = 'd', long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Do not read or write chat history.
    #[arg(long = "no-history")]
    no_history: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_level.as_deref());

    let mut config = Config::load();
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }

    let db = if args.no_history {
        None
    } else {
        let db = Database::new(&config.data_dir)
            .with_context(|| format!("opening history in {}", config.data_dir.display()))?;
        config.apply_settings(&db)?;
        Some(db)
    };

    if let Some(provider) = args.provider {
        config.provider = provider;
    }
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if args.memory {
        config.memory_enabled = true;
    }

    let mut session = Session::new(config.provider(), Normalizer::new(config.upload.clone()))
        .with_language(&config.language);
    session.set_memory_enabled(config.memory_enabled);
    if let Some(db) = db {
        session = session.with_history(db)?;
    }

    tracing::info!(
        provider = session.provider().name(),
        model = session.provider().model(),
        language = session.language(),
        memory = session.memory_enabled(),
        "session started"
    );
    println!("Multilingual assistant ready. Type /help for commands.");

    let mut printed = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !handle_line(&mut session, &mut config, line).await {
            break;
        }
        for turn in &session.transcript()[printed..] {
            println!("[{}] {}\n", turn.role, turn.content);
        }
        printed = session.transcript().len();
    }

    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_line(session: &mut Session, config: &mut Config, line: &str) -> bool {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => return false,
        "/help" => println!("{HELP}"),
        "/upload" => {
            let mut files = Vec::new();
            for path in rest.split_whitespace() {
                match UploadedFile::from_path(path).await {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        println!("cannot open {path}: {e}");
                        return true;
                    }
                }
            }
            if files.is_empty() {
                println!("usage: /upload <path>...");
            } else {
                session.upload(files).await;
            }
        }
        "/remove" if rest.is_empty() => println!("usage: /remove <name>"),
        "/remove" => session.remove_file(rest),
        "/clear" => session.clear_files(),
        "/files" => {
            if session.uploaded_files().is_empty() {
                println!("No uploaded files.");
            }
            for file in session.uploaded_files() {
                println!(
                    "  {} ({}, {})",
                    file.name,
                    file.mime_type,
                    polyglot_assistant::assembler::format_kb(file.size_bytes)
                );
            }
        }
        "/search" => {
            session.search(rest).await;
        }
        "/web" => {
            session.send_grounded(rest).await;
        }
        "/memory" => match rest {
            "on" | "off" => {
                let enabled = rest == "on";
                session.set_memory_enabled(enabled);
                persist(session, SETTING_MEMORY, rest);
                println!("Memory {}.", if enabled { "enabled" } else { "disabled" });
            }
            _ => println!("usage: /memory on|off"),
        },
        "/lang" => {
            if rest.is_empty() {
                println!("usage: /lang <code>");
            } else {
                session.set_language(rest);
                config.language = session.language().to_string();
                persist(session, SETTING_LANGUAGE, session.language());
                println!(
                    "Replying in {}.",
                    polyglot_assistant::assembler::language_name(session.language())
                );
            }
        }
        "/provider" => match rest.parse::<ProviderKind>() {
            Ok(kind) => {
                config.provider = kind;
                session.set_provider(config.provider());
                persist(session, SETTING_PROVIDER, kind.as_str());
            }
            Err(e) => println!("{e}"),
        },
        "/models" => match session.list_models().await {
            Ok(models) => {
                for model in models {
                    println!("  {} ({})", model.id, model.name);
                }
            }
            Err(e) => println!("could not list models: {e}"),
        },
        "/history" => match session.database() {
            Some(db) => match db.recent_messages(HISTORY_LIMIT) {
                Ok(messages) => {
                    for message in messages {
                        println!("[{} {}] {}", message.created_at, message.role, message.content);
                    }
                }
                Err(e) => println!("could not read history: {e}"),
            },
            None => println!("History is disabled."),
        },
        _ if command.starts_with('/') => println!("Unknown command {command}. Type /help."),
        _ => {
            session.send_message(line).await;
        }
    }
    true
}

fn persist(session: &Session, key: &str, value: &str) {
    if let Some(db) = session.database() {
        if let Err(e) = db.set_setting(key, value) {
            tracing::warn!(error = %e, key, "failed to persist setting");
        }
    }
}
