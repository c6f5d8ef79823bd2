use lib::config::{self, Config};
use lib::i18n::Translator;
use lib::llm::{ChatService, Provider};
use lib::message::Message;
use lib::session::{Session, SessionStore};
use lib::storage::FileSlotStorage;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bubblechat")]
#[command(about = "BubbleChat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config.json, and the data directory.
    Init {
        /// Config file path (default: BUBBLECHAT_CONFIG_PATH or ~/.bubblechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Chat interactively; every exchange is saved to the session.
    Chat {
        /// Config file path (default: BUBBLECHAT_CONFIG_PATH or ~/.bubblechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Existing session id to continue. A new session is created when omitted.
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        /// Provider ("deepseek" or "anthropic"); defaults to the config's provider.
        #[arg(long)]
        provider: Option<String>,

        /// Model id; defaults to the provider's configured model.
        #[arg(long)]
        model: Option<String>,
    },

    /// List, rename, or delete saved sessions.
    Sessions {
        /// Config file path (default: BUBBLECHAT_CONFIG_PATH or ~/.bubblechat/config.json)
        #[arg(long, short, value_name = "PATH", global = true)]
        config: Option<PathBuf>,

        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Send a short message to check the provider's key and URL.
    TestConnection {
        /// Config file path (default: BUBBLECHAT_CONFIG_PATH or ~/.bubblechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long)]
        provider: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    List,
    Rename { id: String, title: String },
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!(
                "bubblechat {} ({})",
                env!("CARGO_PKG_VERSION"),
                lib::platform::platform()
            );
            Ok(())
        }
        Some(Commands::Init { config }) => run_init(config),
        Some(Commands::Chat {
            config,
            session,
            provider,
            model,
        }) => run_chat(config, session, provider, model).await,
        Some(Commands::Sessions { config, action }) => run_sessions(config, action),
        Some(Commands::TestConnection { config, provider }) => {
            run_test_connection(config, provider).await
        }
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn open_store(config: &Config, config_path: &Path) -> SessionStore<FileSlotStorage> {
    let data_dir = config::resolve_data_dir(config, config_path);
    log::debug!("sessions stored in {}", data_dir.display());
    SessionStore::new(FileSlotStorage::new(data_dir))
}

/// Service for the resolved provider; an unknown provider id fails here.
fn build_service(config: &Config, provider: Option<&str>, model: Option<&str>) -> anyhow::Result<ChatService> {
    let provider: Provider = config::resolve_provider(config, provider).parse()?;
    let model = config::resolve_model(config, provider, model);
    let settings = config::resolve_connection_settings(config, provider);
    log::info!("using provider {} model {}", provider, model);
    Ok(ChatService::with_provider(provider, model, settings))
}

async fn run_chat(
    config_path: Option<PathBuf>,
    session: Option<String>,
    provider: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = config::load_config(config_path)?;
    let t = Translator::new(config::resolve_language(&config));
    let service = build_service(&config, provider.as_deref(), model.as_deref())?;
    let store = open_store(&config, &path);
    let mut sessions = store.load_sessions();

    let current_id = match session {
        Some(id) => {
            if !sessions.iter().any(|s| s.id == id) {
                anyhow::bail!("{}: {}", t.t("sessions.notFound"), id);
            }
            id
        }
        None => {
            let mut session = Session::new(t.t("common.newChat"));
            if let Some(p) = service.provider() {
                session = session.with_field("provider", p.id());
            }
            session = session.with_field("model", service.model());
            let id = session.id.clone();
            sessions.push(session);
            store.save_sessions(&sessions);
            id
        }
    };
    println!("{} {}", t.t("chat.session"), current_id);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let Some(current) = sessions.iter().find(|s| s.id == current_id) else {
            anyhow::bail!("{}: {}", t.t("sessions.notFound"), current_id);
        };
        let history = current.messages();
        match service.send_message(input, &history).await {
            Ok(reply) => {
                println!("< {}", reply.content.trim());
                let update = current.append_messages_update(&[Message::user(input), reply]);
                match store.update_session(&sessions, &current_id, &update) {
                    Some(updated) => sessions = updated,
                    None => {
                        // Not persisted; keep the exchange in memory so the conversation continues.
                        log::warn!("session {} not saved", current_id);
                        if let Some(s) = sessions.iter_mut().find(|s| s.id == current_id) {
                            *s = s.merged(&update);
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("{}: {}", t.t("chat.error"), e);
            }
        }
    }

    Ok(())
}

fn run_sessions(config_path: Option<PathBuf>, action: SessionsAction) -> anyhow::Result<()> {
    let (config, path) = config::load_config(config_path)?;
    let t = Translator::new(config::resolve_language(&config));
    let store = open_store(&config, &path);
    let sessions = store.load_sessions();

    match action {
        SessionsAction::List => {
            if sessions.is_empty() {
                println!("{}", t.t("sessions.none"));
            }
            for s in &sessions {
                println!(
                    "{}\t{}\t{}",
                    s.id,
                    s.title().unwrap_or(""),
                    s.messages().len()
                );
            }
        }
        SessionsAction::Rename { id, title } => {
            if !sessions.iter().any(|s| s.id == id) {
                anyhow::bail!("{}: {}", t.t("sessions.notFound"), id);
            }
            let mut updates = serde_json::Map::new();
            updates.insert("title".to_string(), serde_json::Value::String(title));
            if store.update_session(&sessions, &id, &updates).is_none() {
                anyhow::bail!("rename of {} was not saved", id);
            }
            println!("{}: {}", t.t("common.rename"), id);
        }
        SessionsAction::Delete { id } => {
            if !sessions.iter().any(|s| s.id == id) {
                anyhow::bail!("{}: {}", t.t("sessions.notFound"), id);
            }
            let remaining = store.delete_session(&sessions, &id);
            if remaining.len() == sessions.len() {
                anyhow::bail!("delete of {} was not saved", id);
            }
            println!("{}: {}", t.t("common.delete"), id);
        }
    }
    Ok(())
}

async fn run_test_connection(config_path: Option<PathBuf>, provider: Option<String>) -> anyhow::Result<()> {
    let (config, _) = config::load_config(config_path)?;
    let t = Translator::new(config::resolve_language(&config));
    let service = build_service(&config, provider.as_deref(), None)?;
    println!("{}", t.t("settings.testing"));
    match service.send_message("Hi", &[]).await {
        Ok(reply) => {
            println!("{}: {}", t.t("connection.ok"), reply.content.trim());
            Ok(())
        }
        Err(e) => anyhow::bail!("{}: {}", t.t("connection.failed"), e),
    }
}
