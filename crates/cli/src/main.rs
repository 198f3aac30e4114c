mod config;
mod error;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use runtime::{ChatSkill, GeminiConnector, Speaker};
use storage::{EventStore, SessionId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use config::{API_KEY_ENV, Config};
use error::Result;

const CONFIG_FILE: &str = "voice-chat.toml";

#[derive(Parser)]
#[command(name = "voice-chat")]
#[command(about = "Fallback chat for a voice assistant, answered by Gemini", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ./voice-chat.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat,
    /// Print the effective settings
    Settings,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.log.filter);

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(config).await,
        Some(Commands::Settings) => cmd_settings(&config),
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load(path)?,
        None if Path::new(CONFIG_FILE).exists() => Config::load(CONFIG_FILE)?,
        None => Config::default_config(),
    };
    Ok(config.with_fallback_key(std::env::var(API_KEY_ENV).ok()))
}

/// Text the skill asked to speak, travelling back over the local bus.
#[derive(Debug)]
struct Spoken {
    session_id: SessionId,
    utterance: String,
}

/// Speaker that publishes on the local bus instead of playing audio.
struct BusSpeaker {
    tx: mpsc::UnboundedSender<Spoken>,
}

impl Speaker for BusSpeaker {
    fn speak(&self, session_id: &SessionId, utterance: &str) {
        let spoken = Spoken {
            session_id: session_id.clone(),
            utterance: utterance.to_string(),
        };
        if self.tx.send(spoken).is_err() {
            tracing::warn!("bus closed, dropping speech");
        }
    }
}

async fn cmd_chat(config: Config) -> Result<()> {
    println!("voice-chat v{}", env!("CARGO_PKG_VERSION"));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let skill = ChatSkill::new(
        EventStore::new(),
        config.skill,
        GeminiConnector,
        BusSpeaker { tx },
    );
    let session = SessionId::generate();
    let settings = skill.settings();

    println!("Session ID: {session}");
    println!("Model: {}", settings.model);
    if !settings.is_configured() {
        println!("No API key: set skill.api_key in {CONFIG_FILE} or {API_KEY_ENV}.");
    }
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            // EOF
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        skill.handle_utterance(&session, &[input.to_string()]);

        let mut task = match skill.handle_fallback(&session, input) {
            Ok(task) => task,
            Err(runtime::Error::NotConfigured) => {
                eprintln!("Not answered: no API key configured.\n");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        // Speech arrives sentence by sentence while the answer streams in.
        println!();
        loop {
            tokio::select! {
                Some(spoken) = rx.recv() => deliver(&skill, spoken),
                joined = &mut task => {
                    joined.map_err(runtime::Error::from)?;
                    break;
                }
            }
        }
        while let Ok(spoken) = rx.try_recv() {
            deliver(&skill, spoken);
        }
        println!();
    }

    let turns = runtime::session_history(skill.store(), &session).len();
    println!("\nSession ended after {turns} answered turn(s).");
    Ok(())
}

/// Play speech the way the host bus would: print it, then echo it back to the
/// skill as assistant speech.
fn deliver(skill: &ChatSkill<GeminiConnector, BusSpeaker>, spoken: Spoken) {
    println!("{}", spoken.utterance);
    skill.handle_speak(&spoken.session_id, Some(spoken.utterance.as_str()));
}

fn cmd_settings(config: &Config) -> Result<()> {
    print!("{}", config.redacted()?);
    Ok(())
}
