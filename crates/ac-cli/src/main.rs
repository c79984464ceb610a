use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ac_client::HttpTransport;
use ac_core::{render_with, Controller, TurnOutcome};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod chat;
mod config;
mod terminal;

use config::Config;
use terminal::TerminalView;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: every received chunk
    Trace,
    /// Verbose: requests, turn transitions
    Debug,
    /// Standard: turn outcomes
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "ac")]
#[command(author, version, about = "agent-chat: stream an agent's replies as rendered markdown", long_about = None)]
pub struct Cli {
    /// Message to send (one turn, then exit)
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Config file to merge over ~/.config/ac/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the chat server (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Write the conversation as an HTML page to this path on exit (overrides config)
    #[arg(long)]
    pub transcript: Option<String>,

    /// Print plain text instead of redrawing styled output
    #[arg(long)]
    pub plain: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long)]
    pub debug: bool,

    /// Write debug logs to file (JSON-lines format)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render markdown from a file (or stdin) to an HTML fragment
    Render {
        /// Input file; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };
    init_logging(log_level, cli.log_file.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(transcript) = &cli.transcript {
        config.transcript = Some(transcript.clone());
    }

    match &cli.command {
        Some(Commands::Render { file }) => render_mode(&config, file.as_deref()),
        Some(Commands::Config) => show_config(&config),
        None => chat_mode(&cli, &config).await,
    }
}

fn init_logging(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::new(level.as_filter());

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn render_mode(config: &Config, file: Option<&Path>) -> Result<ExitCode> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };
    println!("{}", render_with(&text, &config.theme()?));
    Ok(ExitCode::SUCCESS)
}

fn show_config(config: &Config) -> Result<ExitCode> {
    match Config::config_path() {
        Ok(path) => println!("# Config file: {}", path.display()),
        Err(e) => println!("# Config file: unavailable ({})", e),
    }
    println!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    Ok(ExitCode::SUCCESS)
}

async fn chat_mode(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let transport = HttpTransport::new(config.base_url.as_str()).with_chat_path(config.chat_path.as_str());
    debug!("Chat endpoint: {}", transport.url());

    let styled = !cli.plain && atty::is(atty::Stream::Stdout);
    let one_shot = cli.prompt.is_some();
    let view = TerminalView::new(styled, one_shot);
    let mut controller = Controller::new(Box::new(transport), view).with_theme(config.theme()?);

    let exit = if let Some(prompt) = &cli.prompt {
        let outcome = controller.submit(prompt).await;
        controller.view_mut().finish_turn();
        info!("Turn outcome: {:?}", outcome);
        match outcome {
            TurnOutcome::Completed { .. } => ExitCode::SUCCESS,
            TurnOutcome::Skipped => {
                eprintln!("Nothing to send: prompt is empty.");
                ExitCode::FAILURE
            }
            _ => ExitCode::FAILURE,
        }
    } else {
        chat::run_chat(&mut controller, &config.examples).await?;
        ExitCode::SUCCESS
    };

    if let Some(path) = config.transcript_path() {
        write_transcript(controller.view(), &path)?;
    }

    Ok(exit)
}

fn write_transcript(view: &TerminalView, path: &Path) -> Result<()> {
    let page = view.transcript().to_page("agent-chat");
    std::fs::write(path, page)
        .with_context(|| format!("Failed to write transcript: {}", path.display()))?;
    info!("Transcript written to {}", path.display());
    Ok(())
}
