use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod ai;
mod app;
mod config;
mod export;
mod handler;
mod provider;
mod session;
mod theme;
mod transcript;
mod tui;
mod ui;

use ai::GatewayRegistry;
use app::App;
use config::ConfigStore;
use theme::ThemeStore;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "synthara")]
#[command(version, about = "Chat with hosted language models from the terminal")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding config.json and theme.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Log file (defaults to synthara.log in the config directory)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// The terminal is owned by the UI, so logs only ever go to a file.
fn init_logging(verbose: u8, path: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("SYNTHARA_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("synthara={default_level},warn")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => config::default_config_dir()?,
    };
    let log_path = cli.log_file.unwrap_or_else(|| config_dir.join("synthara.log"));
    let _log_guard = init_logging(cli.verbose, &log_path)?;
    info!(config_dir = %config_dir.display(), "starting synthara");

    let app = App::new(
        ConfigStore::load(&config_dir),
        ThemeStore::new(&config_dir),
        GatewayRegistry::with_defaults(),
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, app).await;
    tui::restore()?;

    if let Err(e) = &result {
        tracing::error!(error = %e, "exited with error");
    }
    info!("shutting down");
    result
}

async fn run(terminal: &mut tui::Tui, mut app: App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        app.observe_session();
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    Ok(())
}
