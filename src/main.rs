use anyhow::Result;
use clap::Parser;

mod api;
mod app;
mod config;
mod handler;
mod panel;
mod transcript;
mod tui;
mod ui;

use api::Mode;
use app::App;
use config::Config;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "siterag")]
#[command(about = "Terminal chat client for a construction-docs RAG assistant")]
#[command(version)]
struct Cli {
    /// Backend server URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,
    /// Response mode to start in (overrides the config file)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|_| Config::new());
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(mode) = cli.mode {
        config.default_mode = mode;
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(&config);

    let result = run(&mut terminal, &mut events, &mut app).await;
    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event)?;

        // The tick event arrives a few times a second, so finished exchanges
        // are collected promptly even when the user is idle.
        collect_finished_tasks(app).await;
    }
    Ok(())
}

/// Resolve background exchanges whose tasks have completed. A panicked task
/// surfaces as a transport failure, the same as a network error.
async fn collect_finished_tasks(app: &mut App) {
    if app.turn_task.as_ref().is_some_and(|task| task.is_finished()) {
        if let Some(task) = app.turn_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => Err(err.into()),
            };
            app.finish_turn(result);
        }
    }

    if app.ingest_task.as_ref().is_some_and(|task| task.is_finished()) {
        if let Some(task) = app.ingest_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => Err(err.into()),
            };
            app.finish_ingest(result);
        }
    }
}
