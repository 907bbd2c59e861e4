use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;
use crate::config::Config;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => {
                app.should_quit = true;
            }
            // Switch response mode; allowed while a turn is pending, the
            // new mode applies to the next submission only.
            KeyCode::Char('t') => {
                app.toggle_mode();
                let _ = Config::save_default_mode(app.mode);
            }
            // Rebuild the backend index.
            KeyCode::Char('r') => submit_ingest(app),
            // Cycle a sample question into the editor.
            KeyCode::Char('p') => {
                app.cycle_quick_prompt();
            }
            KeyCode::Char('a') => app.cursor_home(),
            KeyCode::Char('e') => app.cursor_end(),
            // Jump the transcript back to the newest entry.
            KeyCode::End => app.scroll_to_bottom(),
            _ => {}
        }
        return;
    }

    match key.code {
        // Enter is the submission control; App::begin_turn holds the gate.
        KeyCode::Enter => submit_question(app),

        KeyCode::Tab => app.panel.toggle_visible(),
        KeyCode::Esc => app.panel.hide(),

        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete_char(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),

        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::PageUp => app.scroll_page_up(),
        KeyCode::PageDown => app.scroll_page_down(),

        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

fn submit_question(app: &mut App) {
    if let Some(request) = app.begin_turn() {
        let client = app.api.clone();
        app.turn_task = Some(tokio::spawn(async move { client.chat(&request).await }));
    }
}

fn submit_ingest(app: &mut App) {
    if app.begin_ingest() {
        let client = app.api.clone();
        app.ingest_task = Some(tokio::spawn(async move { client.ingest().await }));
    }
}
