//! tably - split a restaurant bill from a receipt photo
//!
//! Terminal UI: scan a receipt, assign items to people, settle up.

mod app;
mod ui;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tably_core::{Config, Database, RecognizerClient};

use crate::app::App;

fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        tably_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("tably starting up");

    // Open the history store; a broken store degrades to an empty,
    // non-persistent history rather than refusing to start
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "opening history store");
    let store = match Database::open(&db_path) {
        Ok(db) => {
            let db = db.with_history_cap(config.history.max_records);
            match db.migrate() {
                Ok(()) => Some(db),
                Err(e) => {
                    tracing::warn!(error = %e, "history migrations failed, running without history");
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "history store unavailable, running without history");
            None
        }
    };

    // The recognizer is optional at startup; captures surface the
    // configuration problem on screen instead
    let recognizer = match RecognizerClient::new(config.recognizer.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "recognizer not configured");
            None
        }
    };

    let mut app = App::new(store, recognizer);
    app.load_recent();

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("tably shutting down");

    result
}

/// Run the main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Pick up a finished receipt scan, if any
        app.poll_capture();

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}
