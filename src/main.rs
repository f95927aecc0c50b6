use color_eyre::Result;
use geoguide_tui::{
    api::GeminiClient,
    app::{App, ViewMode},
    config::Config,
    events::{ChannelPrompt, Event, EventHandler},
    insights::InsightRequester,
    location::Geolocator,
    logging,
    lookup::Lookup,
    ui,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging();
    color_eyre::install()?;
    install_panic_hook();

    let config = Config::load();
    let mut events = EventHandler::new(config.ui.tick_rate_ms);

    // Lookup pipeline
    let api_key = config.api.api_key();
    if api_key.is_none() {
        warn!(
            "{} is not set; lookups will fail until it is",
            config.api.api_key_env
        );
    }
    let backend = Arc::new(GeminiClient::new(&config.api, api_key)?);
    let prompt = Arc::new(ChannelPrompt::new(events.tx.clone()));
    let lookup = Arc::new(Lookup::new(
        Geolocator::from_config(&config.location, prompt),
        InsightRequester::new(backend),
    ));

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut app = App::new(ViewMode::from_name(&config.ui.default_view));

    // Look up right away on startup
    if let Some(generation) = app.begin_lookup() {
        spawn_lookup(&lookup, generation, events.tx.clone());
    }

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        match events.next().await {
            Some(Event::Tick) => app.on_tick(),
            Some(Event::Input(key)) => app.handle_key(key),
            Some(Event::LookupFinished {
                generation,
                outcome,
            }) => app.on_lookup_finished(generation, *outcome),
            Some(Event::PermissionRequest(reply)) => app.on_permission_request(reply),
            None => break,
        }

        if let Some(generation) = app.take_queued_lookup() {
            spawn_lookup(&lookup, generation, events.tx.clone());
        }
    }

    restore_terminal(terminal)?;
    info!("Exiting.");
    Ok(())
}

fn spawn_lookup(lookup: &Arc<Lookup>, generation: u64, tx: UnboundedSender<Event>) {
    let lookup = Arc::clone(lookup);
    tokio::spawn(async move {
        let outcome = lookup.run().await;
        let _ = tx.send(Event::LookupFinished {
            generation,
            outcome: Box::new(outcome),
        });
    });
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show).ok();
        original_hook(panic_info);
    }));
}
