use crate::lookup::{LookupFailure, LookupOutcome, LookupReport};
use crate::models::{Coordinates, GroundingSource};
use crossterm::event::{KeyCode, KeyEvent};
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum ViewMode {
    #[default]
    Dashboard,
    Sources,
    Raw,
}

impl ViewMode {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sources" => ViewMode::Sources,
            "raw" => ViewMode::Raw,
            _ => ViewMode::Dashboard,
        }
    }
}

/// What the screen renders from. Replaced wholesale on every transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LookupState {
    #[default]
    Idle,
    Loading,
    Success(Box<LookupReport>),
    Failure(Box<LookupFailure>),
}

#[derive(Default)]
pub struct App {
    pub view_mode: ViewMode,
    pub state: LookupState,
    pub generation: u64,
    pub selected_index: usize,
    pub raw_scroll: u16,
    pub tick_count: usize,
    pub should_quit: bool,

    /// Responder for the location permission dialog, if it is open.
    pub pending_permission: Option<oneshot::Sender<bool>>,
    queued_lookup: Option<u64>,
}

impl App {
    pub fn new(view_mode: ViewMode) -> Self {
        Self {
            view_mode,
            ..Self::default()
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LookupState::Loading)
    }

    /// Moves to `Loading` and returns the new lookup generation.
    ///
    /// Returns `None` while a lookup is already in flight: overlapping
    /// triggers are dropped so a stale reply can never replace a newer one.
    pub fn begin_lookup(&mut self) -> Option<u64> {
        if self.is_loading() {
            debug!("Lookup already in flight, ignoring trigger");
            return None;
        }
        self.generation += 1;
        self.state = LookupState::Loading;
        info!("Starting lookup #{}", self.generation);
        Some(self.generation)
    }

    /// Lookup started from a key press, waiting for the main loop to spawn it.
    pub fn take_queued_lookup(&mut self) -> Option<u64> {
        self.queued_lookup.take()
    }

    pub fn on_lookup_finished(&mut self, generation: u64, outcome: LookupOutcome) {
        if !self.is_loading() || generation != self.generation {
            debug!(
                "Discarding result of lookup #{} (current #{})",
                generation, self.generation
            );
            return;
        }

        self.state = match outcome {
            Ok(report) => LookupState::Success(Box::new(report)),
            Err(failure) => {
                info!("Lookup #{} failed: {}", generation, failure.error);
                LookupState::Failure(Box::new(failure))
            }
        };
        self.selected_index = 0;
        self.raw_scroll = 0;
    }

    pub fn on_permission_request(&mut self, reply: oneshot::Sender<bool>) {
        // Replacing an unanswered dialog drops its responder, which denies it.
        self.pending_permission = Some(reply);
    }

    fn answer_permission(&mut self, granted: bool) {
        if let Some(reply) = self.pending_permission.take() {
            let _ = reply.send(granted);
        }
    }

    pub fn on_tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }

    pub fn coords(&self) -> Option<Coordinates> {
        match &self.state {
            LookupState::Success(report) => Some(report.coords),
            LookupState::Failure(failure) => failure.coords,
            _ => None,
        }
    }

    /// Citations are shown whether or not the payload parsed.
    pub fn sources(&self) -> &[GroundingSource] {
        match &self.state {
            LookupState::Success(report) => &report.sources,
            LookupState::Failure(failure) => &failure.sources,
            _ => &[],
        }
    }

    pub fn raw_text(&self) -> Option<&str> {
        match &self.state {
            LookupState::Success(report) => Some(&report.raw_text),
            LookupState::Failure(failure) => failure.raw_text.as_deref(),
            _ => None,
        }
    }

    fn attraction_count(&self) -> usize {
        match &self.state {
            LookupState::Success(report) => report.data.attractions.len(),
            _ => 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        // The permission dialog is modal
        if self.pending_permission.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    self.answer_permission(true)
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.answer_permission(false)
                }
                KeyCode::Char('q') => {
                    self.answer_permission(false);
                    self.should_quit = true;
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('r') => {
                if let Some(generation) = self.begin_lookup() {
                    self.queued_lookup = Some(generation);
                }
            }
            KeyCode::Char('1') => self.view_mode = ViewMode::Dashboard,
            KeyCode::Char('2') => self.view_mode = ViewMode::Sources,
            KeyCode::Char('3') => self.view_mode = ViewMode::Raw,
            KeyCode::Down | KeyCode::Char('j') => match self.view_mode {
                ViewMode::Raw => self.raw_scroll = self.raw_scroll.saturating_add(1),
                _ => {
                    let count = self.attraction_count();
                    if count > 0 {
                        self.selected_index = (self.selected_index + 1) % count;
                    }
                }
            },
            KeyCode::Up | KeyCode::Char('k') => match self.view_mode {
                ViewMode::Raw => self.raw_scroll = self.raw_scroll.saturating_sub(1),
                _ => {
                    let count = self.attraction_count();
                    if count > 0 {
                        self.selected_index = self
                            .selected_index
                            .checked_sub(1)
                            .unwrap_or(count - 1);
                    }
                }
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupError;
    use crate::models::{Attraction, LocationData};
    use crossterm::event::KeyModifiers;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn report(attractions: usize) -> LookupReport {
        LookupReport {
            coords: Coordinates::new(1.0, 2.0).unwrap(),
            data: LocationData {
                location_name: "Somewhere".into(),
                attractions: vec![Attraction::default(); attractions],
                ..LocationData::default()
            },
            sources: vec![],
            raw_text: "{}".into(),
            completed_at: chrono::Local::now(),
        }
    }

    fn failure(error: LookupError) -> LookupFailure {
        LookupFailure {
            error,
            coords: None,
            sources: vec![GroundingSource {
                title: "t".into(),
                uri: "u".into(),
            }],
            raw_text: None,
        }
    }

    #[test]
    fn triggers_are_suppressed_while_loading() {
        let mut app = App::default();
        assert_eq!(app.begin_lookup(), Some(1));
        assert_eq!(app.begin_lookup(), None);

        app.handle_key(key('r'));
        assert_eq!(app.take_queued_lookup(), None);
        assert_eq!(app.generation, 1);
    }

    #[test]
    fn refresh_from_success_goes_back_to_loading() {
        let mut app = App::default();
        let generation = app.begin_lookup().unwrap();
        app.on_lookup_finished(generation, Ok(report(2)));
        assert!(matches!(app.state, LookupState::Success(_)));

        app.handle_key(key('r'));
        assert!(app.is_loading());
        assert_eq!(app.take_queued_lookup(), Some(2));
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut app = App::default();
        let first = app.begin_lookup().unwrap();
        app.on_lookup_finished(first, Err(failure(LookupError::NoJsonFound)));
        let second = app.begin_lookup().unwrap();

        app.on_lookup_finished(first, Ok(report(1)));
        assert!(app.is_loading());

        app.on_lookup_finished(second, Ok(report(1)));
        assert!(matches!(app.state, LookupState::Success(_)));
    }

    #[test]
    fn results_outside_loading_are_ignored() {
        let mut app = App::default();
        app.on_lookup_finished(0, Ok(report(1)));
        assert_eq!(app.state, LookupState::Idle);
    }

    #[test]
    fn failure_keeps_sources_visible() {
        let mut app = App::default();
        let generation = app.begin_lookup().unwrap();
        app.on_lookup_finished(generation, Err(failure(LookupError::MalformedJson("x".into()))));
        assert_eq!(app.sources().len(), 1);
        assert_eq!(app.raw_text(), None);
    }

    #[test]
    fn selection_wraps_around_attractions() {
        let mut app = App::default();
        let generation = app.begin_lookup().unwrap();
        app.on_lookup_finished(generation, Ok(report(3)));

        app.handle_key(key('k'));
        assert_eq!(app.selected_index, 2);
        app.handle_key(key('j'));
        assert_eq!(app.selected_index, 0);
    }

    #[test]
    fn permission_dialog_is_modal() {
        let mut app = App::default();
        let (tx, mut rx) = oneshot::channel();
        app.on_permission_request(tx);

        app.handle_key(key('3'));
        assert_eq!(app.view_mode, ViewMode::Dashboard);

        app.handle_key(key('y'));
        assert!(app.pending_permission.is_none());
        assert_eq!(rx.try_recv(), Ok(true));
    }

    #[test]
    fn quitting_from_dialog_denies() {
        let mut app = App::default();
        let (tx, mut rx) = oneshot::channel();
        app.on_permission_request(tx);
        app.handle_key(key('q'));
        assert!(app.should_quit);
        assert_eq!(rx.try_recv(), Ok(false));
    }

    #[test]
    fn view_names_parse_loosely() {
        assert_eq!(ViewMode::from_name("Sources"), ViewMode::Sources);
        assert_eq!(ViewMode::from_name("raw"), ViewMode::Raw);
        assert_eq!(ViewMode::from_name("whatever"), ViewMode::Dashboard);
    }
}
