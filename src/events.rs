//! Event types and the main event loop driver for GeoGuide.
//!
//! This module defines the [`Event`] enum (keyboard input, ticks, lookup
//! completions and permission requests) and the [`EventHandler`], which runs
//! a background task that polls crossterm for key events and emits periodic
//! [`Event::Tick`]s. Lookup tasks post their results through
//! [`EventHandler::tx`], and [`ChannelPrompt`] turns a location permission
//! question into an [`Event::PermissionRequest`] the UI answers.

use crate::location::PermissionPrompt;
use crate::lookup::LookupOutcome;
use async_trait::async_trait;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

/// Events processed by the application event loop.
pub enum Event {
    /// Periodic tick used for spinner animation.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// A lookup task finished.
    LookupFinished {
        /// Generation handed out by [`App::begin_lookup`](crate::app::App::begin_lookup).
        generation: u64,
        outcome: Box<LookupOutcome>,
    },
    /// The geolocator wants a yes/no on location access.
    PermissionRequest(oneshot::Sender<bool>),
}

/// Multiplexes terminal input and ticks into a single event stream.
///
/// The sender ([`tx`](EventHandler::tx)) can be cloned and handed to lookup
/// tasks, while the receiver is consumed by [`next`](EventHandler::next) in
/// the main loop.
pub struct EventHandler {
    /// Sender for posting events from lookup tasks and the permission prompt.
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The task polls crossterm with a timeout of `tick_rate_ms`; key presses
    /// become [`Event::Input`] and each elapsed interval an [`Event::Tick`].
    /// It stops when the terminal can no longer be read or the receiver is
    /// gone.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::task::spawn_blocking(move || {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            if event_tx.send(Event::Input(key)).is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            return;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        return;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        return;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event from the channel.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Routes permission questions to the UI through the event channel.
pub struct ChannelPrompt {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelPrompt {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl PermissionPrompt for ChannelPrompt {
    /// A closed channel or a dropped responder counts as a denial.
    async fn ask(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Event::PermissionRequest(reply_tx)).is_err() {
            warn!("Event loop gone; treating permission as denied");
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }
}
