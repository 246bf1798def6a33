//! One switcher episode at a time: the selection, its ticket, and the
//! capture and live-preview work started on its behalf.
//!
//! Lives on the coordination context. Background results only reach the
//! selection through [`SwitcherSession::apply_update`], which drops anything
//! issued under an older ticket.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::actor::presentation::{self, PresentationEvent};
use crate::capture::geometry::CardGeometry;
use crate::capture::{
    CapturePipeline, ImageUpdate, LivePhase, LivePreview, ThumbnailCache, UpdateSink, UpdateSource,
};
use crate::common::config::{PreviewMode, Settings};
use crate::model::{Display, Selection, SelectionSnapshot, SessionTickets, WindowEntry};
use crate::sys::backend::ImagingBackend;
use crate::sys::focus::FocusActivator;

/// Counters for the current episode, reset on every open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub steps: usize,
    pub throttled_steps: usize,
    pub applied_updates: usize,
    pub stale_updates: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub struct SwitcherSession {
    settings: Settings,
    tickets: SessionTickets,
    ticket: u64,
    selection: Option<Selection>,
    pipeline: CapturePipeline,
    live: LivePreview,
    activator: Arc<dyn FocusActivator>,
    presentation: presentation::Sender,
    sink: UpdateSink,
    last_step: Option<Instant>,
    stats: SessionStats,
}

impl SwitcherSession {
    /// `sink` receives snapshot results on worker threads and `live_ready` is
    /// called from backend threads when a live frame is waiting; both should
    /// only forward to the coordination context.
    pub fn new(
        settings: Settings,
        backend: Arc<dyn ImagingBackend>,
        activator: Arc<dyn FocusActivator>,
        presentation: presentation::Sender,
        sink: UpdateSink,
        live_ready: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let tickets = SessionTickets::new();
        let cache = ThumbnailCache::new(settings.capture.cache_capacity);
        let pipeline = CapturePipeline::new(
            backend.clone(),
            cache,
            tickets.clone(),
            settings.capture.clone(),
            CardGeometry::new(settings.card),
        );
        let live = LivePreview::new(backend, &settings, live_ready);
        Self {
            ticket: tickets.current().value(),
            settings,
            tickets,
            selection: None,
            pipeline,
            live,
            activator,
            presentation,
            sink,
            last_step: None,
            stats: SessionStats::default(),
        }
    }

    pub fn is_open(&self) -> bool { self.selection.is_some() }

    pub fn ticket(&self) -> u64 { self.ticket }

    pub fn stats(&self) -> SessionStats { self.stats }

    pub fn preview_mode(&self) -> PreviewMode { self.settings.switcher.preview }

    pub fn live_phase(&self) -> LivePhase { self.live.phase() }

    pub fn cache(&self) -> &ThumbnailCache { self.pipeline.cache() }

    pub fn snapshot(&self) -> Option<SelectionSnapshot> { self.selection.as_ref().map(Selection::snapshot) }

    /// Opens a new episode over `candidates`. Does nothing for an empty list.
    pub fn open(&mut self, candidates: Vec<WindowEntry>, display: Option<Display>) -> bool {
        let Some(mut selection) = Selection::new(candidates) else {
            debug!("no candidates; switcher not opened");
            return false;
        };
        self.ticket = self.tickets.bump().value();
        self.stats = SessionStats::default();
        self.last_step = None;

        let ready = self.pipeline.request(
            self.ticket,
            selection.entries(),
            selection.index(),
            self.sink.clone(),
        );
        for (id, image) in ready {
            selection.set_thumbnail(id, image);
        }
        if self.settings.switcher.preview == PreviewMode::Video {
            self.live.retarget(selection.focused(), self.ticket);
        }
        info!(ticket = self.ticket, entries = selection.len(), index = selection.index(), "switcher opened");
        self.presentation.send(PresentationEvent::Open {
            display,
            selection: selection.snapshot(),
        });
        self.selection = Some(selection);
        true
    }

    pub fn advance(&mut self, repeat: bool) -> bool { self.step(Direction::Forward, repeat, Instant::now()) }

    pub fn retreat(&mut self, repeat: bool) -> bool { self.step(Direction::Backward, repeat, Instant::now()) }

    /// Moves the focus one entry with wraparound. Auto-repeat steps closer
    /// than the step interval to the last applied step are dropped. Returns
    /// whether the focus moved.
    pub fn step(&mut self, direction: Direction, repeat: bool, now: Instant) -> bool {
        let Some(selection) = self.selection.as_mut() else {
            return false;
        };
        if repeat
            && let Some(last) = self.last_step
            && now.saturating_duration_since(last) < self.settings.switcher.step_interval()
        {
            self.stats.throttled_steps += 1;
            trace!(?direction, "auto-repeat step throttled");
            return false;
        }
        self.last_step = Some(now);
        self.stats.steps += 1;
        let index = match direction {
            Direction::Forward => selection.advance(),
            Direction::Backward => selection.retreat(),
        };
        let window_id = selection.focused().id;
        debug!(index, window = %window_id, "selection moved");
        self.presentation.send(PresentationEvent::Selected { index, window_id });
        true
    }

    /// Whether steps should be followed by a (debounced) live retarget.
    pub fn wants_live(&self) -> bool {
        self.is_open() && self.settings.switcher.preview == PreviewMode::Video
    }

    pub fn retarget_live(&mut self) {
        if !self.wants_live() {
            return;
        }
        if let Some(selection) = &self.selection {
            self.live.retarget(selection.focused(), self.ticket);
        }
    }

    /// Re-requests thumbnails around the current focus under the current
    /// ticket.
    pub fn refresh_thumbnails(&mut self) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        let ready = self.pipeline.request(
            self.ticket,
            selection.entries(),
            selection.index(),
            self.sink.clone(),
        );
        for (id, image) in ready {
            let unchanged = selection
                .entries()
                .iter()
                .any(|e| e.id == id && e.thumbnail.as_ref().is_some_and(|t| Arc::ptr_eq(t, &image)));
            if unchanged {
                continue;
            }
            if let Some(index) = selection.set_thumbnail(id, image.clone()) {
                self.presentation.send(PresentationEvent::Thumbnail {
                    index,
                    window_id: id,
                    image,
                    source: UpdateSource::Snapshot,
                });
            }
        }
    }

    /// Applies a background result if it belongs to the open episode.
    pub fn apply_update(&mut self, update: ImageUpdate) -> bool {
        let current = update.ticket == self.ticket && self.tickets.is_current(update.ticket);
        let Some(selection) = self.selection.as_mut().filter(|_| current) else {
            self.stats.stale_updates += 1;
            trace!(ticket = update.ticket, current = self.ticket, window = %update.window_id, "stale update dropped");
            return false;
        };
        let Some(index) = selection.set_thumbnail(update.window_id, update.image.clone()) else {
            return false;
        };
        self.stats.applied_updates += 1;
        self.presentation.send(PresentationEvent::Thumbnail {
            index,
            window_id: update.window_id,
            image: update.image,
            source: update.source,
        });
        true
    }

    /// Applies the newest pending live frame, if any.
    pub fn take_live_frame(&mut self) -> bool {
        match self.live.take_frame() {
            Some(update) => self.apply_update(update),
            None => false,
        }
    }

    /// Closes the episode and raises the focused window. Returns the entry
    /// that was activated.
    pub fn confirm(&mut self) -> Option<WindowEntry> {
        let selection = self.selection.take()?;
        let entry = selection.focused().clone();
        self.teardown();
        self.activator.activate(&entry);
        info!(window = %entry.id, name = %entry.display_name, "switcher confirmed");
        self.presentation.send(PresentationEvent::Close);
        Some(entry)
    }

    pub fn cancel(&mut self) -> bool { self.close("cancelled") }

    /// Teardown requested from outside the gesture (display change, focus
    /// loss of the overlay, ...).
    pub fn external_dismiss(&mut self) -> bool { self.close("dismissed") }

    /// Activates the most recently used window after the active one without
    /// opening the switcher.
    pub fn quick_switch(&mut self, candidates: &[WindowEntry]) -> Option<WindowEntry> {
        if self.is_open() {
            self.cancel();
        }
        let entry = candidates.get(1)?.clone();
        self.activator.activate(&entry);
        info!(window = %entry.id, name = %entry.display_name, "quick switch");
        Some(entry)
    }

    pub fn set_preview_mode(&mut self, mode: PreviewMode) {
        if self.settings.switcher.preview == mode {
            return;
        }
        self.settings.switcher.preview = mode;
        match mode {
            PreviewMode::Picture => self.live.stop(),
            PreviewMode::Video => self.retarget_live(),
        }
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.pipeline.set_settings(settings.capture.clone(), CardGeometry::new(settings.card));
        self.live.set_settings(&settings);
        let previous = self.settings.switcher.preview;
        let mode = settings.switcher.preview;
        self.settings = settings;
        self.settings.switcher.preview = previous;
        self.set_preview_mode(mode);
    }

    /// Blocks until the live engine has finished pending stream operations.
    pub fn wait_live_idle(&self, timeout: std::time::Duration) -> bool { self.live.wait_idle(timeout) }

    fn close(&mut self, reason: &str) -> bool {
        if self.selection.take().is_none() {
            return false;
        }
        self.teardown();
        info!(reason, "switcher closed");
        self.presentation.send(PresentationEvent::Close);
        true
    }

    fn teardown(&mut self) {
        self.ticket = self.tickets.bump().value();
        self.last_step = None;
        self.live.stop();
    }
}
