//! Prioritized snapshot capture on a small background worker pool.
//!
//! A request is one job: its entries are fetched in priority order by a
//! single worker, so cache misses publish in that order. Several workers let
//! a refresh run alongside a still-running earlier request; the in-flight set
//! keeps them from fetching the same window twice under one ticket.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::capture::cache::ThumbnailCache;
use crate::capture::geometry::{CardGeometry, resolution_budget};
use crate::capture::process::{CardCanvas, render_card};
use crate::capture::{ImageUpdate, UpdateSink, UpdateSource};
use crate::common::collections::HashSet;
use crate::common::config::CaptureSettings;
use crate::model::{SessionTickets, Thumbnail, WindowEntry, WindowId};
use crate::sys::backend::{BackendError, ImagingBackend, ResolutionBudget};

struct FetchItem {
    id: WindowId,
    budget: ResolutionBudget,
    canvas: CardCanvas,
}

struct CaptureJob {
    ticket: u64,
    items: Vec<FetchItem>,
    urgent_slots: usize,
    sink: UpdateSink,
}

struct Shared {
    backend: Arc<dyn ImagingBackend>,
    cache: ThumbnailCache,
    tickets: SessionTickets,
    in_flight: Mutex<HashSet<(u64, WindowId)>>,
}

pub struct CapturePipeline {
    shared: Arc<Shared>,
    settings: CaptureSettings,
    card: CardGeometry,
    jobs: Sender<CaptureJob>,
}

impl CapturePipeline {
    pub fn new(
        backend: Arc<dyn ImagingBackend>,
        cache: ThumbnailCache,
        tickets: SessionTickets,
        settings: CaptureSettings,
        card: CardGeometry,
    ) -> Self {
        let shared = Arc::new(Shared {
            backend,
            cache,
            tickets,
            in_flight: Mutex::new(HashSet::default()),
        });
        let (jobs, rx) = unbounded::<CaptureJob>();
        for n in 0..settings.workers.max(1) {
            let shared = shared.clone();
            let rx = rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("capture-{n}"))
                .spawn(move || run_worker(&shared, &rx));
            if let Err(err) = spawned {
                warn!(%err, "could not start capture worker");
            }
        }
        Self { shared, settings, card, jobs }
    }

    pub fn cache(&self) -> &ThumbnailCache { &self.shared.cache }

    pub fn set_settings(&mut self, settings: CaptureSettings, card: CardGeometry) {
        self.settings = settings;
        self.card = card;
    }

    /// Queues a fetch of every entry, most prominent first, and returns the
    /// images already cached for them so they can be painted immediately.
    ///
    /// Each fetched image is handed to `sink` as soon as it is ready, tagged
    /// with `ticket`. Work for a ticket that is no longer current stops at the
    /// next entry.
    pub fn request(
        &self,
        ticket: u64,
        entries: &[WindowEntry],
        focus: usize,
        sink: UpdateSink,
    ) -> Vec<(WindowId, Thumbnail)> {
        let order = priority_order(entries.len(), focus);
        if order.is_empty() {
            return Vec::new();
        }
        let ids: Vec<WindowId> = order.iter().map(|&i| entries[i].id).collect();
        let ready = self.shared.cache.peek_many(&ids);

        let items = order
            .into_iter()
            .map(|i| self.fetch_item(&entries[i]))
            .collect();
        let job = CaptureJob {
            ticket,
            items,
            urgent_slots: self.settings.urgent_slots,
            sink,
        };
        if self.jobs.send(job).is_err() {
            warn!("capture workers are gone; thumbnails will not refresh");
        }
        ready
    }

    fn fetch_item(&self, entry: &WindowEntry) -> FetchItem {
        let (width, height) = self.card.canvas_size(&entry.bounds, self.settings.scale);
        FetchItem {
            id: entry.id,
            budget: resolution_budget(&entry.bounds, self.settings.max_dimension, self.settings.scale),
            canvas: CardCanvas {
                width,
                height,
                shade: self.settings.background_shade,
                trim_dark_edges: false,
            },
        }
    }
}

/// Focus first, then alternating right/left neighbours moving outward:
/// `focus, focus+1, focus-1, focus+2, focus-2, ...`. An out-of-range focus is
/// clamped to the last index.
pub fn priority_order(len: usize, focus: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let start = focus.min(len - 1);
    let mut order = Vec::with_capacity(len);
    order.push(start);
    for step in 1..len {
        if start + step < len {
            order.push(start + step);
        }
        if let Some(left) = start.checked_sub(step) {
            order.push(left);
        }
    }
    order
}

fn run_worker(shared: &Shared, rx: &Receiver<CaptureJob>) {
    while let Ok(job) = rx.recv() {
        shared.process(job);
    }
}

impl Shared {
    fn process(&self, job: CaptureJob) {
        for (slot, item) in job.items.iter().enumerate() {
            if !self.tickets.is_current(job.ticket) {
                debug!(ticket = job.ticket, remaining = job.items.len() - slot, "capture request superseded");
                return;
            }
            if slot >= job.urgent_slots && self.cache.contains(item.id) {
                trace!(window = %item.id, "cached, not refetched");
                continue;
            }
            if !self.in_flight.lock().insert((job.ticket, item.id)) {
                trace!(window = %item.id, "already being fetched");
                continue;
            }
            let result = self.fetch(item);
            self.in_flight.lock().remove(&(job.ticket, item.id));

            let image = match result {
                Ok(image) => Arc::new(image),
                Err(err) => {
                    debug!(window = %item.id, %err, "thumbnail capture skipped");
                    continue;
                }
            };
            self.cache.store(item.id, image.clone());
            if self.tickets.is_current(job.ticket) {
                (job.sink)(ImageUpdate {
                    ticket: job.ticket,
                    window_id: item.id,
                    image,
                    source: UpdateSource::Snapshot,
                });
            }
        }
    }

    fn fetch(&self, item: &FetchItem) -> Result<image::RgbaImage, BackendError> {
        let target = self.backend.resolve(item.id)?;
        let raw = self.backend.capture_still(&target, item.budget)?;
        if raw.width() == 0 || raw.height() == 0 {
            return Err(BackendError::NoData);
        }
        Ok(render_card(raw, &item.canvas))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sys::geometry::Rect;
    use crate::sys::synthetic::{SyntheticDesktop, SyntheticWindow, window_color};

    const WAIT: Duration = Duration::from_secs(5);

    fn desktop(n: u32) -> Arc<SyntheticDesktop> {
        Arc::new(SyntheticDesktop::new(
            (1..=n)
                .map(|id| SyntheticWindow {
                    id: WindowId::new(id),
                    title: Some(format!("window {id}")),
                    owner: format!("App{id}"),
                    pid: id as i32,
                    bounds: Rect::new(0.0, 0.0, 800.0, 600.0),
                    declined: false,
                })
                .collect(),
        ))
    }

    fn entries(desktop: &SyntheticDesktop) -> Vec<WindowEntry> {
        use crate::sys::enumerate::WindowEnumerator;
        desktop.list(crate::model::WindowScope::All)
    }

    fn pipeline(desktop: Arc<SyntheticDesktop>, tickets: SessionTickets) -> CapturePipeline {
        let settings = CaptureSettings { workers: 1, ..CaptureSettings::default() };
        CapturePipeline::new(desktop, ThumbnailCache::new(80), tickets, settings, CardGeometry::default())
    }

    fn collector() -> (UpdateSink, crossbeam_channel::Receiver<ImageUpdate>) {
        let (tx, rx) = unbounded::<ImageUpdate>();
        let sink: UpdateSink = Arc::new(move |update: ImageUpdate| {
            let _ = tx.send(update);
        });
        (sink, rx)
    }

    fn recv_ids(rx: &crossbeam_channel::Receiver<ImageUpdate>, n: usize) -> Vec<u32> {
        (0..n).map(|_| rx.recv_timeout(WAIT).unwrap().window_id.as_u32()).collect()
    }

    #[test]
    fn priority_alternates_outward_from_focus() {
        assert_eq!(priority_order(5, 2), vec![2, 3, 1, 4, 0]);
        assert_eq!(priority_order(4, 0), vec![0, 1, 2, 3]);
        assert_eq!(priority_order(4, 3), vec![3, 2, 1, 0]);
        assert_eq!(priority_order(3, 9), vec![2, 1, 0]);
        assert_eq!(priority_order(1, 0), vec![0]);
        assert!(priority_order(0, 0).is_empty());
    }

    #[test]
    fn misses_publish_in_priority_order_and_fill_the_cache() {
        let desktop = desktop(5);
        let tickets = SessionTickets::new();
        let ticket = tickets.bump().value();
        let pipeline = pipeline(desktop.clone(), tickets);
        let (sink, rx) = collector();

        let ready = pipeline.request(ticket, &entries(&desktop), 2, sink);
        assert!(ready.is_empty());
        assert_eq!(recv_ids(&rx, 5), vec![3, 4, 2, 5, 1]);
        assert_eq!(pipeline.cache().len(), 5);

        let thumb = pipeline.cache().peek(WindowId::new(3)).unwrap();
        let expected = CardGeometry::default().canvas_size(&Rect::new(0.0, 0.0, 800.0, 600.0), 2.0);
        assert_eq!(thumb.dimensions(), expected);
        assert_eq!(*thumb.get_pixel(10, 10), window_color(WindowId::new(3)));
    }

    #[test]
    fn cached_entries_outside_the_urgent_slots_are_not_refetched() {
        let desktop = desktop(5);
        let tickets = SessionTickets::new();
        let ticket = tickets.bump().value();
        let pipeline = pipeline(desktop.clone(), tickets);
        let entries = entries(&desktop);

        let (sink, rx) = collector();
        pipeline.request(ticket, &entries, 0, sink);
        recv_ids(&rx, 5);
        assert_eq!(desktop.captures().len(), 5);

        let (sink, rx) = collector();
        let ready = pipeline.request(ticket, &entries, 0, sink);
        assert_eq!(ready.len(), 5);
        assert_eq!(recv_ids(&rx, 3), vec![1, 2, 3]);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(desktop.captures().len(), 8);
    }

    #[test]
    fn declined_windows_are_skipped() {
        let desktop = desktop(3);
        desktop.add_window(SyntheticWindow {
            id: WindowId::new(9),
            title: Some("protected".into()),
            owner: "Vault".into(),
            pid: 9,
            bounds: Rect::new(0.0, 0.0, 800.0, 600.0),
            declined: true,
        });
        let tickets = SessionTickets::new();
        let ticket = tickets.bump().value();
        let pipeline = pipeline(desktop.clone(), tickets);
        let (sink, rx) = collector();

        pipeline.request(ticket, &entries(&desktop), 0, sink);
        assert_eq!(recv_ids(&rx, 3), vec![1, 2, 3]);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(!pipeline.cache().contains(WindowId::new(9)));
    }

    #[test]
    fn superseded_requests_stop_and_publish_nothing() {
        let desktop = desktop(4);
        let tickets = SessionTickets::new();
        let old = tickets.bump().value();
        let pipeline = pipeline(desktop.clone(), tickets.clone());
        let entries = entries(&desktop);

        desktop.hold();
        let (sink, rx) = collector();
        pipeline.request(old, &entries, 0, sink.clone());
        let current = tickets.bump().value();
        desktop.release();

        // One worker: the second job runs only after the first has finished.
        pipeline.request(current, &entries[3..], 0, sink);
        let update = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(update.ticket, current);
        assert_eq!(update.window_id, WindowId::new(4));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(desktop.captures().len() <= 2, "{:?}", desktop.captures());
    }
}
