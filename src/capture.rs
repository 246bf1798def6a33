//! Everything that turns backend pixels into thumbnails: post-processing,
//! the LRU cache, the snapshot pipeline and the live preview engine.

use std::sync::Arc;

use crate::model::{Thumbnail, WindowId};

pub mod cache;
pub mod geometry;
pub mod live;
pub mod mailbox;
pub mod pipeline;
pub mod process;
pub mod throttle;

pub use cache::ThumbnailCache;
pub use live::{LivePhase, LivePreview};
pub use pipeline::CapturePipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Snapshot,
    Live,
}

/// A finished image for one window, tagged with the session ticket it was
/// requested under.
#[derive(Clone)]
pub struct ImageUpdate {
    pub ticket: u64,
    pub window_id: WindowId,
    pub image: Thumbnail,
    pub source: UpdateSource,
}

impl std::fmt::Debug for ImageUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpdate")
            .field("ticket", &self.ticket)
            .field("window_id", &self.window_id)
            .field("size", &(self.image.width(), self.image.height()))
            .field("source", &self.source)
            .finish()
    }
}

/// Where background workers deliver finished images. Implementations must
/// only hand the update over to the coordination context, never apply it.
pub type UpdateSink = Arc<dyn Fn(ImageUpdate) + Send + Sync>;
