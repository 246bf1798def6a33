//! Interface to the platform imaging service (still captures and video
//! streams of individual windows).
//!
//! Implementations wrap thin OS calls; every method may block and is only
//! ever invoked from background workers, never from the coordination context.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::model::WindowId;
use crate::sys::geometry::Rect;

pub type RawImage = RgbaImage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("window {0} is not available for capture")]
    TargetNotFound(WindowId),
    #[error("capture of window {0} was declined")]
    Declined(WindowId),
    #[error("backend returned no image data")]
    NoData,
    #[error("stream {0} is not open")]
    UnknownStream(StreamHandle),
    #[error("{0}")]
    Other(String),
}

/// Pixel size requested from the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionBudget {
    pub width: u32,
    pub height: u32,
}

/// A window resolved against the backend's list of shareable content.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureTarget {
    pub window_id: WindowId,
    pub bounds: Rect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub const fn new(raw: u64) -> Self { Self(raw) }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// One frame delivered by an open stream.
pub struct StreamFrame {
    pub handle: StreamHandle,
    pub image: RawImage,
    /// False for idle/blank/partial frames the backend flags as incomplete.
    pub complete: bool,
}

/// Callback invoked on a backend thread for every delivered frame.
pub type FrameOutput = Arc<dyn Fn(StreamFrame) + Send + Sync>;

pub trait ImagingBackend: Send + Sync + 'static {
    fn resolve(&self, id: WindowId) -> Result<CaptureTarget, BackendError>;

    fn capture_still(
        &self,
        target: &CaptureTarget,
        budget: ResolutionBudget,
    ) -> Result<RawImage, BackendError>;

    fn open_stream(
        &self,
        target: &CaptureTarget,
        budget: ResolutionBudget,
        output: FrameOutput,
    ) -> Result<StreamHandle, BackendError>;

    /// Points an open stream at a new window. `budget` is `Some` only when the
    /// stream configuration must change as well.
    fn retarget(
        &self,
        handle: StreamHandle,
        target: &CaptureTarget,
        budget: Option<ResolutionBudget>,
    ) -> Result<(), BackendError>;

    /// Stops frame delivery to the output callback. Must not return while a
    /// callback for `handle` could still start.
    fn detach_output(&self, handle: StreamHandle);

    fn close(&self, handle: StreamHandle);
}
