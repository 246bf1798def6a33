use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::sys::geometry::Rect;

#[allow(non_camel_case_types)]
pub type pid_t = i32;

/// Opaque window-server handle for an on-screen window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(u32);

impl WindowId {
    pub const fn new(id: u32) -> Self { Self(id) }

    pub const fn as_u32(self) -> u32 { self.0 }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// A processed, ready-to-draw preview image. Cheap to clone.
pub type Thumbnail = Arc<RgbaImage>;

/// One candidate window in the switcher grid.
///
/// `bounds` and the names are fixed for the lifetime of a session; only
/// `thumbnail` changes as capture results arrive.
#[derive(Clone)]
pub struct WindowEntry {
    pub id: WindowId,
    pub display_name: String,
    pub owner_name: String,
    pub owner_pid: pid_t,
    pub bounds: Rect,
    pub thumbnail: Option<Thumbnail>,
}

impl WindowEntry {
    pub fn new(
        id: WindowId,
        display_name: impl Into<String>,
        owner_name: impl Into<String>,
        owner_pid: pid_t,
        bounds: Rect,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            owner_name: owner_name.into(),
            owner_pid,
            bounds,
            thumbnail: None,
        }
    }
}

impl fmt::Debug for WindowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowEntry")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("owner_name", &self.owner_name)
            .field("owner_pid", &self.owner_pid)
            .field("bounds", &self.bounds)
            .field(
                "thumbnail",
                &self.thumbnail.as_ref().map(|img| (img.width(), img.height())),
            )
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Display {
    pub id: u32,
    pub frame: Rect,
}

/// Which windows are offered when the switcher opens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowScope {
    All,
    Display(Rect),
}
