use std::fmt;

use crate::actor;
use crate::capture::UpdateSource;
use crate::model::{Display, SelectionSnapshot, Thumbnail, WindowId};

/// What the overlay is told. It only ever receives copies; the session owns
/// the selection.
#[derive(Debug, Clone)]
pub enum PresentationEvent {
    Open {
        display: Option<Display>,
        selection: SelectionSnapshot,
    },
    Selected {
        index: usize,
        window_id: WindowId,
    },
    Thumbnail {
        index: usize,
        window_id: WindowId,
        image: Thumbnail,
        source: UpdateSource,
    },
    Close,
}

pub type Sender = actor::Sender<PresentationEvent>;
pub type Receiver = actor::Receiver<PresentationEvent>;

impl fmt::Display for PresentationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationEvent::Open { display, selection } => {
                write!(f, "open")?;
                if let Some(display) = display {
                    write!(f, " display={}", display.id)?;
                }
                let names: Vec<&str> =
                    selection.entries.iter().map(|e| e.display_name.as_str()).collect();
                write!(f, " index={} entries={:?}", selection.index, names)
            }
            PresentationEvent::Selected { index, window_id } => {
                write!(f, "selected index={index} window={window_id}")
            }
            PresentationEvent::Thumbnail { index, window_id, image, source } => write!(
                f,
                "thumbnail index={index} window={window_id} size={}x{} source={source:?}",
                image.width(),
                image.height()
            ),
            PresentationEvent::Close => write!(f, "close"),
        }
    }
}
