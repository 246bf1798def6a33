use crate::model::window::{Thumbnail, WindowEntry, WindowId};

/// The ordered candidate list for one open episode plus the focused index.
///
/// A `Selection` is never empty, so `index` is always valid. Closed sessions
/// hold no selection at all.
#[derive(Debug, Clone)]
pub struct Selection {
    entries: Vec<WindowEntry>,
    index: usize,
}

/// Read-only copy of a selection handed to presentation.
#[derive(Debug, Clone)]
pub struct SelectionSnapshot {
    pub entries: Vec<WindowEntry>,
    pub index: usize,
}

impl Selection {
    /// Focus starts on the second entry: the most recently used window after
    /// the active one.
    pub fn new(entries: Vec<WindowEntry>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let index = 1usize.min(entries.len() - 1);
        Some(Self { entries, index })
    }

    pub fn entries(&self) -> &[WindowEntry] { &self.entries }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn index(&self) -> usize { self.index }

    pub fn focused(&self) -> &WindowEntry { &self.entries[self.index] }

    pub fn advance(&mut self) -> usize {
        self.index = (self.index + 1) % self.entries.len();
        self.index
    }

    pub fn retreat(&mut self) -> usize {
        let len = self.entries.len();
        self.index = (self.index + len - 1) % len;
        self.index
    }

    /// Replaces the thumbnail of the entry with `id`, returning its position.
    pub fn set_thumbnail(&mut self, id: WindowId, image: Thumbnail) -> Option<usize> {
        let pos = self.entries.iter().position(|entry| entry.id == id)?;
        self.entries[pos].thumbnail = Some(image);
        Some(pos)
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            entries: self.entries.clone(),
            index: self.index,
        }
    }
}
