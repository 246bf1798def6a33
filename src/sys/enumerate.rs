//! Window enumeration: the collaborator that produces switcher candidates,
//! plus the platform-independent filtering applied to raw window-server lists.

use crate::common::collections::HashMap;
use crate::model::{Display, WindowEntry, WindowId, WindowScope, pid_t};
use crate::sys::geometry::Rect;

pub trait WindowEnumerator: Send + Sync + 'static {
    /// Candidates in most-recently-used order (the active window first).
    fn list(&self, scope: WindowScope) -> Vec<WindowEntry>;

    /// The display under the pointer, if known.
    fn active_display(&self) -> Option<Display>;
}

/// One row of the window server's on-screen window list.
#[derive(Debug, Clone)]
pub struct RawWindowInfo {
    pub id: WindowId,
    pub layer: i32,
    pub alpha: f64,
    pub owner_pid: pid_t,
    pub owner_name: String,
    pub title: Option<String>,
    pub bounds: Rect,
}

pub const EXCLUDED_OWNERS: &[&str] = &[
    "WindowManager",
    "Control Centre",
    "Notification Centre",
    "Window Server",
    "Dock",
];

const MIN_EDGE: f64 = 50.0;
const DOMINATED_OVERLAP: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct CandidateFilter<'a> {
    pub self_pid: pid_t,
    pub scope: WindowScope,
    pub excluded_owners: &'a [&'a str],
}

impl<'a> CandidateFilter<'a> {
    pub fn new(self_pid: pid_t, scope: WindowScope) -> Self {
        Self {
            self_pid,
            scope,
            excluded_owners: EXCLUDED_OWNERS,
        }
    }
}

/// Reduces a raw front-to-back window list to switcher candidates, keeping
/// the input order.
///
/// Untitled windows that mostly cover an earlier window of the same process
/// are treated as helper surfaces (sheets, shadows, popovers) and dropped.
pub fn filter_candidates(raw: &[RawWindowInfo], filter: &CandidateFilter<'_>) -> Vec<WindowEntry> {
    let mut entries = Vec::new();
    let mut seen: HashMap<pid_t, Vec<Rect>> = HashMap::default();

    for info in raw {
        if info.layer != 0 || info.alpha <= 0.0 {
            continue;
        }
        if info.owner_pid == filter.self_pid
            || filter.excluded_owners.contains(&info.owner_name.as_str())
        {
            continue;
        }
        if info.bounds.width <= MIN_EDGE || info.bounds.height <= MIN_EDGE {
            continue;
        }
        if let WindowScope::Display(frame) = filter.scope
            && !frame.contains(info.bounds.mid())
        {
            continue;
        }

        let title = info.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let rects = seen.entry(info.owner_pid).or_default();
        if title.is_none() && rects.iter().any(|prev| dominates(prev, &info.bounds)) {
            continue;
        }
        rects.push(info.bounds);

        let name = title.unwrap_or(&info.owner_name);
        entries.push(WindowEntry::new(
            info.id,
            name,
            info.owner_name.clone(),
            info.owner_pid,
            info.bounds,
        ));
    }

    entries
}

fn dominates(existing: &Rect, candidate: &Rect) -> bool {
    let Some(overlap) = existing.intersection(candidate) else {
        return false;
    };
    let smaller = existing.area().min(candidate.area());
    overlap.area() > smaller * DOMINATED_OVERLAP
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn raw(id: u32, pid: pid_t, owner: &str, title: Option<&str>, bounds: Rect) -> RawWindowInfo {
        RawWindowInfo {
            id: WindowId::new(id),
            layer: 0,
            alpha: 1.0,
            owner_pid: pid,
            owner_name: owner.to_string(),
            title: title.map(str::to_string),
            bounds,
        }
    }

    fn ids(entries: &[WindowEntry]) -> Vec<u32> { entries.iter().map(|e| e.id.as_u32()).collect() }

    const BIG: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    #[test]
    fn drops_system_self_tiny_and_invisible_windows() {
        let mut hidden = raw(3, 30, "Notes", Some("hidden"), BIG);
        hidden.alpha = 0.0;
        let mut menu = raw(4, 40, "Menus", Some("menu"), BIG);
        menu.layer = 25;
        let list = vec![
            raw(1, 10, "Terminal", Some("shell"), BIG),
            raw(2, 20, "Dock", Some("Dock"), BIG),
            hidden,
            menu,
            raw(5, 99, "section", Some("overlay"), BIG),
            raw(6, 60, "Finder", Some("tiny"), Rect::new(0.0, 0.0, 50.0, 400.0)),
            raw(7, 70, "Mail", Some("Inbox"), BIG),
        ];

        let entries = filter_candidates(&list, &CandidateFilter::new(99, WindowScope::All));
        assert_eq!(ids(&entries), vec![1, 7]);
    }

    #[test]
    fn untitled_windows_fall_back_to_owner_name_and_drop_overlapping_helpers() {
        let list = vec![
            raw(1, 10, "Safari", Some("  Docs  "), BIG),
            raw(2, 10, "Safari", None, Rect::new(10.0, 10.0, 780.0, 580.0)),
            raw(3, 10, "Safari", Some(""), Rect::new(900.0, 0.0, 400.0, 400.0)),
            raw(4, 20, "Preview", None, Rect::new(20.0, 20.0, 700.0, 500.0)),
        ];

        let entries = filter_candidates(&list, &CandidateFilter::new(1, WindowScope::All));
        assert_eq!(ids(&entries), vec![1, 3, 4]);
        assert_eq!(entries[0].display_name, "Docs");
        assert_eq!(entries[1].display_name, "Safari");
        assert_eq!(entries[2].display_name, "Preview");
    }

    #[test]
    fn display_scope_keeps_windows_centered_on_that_display() {
        let left = Rect::new(0.0, 0.0, 1440.0, 900.0);
        let list = vec![
            raw(1, 10, "Terminal", Some("a"), Rect::new(100.0, 100.0, 600.0, 400.0)),
            raw(2, 10, "Terminal", Some("b"), Rect::new(1400.0, 100.0, 600.0, 400.0)),
            raw(3, 20, "Mail", Some("c"), Rect::new(1200.0, 100.0, 600.0, 400.0)),
        ];

        let entries =
            filter_candidates(&list, &CandidateFilter::new(1, WindowScope::Display(left)));
        assert_eq!(ids(&entries), vec![1]);
    }
}
