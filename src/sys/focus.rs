use crate::model::WindowEntry;

/// Raises a window and brings its owning process to the front.
pub trait FocusActivator: Send + Sync + 'static {
    fn activate(&self, entry: &WindowEntry);
}
