pub mod backend;
pub mod enumerate;
pub mod event_tap;
pub mod focus;
pub mod geometry;
pub mod synthetic;
