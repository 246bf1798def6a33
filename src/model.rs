pub mod selection;
pub mod ticket;
pub mod window;

pub use selection::{Selection, SelectionSnapshot};
pub use ticket::{SessionTickets, Ticket};
pub use window::{Display, Thumbnail, WindowEntry, WindowId, WindowScope, pid_t};
