//! Actor plumbing: every message carries the sender's tracing span so the
//! receiving loop can re-enter it while handling the event.

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{
    UnboundedReceiver, UnboundedSender, WeakUnboundedSender, unbounded_channel,
};
use tracing::Span;

pub mod presentation;
pub mod switcher;

pub struct Sender<Event>(UnboundedSender<(Span, Event)>);

pub type Receiver<Event> = UnboundedReceiver<(Span, Event)>;

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Event> Sender<Event> {
    /// Sends, ignoring a closed receiver.
    pub fn send(&self, event: Event) { _ = self.try_send(event); }

    pub fn try_send(&self, event: Event) -> Result<(), SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }

    pub fn is_closed(&self) -> bool { self.0.is_closed() }

    pub fn downgrade(&self) -> WeakSender<Event> { WeakSender(self.0.downgrade()) }
}

/// A sender that does not keep the receiving actor alive. Used for callbacks
/// owned by the actor itself.
pub struct WeakSender<Event>(WeakUnboundedSender<(Span, Event)>);

impl<Event> Clone for WeakSender<Event> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Event> WeakSender<Event> {
    /// Sends if the actor is still running.
    pub fn send(&self, event: Event) {
        if let Some(tx) = self.0.upgrade() {
            _ = tx.send((Span::current(), event));
        }
    }
}

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = unbounded_channel();
    (Sender(tx), rx)
}
