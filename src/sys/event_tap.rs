/// Handle on the platform's global keyboard tap.
///
/// The OS disables a tap whose callback is too slow or that the user
/// interrupts; the gesture driver re-enables it from a watchdog.
pub trait InputTap: Send + Sync + 'static {
    fn is_enabled(&self) -> bool;

    fn enable(&self);
}
