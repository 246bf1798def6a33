//! Drives the recognizer from the input tap callback.
//!
//! The callback must return at once, so state is updated synchronously and
//! everything else (intents, grace timers, tap re-enabling) is handed to the
//! runtime.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::actor::switcher;
use crate::common::config::GestureSettings;
use crate::input::{GestureRecognizer, GraceToken, InputEvent};
use crate::sys::event_tap::InputTap;

/// Cloneable handle used by the switcher to resynchronize the gesture when a
/// session ends outside of it.
#[derive(Clone)]
pub struct GestureHandle(Arc<Mutex<GestureRecognizer>>);

impl GestureHandle {
    pub fn reset(&self) { self.0.lock().reset(); }

    pub fn is_idle(&self) -> bool { self.0.lock().is_idle() }
}

pub struct GestureTap {
    recognizer: Arc<Mutex<GestureRecognizer>>,
    switcher: switcher::Sender,
    runtime: Handle,
    tap: Arc<dyn InputTap>,
    watchdog: CancellationToken,
}

impl GestureTap {
    /// Starts the tap watchdog on `runtime`; it runs until [`GestureTap::stop`]
    /// or drop.
    pub fn new(
        settings: &GestureSettings,
        tap: Arc<dyn InputTap>,
        switcher: switcher::Sender,
        runtime: Handle,
    ) -> Self {
        let recognizer = Arc::new(Mutex::new(GestureRecognizer::new(settings.grace_delay())));
        let watchdog = CancellationToken::new();
        runtime.spawn(watch_tap(tap.clone(), settings.tap_watchdog(), watchdog.clone()));
        Self {
            recognizer,
            switcher,
            runtime,
            tap,
            watchdog,
        }
    }

    pub fn handle(&self) -> GestureHandle { GestureHandle(self.recognizer.clone()) }

    pub fn set_settings(&self, settings: &GestureSettings) {
        self.recognizer.lock().set_grace_delay(settings.grace_delay());
    }

    /// Processes one tap event. Returns true if the event should be swallowed.
    pub fn on_event(&self, event: InputEvent) -> bool {
        let repeat = match event {
            InputEvent::Key { repeat, .. } => repeat,
            InputEvent::TapDisabled => {
                self.reenable();
                false
            }
            InputEvent::ModifierChanged { .. } => false,
        };
        let reaction = {
            let mut recognizer = self.recognizer.lock();
            let mut reaction = recognizer.handle(event);
            // Sent under the lock: a grace timer on another thread must not
            // interleave its intents with these.
            send_intents(&self.switcher, std::mem::take(&mut reaction.intents), repeat);
            reaction
        };
        if let Some((token, delay)) = reaction.schedule {
            self.schedule_grace(token, delay);
        }
        reaction.swallow
    }

    pub fn stop(&self) { self.watchdog.cancel(); }

    fn schedule_grace(&self, token: GraceToken, delay: Duration) {
        let recognizer = self.recognizer.clone();
        let switcher = self.switcher.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut recognizer = recognizer.lock();
            let reaction = recognizer.grace_elapsed(token);
            send_intents(&switcher, reaction.intents, false);
        });
    }

    fn reenable(&self) {
        let tap = self.tap.clone();
        self.runtime.spawn(async move {
            if !tap.is_enabled() {
                debug!("input tap disabled by the system; re-enabling");
                tap.enable();
            }
        });
    }
}

impl Drop for GestureTap {
    fn drop(&mut self) { self.stop(); }
}

fn send_intents(switcher: &switcher::Sender, intents: Vec<crate::input::Intent>, repeat: bool) {
    for intent in intents {
        switcher.send(switcher::Event::Intent {
            intent,
            repeat: repeat && intent.is_step(),
        });
    }
}

async fn watch_tap(tap: Arc<dyn InputTap>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(10)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !tap.is_enabled() {
                    warn!("input tap was disabled; re-enabling");
                    tap.enable();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actor;
    use crate::input::{Intent, KeyCode};

    #[derive(Default)]
    struct FakeTap {
        enabled: AtomicBool,
        enables: AtomicUsize,
    }

    impl InputTap for FakeTap {
        fn is_enabled(&self) -> bool { self.enabled.load(Ordering::SeqCst) }

        fn enable(&self) {
            self.enables.fetch_add(1, Ordering::SeqCst);
            self.enabled.store(true, Ordering::SeqCst);
        }
    }

    fn setup() -> (GestureTap, Arc<FakeTap>, switcher::Receiver) {
        let fake = Arc::new(FakeTap::default());
        fake.enabled.store(true, Ordering::SeqCst);
        let (tx, rx) = actor::channel();
        let tap = GestureTap::new(&GestureSettings::default(), fake.clone(), tx, Handle::current());
        (tap, fake, rx)
    }

    fn drain(rx: &mut switcher::Receiver) -> Vec<(Intent, bool)> {
        let mut out = Vec::new();
        while let Ok((_, event)) = rx.try_recv() {
            if let switcher::Event::Intent { intent, repeat } = event {
                out.push((intent, repeat));
            }
        }
        out
    }

    fn tab(repeat: bool) -> InputEvent {
        InputEvent::Key {
            code: KeyCode::Tab,
            modifier_held: true,
            shift_held: false,
            repeat,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn grace_timer_opens_the_switcher() {
        let (tap, _, mut rx) = setup();
        assert!(!tap.on_event(InputEvent::ModifierChanged { held: true }));
        assert!(tap.on_event(tab(false)));
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(130)).await;
        assert_eq!(drain(&mut rx), vec![(Intent::Show, false), (Intent::Advance, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_release_cancels_the_grace_timer() {
        let (tap, _, mut rx) = setup();
        tap.on_event(InputEvent::ModifierChanged { held: true });
        tap.on_event(tab(false));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tap.on_event(InputEvent::ModifierChanged { held: false });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(drain(&mut rx), vec![(Intent::QuickSwitch, false)]);
        assert!(tap.handle().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_repeat_steps_are_flagged() {
        let (tap, _, mut rx) = setup();
        tap.on_event(InputEvent::ModifierChanged { held: true });
        tap.on_event(tab(false));
        tokio::time::sleep(Duration::from_millis(130)).await;
        tap.on_event(tab(true));
        tap.on_event(InputEvent::ModifierChanged { held: false });
        assert_eq!(
            drain(&mut rx),
            vec![
                (Intent::Show, false),
                (Intent::Advance, false),
                (Intent::Advance, true),
                (Intent::Confirm, false),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_from_the_switcher_drops_a_pending_open() {
        let (tap, _, mut rx) = setup();
        tap.on_event(InputEvent::ModifierChanged { held: true });
        tap.on_event(tab(false));
        tap.handle().reset();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_reenables_until_stopped() {
        let (tap, fake, _rx) = setup();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fake.enables.load(Ordering::SeqCst), 0);

        fake.enabled.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(fake.is_enabled());
        assert_eq!(fake.enables.load(Ordering::SeqCst), 1);

        tap.stop();
        fake.enabled.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!fake.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_notification_reenables_at_once() {
        let (tap, fake, _rx) = setup();
        fake.enabled.store(false, Ordering::SeqCst);
        assert!(!tap.on_event(InputEvent::TapDisabled));
        tokio::task::yield_now().await;
        assert!(fake.is_enabled());
    }

    #[test]
    fn release_racing_the_grace_timer_never_confirms_before_show() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .unwrap();
        let settings = GestureSettings { grace_delay_ms: 2, ..GestureSettings::default() };
        let fake = Arc::new(FakeTap::default());
        fake.enabled.store(true, Ordering::SeqCst);

        for round in 0..200u64 {
            let (tx, mut rx) = actor::channel();
            let tap = Arc::new(GestureTap::new(&settings, fake.clone(), tx, runtime.handle().clone()));
            let input = tap.clone();
            std::thread::spawn(move || {
                input.on_event(InputEvent::ModifierChanged { held: true });
                input.on_event(tab(false));
                std::thread::sleep(Duration::from_micros(1_500 + (round % 10) * 100));
                input.on_event(InputEvent::ModifierChanged { held: false });
            })
            .join()
            .unwrap();
            std::thread::sleep(Duration::from_millis(10));

            let intents: Vec<Intent> = drain(&mut rx).into_iter().map(|(intent, _)| intent).collect();
            assert!(
                intents == [Intent::QuickSwitch] || intents == [Intent::Show, Intent::Advance, Intent::Confirm],
                "round {round}: {intents:?}"
            );
            assert!(tap.handle().is_idle());
        }
    }
}
