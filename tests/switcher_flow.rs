use pretty_assertions::assert_eq;
use section::actor::presentation::PresentationEvent;
use section::capture::UpdateSource;
use section::common::config::{Config, PreviewMode};
use section::input::{InputEvent, KeyCode};
use section::model::{Display, WindowId};
use section::replay::{ReplayReport, Step, Transcript, replay};
use section::sys::geometry::Rect;
use section::sys::synthetic::SyntheticWindow;

fn window(id: u32, bounds: Rect) -> SyntheticWindow {
    SyntheticWindow {
        id: WindowId::new(id),
        title: Some(format!("window {id}")),
        owner: format!("App{id}"),
        pid: 100 + id as i32,
        bounds,
        declined: false,
    }
}

fn windows(n: u32) -> Vec<SyntheticWindow> {
    (1..=n).map(|id| window(id, Rect::new(0.0, 0.0, 1200.0, 800.0))).collect()
}

fn press(held: bool) -> Step { Step::Input(InputEvent::ModifierChanged { held }) }

fn key(code: KeyCode) -> Step {
    Step::Input(InputEvent::Key {
        code,
        modifier_held: true,
        shift_held: false,
        repeat: false,
    })
}

fn config() -> Config {
    let mut config = Config::default();
    config.settings.capture.workers = 1;
    config
}

async fn run(config: Config, windows: Vec<SyntheticWindow>, steps: Vec<Step>) -> ReplayReport {
    replay(
        config,
        Transcript {
            windows,
            active_display: None,
            steps,
        },
    )
    .await
}

#[test_log::test(tokio::test)]
async fn hold_and_cycle_then_release_raises_the_focus() {
    let report = run(
        config(),
        windows(4),
        vec![press(true), key(KeyCode::Tab), Step::Wait(200), key(KeyCode::Tab), Step::Wait(50), press(false)],
    )
    .await;

    let transitions = report.transitions();
    assert_eq!(transitions.len(), 4, "{transitions:?}");
    assert!(transitions[0].starts_with("open index=1"), "{}", transitions[0]);
    assert_eq!(
        transitions[1..],
        ["selected index=2 window=3", "selected index=3 window=4", "close"]
    );
    assert_eq!(report.activations, vec![WindowId::new(4)]);
}

#[test_log::test(tokio::test)]
async fn rapid_presses_skip_the_grace_window() {
    let report = run(
        config(),
        windows(5),
        vec![press(true), key(KeyCode::Tab), key(KeyCode::Tab), key(KeyCode::Tab), press(false)],
    )
    .await;

    // Open at 1, then one step per press.
    assert_eq!(report.activations, vec![WindowId::new(5)]);
    assert_eq!(report.transitions().last().map(String::as_str), Some("close"));
}

#[test_log::test(tokio::test)]
async fn tap_and_release_is_a_quick_switch() {
    let report = run(config(), windows(3), vec![press(true), key(KeyCode::Tab), press(false), Step::Wait(200)]).await;
    assert!(report.events.is_empty(), "{report}");
    assert_eq!(report.activations, vec![WindowId::new(2)]);
}

#[test_log::test(tokio::test)]
async fn escape_cancels_without_raising_anything() {
    let report = run(
        config(),
        windows(3),
        vec![press(true), key(KeyCode::Tab), Step::Wait(200), key(KeyCode::Escape), press(false)],
    )
    .await;
    let transitions = report.transitions();
    assert_eq!(transitions.len(), 3, "{transitions:?}");
    assert_eq!(transitions[2], "close");
    assert!(report.activations.is_empty());
}

#[test_log::test(tokio::test)]
async fn external_dismiss_resets_the_gesture() {
    let report = run(
        config(),
        windows(3),
        vec![press(true), key(KeyCode::Tab), Step::Wait(200), Step::Dismiss, Step::Wait(20), press(false)],
    )
    .await;
    assert_eq!(report.transitions().last().map(String::as_str), Some("close"));
    // The release after the dismissal is not a confirm.
    assert!(report.activations.is_empty());
}

#[test_log::test(tokio::test)]
async fn every_window_gets_a_thumbnail() {
    let report = run(config(), windows(3), vec![press(true), key(KeyCode::Tab), Step::Wait(300), press(false)]).await;
    let mut painted: Vec<u32> = report
        .events
        .iter()
        .filter_map(|e| match e {
            PresentationEvent::Thumbnail { window_id, source: UpdateSource::Snapshot, .. } => {
                Some(window_id.as_u32())
            }
            _ => None,
        })
        .collect();
    painted.sort_unstable();
    assert_eq!(painted, vec![1, 2, 3]);
}

#[test_log::test(tokio::test)]
async fn video_mode_streams_the_focused_window() {
    let mut config = config();
    config.settings.switcher.preview = PreviewMode::Video;
    let report = run(
        config,
        windows(3),
        vec![press(true), key(KeyCode::Tab), Step::Wait(300), Step::Frames(5), Step::Wait(50), press(false)],
    )
    .await;

    // Frames come from the first focus or from the window stepped to.
    let live: Vec<WindowId> = report
        .events
        .iter()
        .filter_map(|e| match e {
            PresentationEvent::Thumbnail { window_id, source: UpdateSource::Live, .. } => Some(*window_id),
            _ => None,
        })
        .collect();
    assert!(!live.is_empty(), "{report}");
    assert!(live.iter().all(|&id| id == WindowId::new(2) || id == WindowId::new(3)));
    assert_eq!(report.activations, vec![WindowId::new(3)]);
}

#[test_log::test(tokio::test)]
async fn per_monitor_scope_limits_candidates() {
    let screen = Rect::new(1440.0, 0.0, 1920.0, 1080.0);
    let report = replay(
        config(),
        Transcript {
            windows: vec![
                window(1, Rect::new(0.0, 0.0, 1000.0, 700.0)),
                window(2, Rect::new(1500.0, 100.0, 1000.0, 700.0)),
                window(3, Rect::new(100.0, 100.0, 1000.0, 700.0)),
                window(4, Rect::new(1600.0, 200.0, 1000.0, 700.0)),
            ],
            active_display: Some(Display { id: 2, frame: screen }),
            steps: vec![press(true), key(KeyCode::Tab), Step::Wait(200), press(false)],
        },
    )
    .await;
    let open = report.transitions().into_iter().next().unwrap_or_default();
    assert!(open.starts_with("open display=2 index=1"), "{open}");
    assert!(open.contains("window 2") && open.contains("window 4") && !open.contains("window 1"), "{open}");
    // Two candidates: open at 1, advance wraps to 0.
    assert_eq!(report.activations, vec![WindowId::new(2)]);
}

#[test_log::test(tokio::test)]
async fn disabled_tap_is_reenabled() {
    let report = run(config(), windows(2), vec![Step::DisableTap, Step::Wait(20)]).await;
    assert!(report.tap_enables >= 1);
    assert!(report.events.is_empty());
}
