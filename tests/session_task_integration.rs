use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use figure_timer::cue::SilentCue;
use figure_timer::events::{SessionEvent, UiCommand, Viewport};
use figure_timer::presenter::ImagePresenter;
use figure_timer::tasks::render;
use figure_timer::tasks::session::{SessionLinks, SessionTask};
use figure_timer::{Preferences, SessionController, SettingsStore};
use image::{Rgba, RgbaImage};
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct Harness {
    commands: mpsc::Sender<UiCommand>,
    events: mpsc::Receiver<SessionEvent>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl Harness {
    fn spawn(prefs: Preferences, settings: &Path) -> Self {
        let mut controller = SessionController::with_seed(prefs, 11);
        controller.resize(Viewport {
            width: 32,
            height: 32,
        });

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (ui_tx, ui_rx) = mpsc::channel(256);
        let (render_tx, render_rx) = mpsc::channel(16);
        let (result_tx, result_rx) = mpsc::channel(4);
        let latest = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let render_handle = tokio::spawn(render::run(
            render_rx,
            result_tx,
            Arc::new(ImagePresenter),
            Arc::clone(&latest),
            cancel.clone(),
        ));
        let task = SessionTask {
            controller,
            store: SettingsStore::new(settings),
            cue: Box::new(SilentCue),
            latest,
        };
        let links = SessionLinks {
            commands: cmd_rx,
            to_ui: ui_tx,
            to_render: render_tx,
            render_results: result_rx,
        };
        let session_handle = tokio::spawn(task.run(links, cancel.clone()));

        Self {
            commands: cmd_tx,
            events: ui_rx,
            cancel,
            handles: vec![render_handle, session_handle],
        }
    }

    async fn send(&self, cmd: UiCommand) {
        self.commands.send(cmd).await.expect("session task alive");
    }

    /// Collect events until `stop` matches one, failing after two seconds.
    async fn until(&mut self, stop: impl Fn(&SessionEvent) -> bool) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        loop {
            let event = timeout(Duration::from_secs(2), self.events.recv())
                .await
                .expect("timed out waiting for session event")
                .expect("event channel closed");
            let done = stop(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            handle.await.expect("task panicked").expect("task failed");
        }
    }
}

fn write_png(path: &Path, w: u32, h: u32) {
    RgbaImage::from_pixel(w, h, Rgba([90, 120, 150, 255]))
        .save(path)
        .unwrap();
}

fn library(root: &Path) -> Preferences {
    let refs = root.join("refs");
    std::fs::create_dir_all(&refs).unwrap();
    write_png(&refs.join("a.png"), 64, 32);
    write_png(&refs.join("b.png"), 16, 48);
    let mut prefs = Preferences {
        shuffle: false,
        ..Preferences::default()
    };
    prefs.folders.insert(refs, true);
    prefs
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_displays_first_image_scaled_to_viewport() {
    let tmp = tempdir().unwrap();
    let prefs = library(tmp.path());
    let mut harness = Harness::spawn(prefs, &tmp.path().join("settings.json"));

    harness.send(UiCommand::Start).await;
    let events = harness
        .until(|e| matches!(e, SessionEvent::ImageChanged { .. }))
        .await;
    assert!(matches!(events.first(), Some(SessionEvent::Started { images: 2 })));
    match events.last() {
        Some(SessionEvent::ImageChanged {
            index, path, image, ..
        }) => {
            assert_eq!(*index, 0);
            assert!(path.ends_with("a.png"));
            assert_eq!((image.width, image.height), (32, 16));
            assert_eq!(image.pixels.len(), 32 * 16 * 4);
        }
        other => panic!("unexpected final event: {other:?}"),
    }

    harness.send(UiCommand::Next).await;
    let events = harness
        .until(|e| matches!(e, SessionEvent::ImageChanged { .. }))
        .await;
    match events.last() {
        Some(SessionEvent::ImageChanged { index, image, .. }) => {
            assert_eq!(*index, 1);
            assert!(image.height <= 32 && image.width <= 32);
        }
        other => panic!("unexpected final event: {other:?}"),
    }

    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_clears_display_and_nothing_renders_afterwards() {
    let tmp = tempdir().unwrap();
    let prefs = library(tmp.path());
    let mut harness = Harness::spawn(prefs, &tmp.path().join("settings.json"));

    harness.send(UiCommand::Start).await;
    harness.send(UiCommand::Next).await;
    harness.send(UiCommand::Stop).await;
    harness
        .until(|e| matches!(e, SessionEvent::DisplayCleared))
        .await;

    // Any decode that was in flight must not surface after the clear.
    let late = timeout(Duration::from_millis(300), async {
        while let Some(event) = harness.events.recv().await {
            if matches!(event, SessionEvent::ImageChanged { .. }) {
                return true;
            }
        }
        false
    })
    .await;
    assert!(!matches!(late, Ok(true)), "image shown after stop");

    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn confirmed_settings_are_saved_and_reload_the_catalog() {
    let tmp = tempdir().unwrap();
    let settings = tmp.path().join("config").join("settings.json");
    let mut harness = Harness::spawn(Preferences::default(), &settings);

    let mut prefs = library(tmp.path());
    prefs.image_duration = 5; // clamped up to the minimum
    prefs.halfway_sound = false;
    harness.send(UiCommand::SettingsConfirmed(prefs.clone())).await;

    let events = harness
        .until(|e| matches!(e, SessionEvent::CatalogLoaded { .. }))
        .await;
    assert!(matches!(
        events.last(),
        Some(SessionEvent::CatalogLoaded { images: 2, .. })
    ));

    let saved = SettingsStore::new(&settings).load();
    assert_eq!(saved.image_duration, 10);
    assert!(!saved.halfway_sound);
    assert_eq!(saved.folders, prefs.folders);

    harness.shutdown().await;
}
