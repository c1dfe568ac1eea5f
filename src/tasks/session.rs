use std::sync::atomic::Ordering;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cue::{self, HalfwayCue};
use crate::events::{RenderRequest, RenderResult, SessionEvent, UiCommand};
use crate::session::{SessionController, SessionStatus};
use crate::settings::SettingsStore;
use crate::tasks::render::LatestGeneration;

const TICK: Duration = Duration::from_secs(1);

/// Channels the session task talks through.
pub struct SessionLinks {
    pub commands: Receiver<UiCommand>,
    pub to_ui: Sender<SessionEvent>,
    pub to_render: Sender<RenderRequest>,
    pub render_results: Receiver<RenderResult>,
}

/// Owns the controller and serializes ticks, UI commands and render results
/// onto it.
pub struct SessionTask {
    pub controller: SessionController,
    pub store: SettingsStore,
    pub cue: Box<dyn HalfwayCue>,
    pub latest: LatestGeneration,
}

impl SessionTask {
    #[instrument(skip_all)]
    pub async fn run(mut self, links: SessionLinks, cancel: CancellationToken) -> Result<()> {
        let SessionLinks {
            mut commands,
            to_ui,
            to_render,
            mut render_results,
        } = links;

        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            let running = self.controller.status() == SessionStatus::Running;
            let events = select! {
                _ = cancel.cancelled() => {
                    info!("cancel received; exiting session task");
                    break;
                }

                _ = ticker.tick(), if running => self.controller.tick(1),

                maybe_cmd = commands.recv() => match maybe_cmd {
                    Some(cmd) => {
                        let events = self.handle(cmd);
                        // A fresh Running phase gets a full second before its first tick.
                        if !running && self.controller.status() == SessionStatus::Running {
                            ticker.reset();
                        }
                        events
                    }
                    None => {
                        info!("command channel closed; exiting session task");
                        break;
                    }
                },

                Some(result) = render_results.recv() => self.controller.on_render_result(result),
            };

            self.latest
                .store(self.controller.render_generation(), Ordering::Release);
            if !self.dispatch(events, &to_ui, &to_render).await {
                debug!("ui closed; exiting session task");
                break;
            }
        }

        // Anything still decoding is now stale.
        self.latest.store(u64::MAX, Ordering::Release);
        Ok(())
    }

    fn handle(&mut self, cmd: UiCommand) -> Vec<SessionEvent> {
        debug!(?cmd, "command");
        match cmd {
            UiCommand::Start => self.controller.start(),
            UiCommand::PauseResume => self.controller.toggle_pause(),
            UiCommand::Stop => self.controller.stop(),
            UiCommand::Next => self.controller.next(),
            UiCommand::Previous => self.controller.previous(),
            UiCommand::Toggle(transform) => self.controller.toggle(transform),
            UiCommand::Resize(viewport) => self.controller.resize(viewport),
            UiCommand::SettingsConfirmed(prefs) => {
                let prefs = prefs.clamped();
                if let Err(err) = self.store.save(&prefs) {
                    warn!(path = %self.store.path().display(), "failed to save settings: {err}");
                }
                self.controller.apply_preferences(prefs)
            }
        }
    }

    /// Route events to their consumers. Returns `false` once the UI is gone.
    async fn dispatch(
        &self,
        events: Vec<SessionEvent>,
        to_ui: &Sender<SessionEvent>,
        to_render: &Sender<RenderRequest>,
    ) -> bool {
        for event in events {
            match event {
                SessionEvent::RenderRequested(request) => {
                    if to_render.send(request).await.is_err() {
                        warn!("render task closed; request dropped");
                    }
                }
                SessionEvent::HalfwayReached => {
                    cue::play_logged(self.cue.as_ref());
                    if to_ui.send(SessionEvent::HalfwayReached).await.is_err() {
                        return false;
                    }
                }
                other => {
                    if to_ui.send(other).await.is_err() {
                        return false;
                    }
                }
            }
        }
        true
    }
}
