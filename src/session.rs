//! Session lifecycle, the two countdowns and image navigation.
//!
//! [`SessionController`] is a plain synchronous state machine. Every operation
//! returns the [`SessionEvent`]s it produced; the caller forwards them to the
//! UI and to the render task. Time only moves through [`SessionController::tick`].

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::events::{
    Countdown, RenderOutcome, RenderRequest, RenderResult, SessionEvent, Transform, Transforms,
    Viewport,
};
use crate::settings::Preferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

impl SessionStatus {
    fn is_active(self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Paused)
    }
}

/// Snapshot of the running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub session_remaining: u32,
    pub image_remaining: u32,
    pub index: usize,
    pub transforms: Transforms,
    pub halfway_fired: bool,
}

impl SessionState {
    fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            session_remaining: 0,
            image_remaining: 0,
            index: 0,
            transforms: Transforms::default(),
            halfway_fired: false,
        }
    }
}

/// Durations captured at Start. Preferences confirmed mid-session only apply
/// to the next session. Range limits belong to the settings layer; the
/// controller only needs each countdown to be at least one second.
#[derive(Debug, Clone, Copy)]
struct SessionPlan {
    image_duration: u32,
    session_duration: u32,
    halfway_sound: bool,
}

impl SessionPlan {
    fn from_prefs(prefs: &Preferences) -> Self {
        Self {
            image_duration: prefs.image_duration.max(1),
            session_duration: prefs.session_duration.max(1),
            halfway_sound: prefs.halfway_sound,
        }
    }

    fn halfway_threshold(&self) -> f64 {
        f64::from(self.image_duration) / 2.0
    }
}

pub struct SessionController {
    prefs: Preferences,
    plan: SessionPlan,
    catalog: Catalog,
    catalog_stale: bool,
    state: SessionState,
    viewport: Viewport,
    generation: u64,
    consecutive_failures: usize,
    rng: StdRng,
}

impl SessionController {
    pub fn new(prefs: Preferences) -> Self {
        Self::with_rng(prefs, StdRng::from_rng(&mut rand::rng()))
    }

    /// Controller whose shuffles are reproducible.
    pub fn with_seed(prefs: Preferences, seed: u64) -> Self {
        Self::with_rng(prefs, StdRng::seed_from_u64(seed))
    }

    fn with_rng(prefs: Preferences, rng: StdRng) -> Self {
        Self {
            plan: SessionPlan::from_prefs(&prefs),
            prefs,
            catalog: Catalog::default(),
            catalog_stale: true,
            state: SessionState::idle(),
            viewport: Viewport::default(),
            generation: 0,
            consecutive_failures: 0,
            rng,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Generation of the most recent render request. Results carrying any
    /// other generation are stale.
    pub fn render_generation(&self) -> u64 {
        self.generation
    }

    /// Install an explicit playlist. Refused while a session is active.
    pub fn set_catalog(&mut self, catalog: Catalog) -> bool {
        if self.state.status.is_active() {
            debug!("catalog replacement ignored during an active session");
            return false;
        }
        self.catalog = catalog;
        self.catalog_stale = false;
        self.state.index = 0;
        true
    }

    pub fn start(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.state.status.is_active() {
            debug!(status = ?self.state.status, "start ignored");
            return events;
        }
        if self.catalog.is_empty() || self.catalog_stale {
            self.rebuild_catalog();
        }
        if self.catalog.is_empty() {
            info!("start refused: no images available");
            events.push(SessionEvent::NoImagesAvailable);
            return events;
        }

        self.plan = SessionPlan::from_prefs(&self.prefs);
        self.consecutive_failures = 0;
        self.state = SessionState {
            status: SessionStatus::Running,
            session_remaining: self.plan.session_duration,
            image_remaining: self.plan.image_duration,
            index: 0,
            transforms: Transforms::default(),
            halfway_fired: false,
        };
        info!(
            images = self.catalog.len(),
            image_duration = %humantime::format_duration(std::time::Duration::from_secs(
                self.plan.image_duration.into()
            )),
            session_duration = %humantime::format_duration(std::time::Duration::from_secs(
                self.plan.session_duration.into()
            )),
            "session started"
        );

        events.push(SessionEvent::Started {
            images: self.catalog.len(),
        });
        events.push(SessionEvent::SessionTimeUpdated(Countdown::Seconds(
            self.state.session_remaining,
        )));
        events.push(SessionEvent::SessionProgress(0));
        events.push(SessionEvent::ImageTimeUpdated(Countdown::Seconds(
            self.state.image_remaining,
        )));
        events.push(self.request_render());
        events
    }

    pub fn toggle_pause(&mut self) -> Vec<SessionEvent> {
        match self.state.status {
            SessionStatus::Running => {
                self.state.status = SessionStatus::Paused;
                info!("session paused");
                vec![SessionEvent::Paused]
            }
            SessionStatus::Paused => {
                self.state.status = SessionStatus::Running;
                info!("session resumed");
                vec![SessionEvent::Resumed]
            }
            status => {
                debug!(?status, "pause ignored");
                Vec::new()
            }
        }
    }

    pub fn stop(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !self.state.status.is_active() {
            debug!(status = ?self.state.status, "stop ignored");
            return events;
        }
        info!(index = self.state.index, "session stopped");
        self.halt(SessionStatus::Idle, &mut events);
        events
    }

    /// Advance both countdowns by `delta_seconds`, one second at a time.
    pub fn tick(&mut self, delta_seconds: u32) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for _ in 0..delta_seconds {
            if self.state.status != SessionStatus::Running {
                break;
            }
            if self.tick_session(&mut events) {
                break;
            }
            self.tick_image(&mut events);
        }
        events
    }

    /// Returns `true` when the session just completed.
    fn tick_session(&mut self, events: &mut Vec<SessionEvent>) -> bool {
        self.state.session_remaining = self.state.session_remaining.saturating_sub(1);
        let total = self.plan.session_duration;
        let elapsed = total - self.state.session_remaining;
        let progress = (u64::from(elapsed) * 100 / u64::from(total.max(1))).min(100) as u8;
        events.push(SessionEvent::SessionTimeUpdated(Countdown::Seconds(
            self.state.session_remaining,
        )));
        events.push(SessionEvent::SessionProgress(progress));

        if self.state.session_remaining == 0 {
            info!(index = self.state.index, "session complete");
            self.halt(SessionStatus::Completed, events);
            events.push(SessionEvent::SessionCompleted);
            return true;
        }
        false
    }

    fn tick_image(&mut self, events: &mut Vec<SessionEvent>) {
        self.state.image_remaining = self.state.image_remaining.saturating_sub(1);
        events.push(SessionEvent::ImageTimeUpdated(Countdown::Seconds(
            self.state.image_remaining,
        )));

        if self.plan.halfway_sound
            && !self.state.halfway_fired
            && f64::from(self.state.image_remaining) <= self.plan.halfway_threshold()
        {
            self.state.halfway_fired = true;
            debug!(index = self.state.index, "halfway reached");
            events.push(SessionEvent::HalfwayReached);
        }

        if self.state.image_remaining == 0 {
            let next = self.catalog.next_index(self.state.index);
            self.show(next, events);
        }
    }

    pub fn next(&mut self) -> Vec<SessionEvent> {
        self.navigate(|catalog, index| catalog.next_index(index))
    }

    pub fn previous(&mut self) -> Vec<SessionEvent> {
        self.navigate(|catalog, index| catalog.previous_index(index))
    }

    fn navigate(&mut self, step: impl Fn(&Catalog, usize) -> usize) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !self.state.status.is_active() {
            debug!(status = ?self.state.status, "navigation ignored");
            return events;
        }
        self.consecutive_failures = 0;
        let index = step(&self.catalog, self.state.index);
        self.show(index, &mut events);
        events
    }

    pub fn toggle(&mut self, transform: Transform) -> Vec<SessionEvent> {
        if !self.state.status.is_active() {
            debug!(?transform, "transform toggle ignored");
            return Vec::new();
        }
        self.state.transforms.toggle(transform);
        debug!(transforms = ?self.state.transforms, "transform toggled");
        vec![self.request_render()]
    }

    pub fn resize(&mut self, viewport: Viewport) -> Vec<SessionEvent> {
        self.viewport = viewport.clamped();
        if self.state.status != SessionStatus::Running {
            return Vec::new();
        }
        vec![self.request_render()]
    }

    /// Replace the preferences. The catalog is rebuilt right away unless a
    /// session is active, in which case the rebuild waits for the next Start.
    pub fn apply_preferences(&mut self, prefs: Preferences) -> Vec<SessionEvent> {
        self.prefs = prefs;
        self.catalog_stale = true;
        if self.state.status.is_active() {
            info!("preferences stored; applied at next start");
            return Vec::new();
        }

        if self.prefs.enabled_folders().is_empty() {
            self.catalog = Catalog::default();
            self.catalog_stale = false;
            return vec![SessionEvent::NoFoldersEnabled];
        }
        self.rebuild_catalog();
        if self.catalog.is_empty() {
            return vec![SessionEvent::NoImagesAvailable];
        }
        vec![SessionEvent::CatalogLoaded {
            images: self.catalog.len(),
            folders: self.catalog.folder_counts().to_vec(),
        }]
    }

    /// Apply a finished render. Results for superseded requests are dropped.
    pub fn on_render_result(&mut self, result: RenderResult) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if result.generation != self.generation || !self.state.status.is_active() {
            debug!(
                generation = result.generation,
                latest = self.generation,
                "dropping stale render"
            );
            return events;
        }
        let Some(path) = self.catalog.get(self.state.index).map(|p| p.to_path_buf()) else {
            return events;
        };

        match result.outcome {
            RenderOutcome::Rendered(image) => {
                self.consecutive_failures = 0;
                events.push(SessionEvent::ImageChanged {
                    index: self.state.index,
                    path,
                    transforms: self.state.transforms,
                    image,
                });
            }
            RenderOutcome::Invalid(reason) => {
                self.consecutive_failures += 1;
                warn!(path = %path.display(), %reason, "image could not be displayed; skipping");
                if self.consecutive_failures >= self.catalog.len() {
                    warn!(
                        images = self.catalog.len(),
                        "no entry in the catalog could be displayed"
                    );
                    self.halt(SessionStatus::Idle, &mut events);
                    events.push(SessionEvent::NoDisplayableImages);
                } else {
                    let next = self.catalog.next_index(self.state.index);
                    self.show(next, &mut events);
                }
            }
        }
        events
    }

    fn show(&mut self, index: usize, events: &mut Vec<SessionEvent>) {
        self.state.index = index;
        self.state.image_remaining = self.plan.image_duration;
        self.state.halfway_fired = false;
        events.push(SessionEvent::ImageTimeUpdated(Countdown::Seconds(
            self.state.image_remaining,
        )));
        events.push(self.request_render());
    }

    fn request_render(&mut self) -> SessionEvent {
        self.generation += 1;
        let path = self
            .catalog
            .get(self.state.index)
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        SessionEvent::RenderRequested(RenderRequest {
            generation: self.generation,
            index: self.state.index,
            path,
            transforms: self.state.transforms,
            viewport: self.viewport,
        })
    }

    /// Leave the active states. Bumping the generation first means any render
    /// still in flight is discarded when it arrives.
    fn halt(&mut self, status: SessionStatus, events: &mut Vec<SessionEvent>) {
        self.generation += 1;
        if status == SessionStatus::Idle {
            self.state = SessionState::idle();
        } else {
            self.state.status = status;
        }
        events.push(SessionEvent::DisplayCleared);
        events.push(SessionEvent::ImageTimeUpdated(Countdown::Unset));
        events.push(SessionEvent::SessionTimeUpdated(Countdown::Unset));
        events.push(SessionEvent::SessionProgress(0));
    }

    fn rebuild_catalog(&mut self) {
        let folders = self.prefs.enabled_folders();
        self.catalog = if folders.is_empty() {
            Catalog::default()
        } else {
            Catalog::build(&folders, self.prefs.shuffle, &mut self.rng)
        };
        self.catalog_stale = false;
        self.state.index = 0;
    }
}
