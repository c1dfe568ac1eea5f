use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::catalog::FolderCount;
use crate::error::Error;
use crate::settings::Preferences;

/// Display-only alterations applied at render time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Transforms {
    pub flip_h: bool,
    pub flip_v: bool,
    pub greyscale: bool,
}

impl Transforms {
    pub fn toggle(&mut self, transform: Transform) {
        match transform {
            Transform::FlipHorizontal => self.flip_h = !self.flip_h,
            Transform::FlipVertical => self.flip_v = !self.flip_v,
            Transform::Greyscale => self.greyscale = !self.greyscale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    FlipHorizontal,
    FlipVertical,
    Greyscale,
}

/// Target area the current image is scaled to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Largest accepted viewport edge in pixels.
pub const MAX_VIEWPORT_EDGE: u32 = 8192;

impl Viewport {
    /// Validated viewport; both edges must lie in `1..=MAX_VIEWPORT_EDGE`.
    ///
    /// # Errors
    /// Returns [`Error::BadViewport`] for a zero or oversized edge.
    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        let edge = 1..=MAX_VIEWPORT_EDGE;
        if !edge.contains(&width) || !edge.contains(&height) {
            return Err(Error::BadViewport(format!(
                "{width}x{height} is outside 1..={MAX_VIEWPORT_EDGE} pixels per edge"
            )));
        }
        Ok(Self { width, height })
    }

    /// Parse separate width and height words, as typed at the console.
    ///
    /// # Errors
    /// Returns [`Error::BadViewport`] if either word is not a number or the
    /// size is out of range.
    pub fn from_parts(width: &str, height: &str) -> Result<Self, Error> {
        let number = |raw: &str, what: &str| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| Error::BadViewport(format!("{what} must be a number, got {raw:?}")))
        };
        Self::new(number(width, "width")?, number(height, "height")?)
    }

    /// Same viewport with each edge forced into `1..=MAX_VIEWPORT_EDGE`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            width: self.width.clamp(1, MAX_VIEWPORT_EDGE),
            height: self.height.clamp(1, MAX_VIEWPORT_EDGE),
        }
    }
}

impl FromStr for Viewport {
    type Err = Error;

    /// Parses `WIDTHxHEIGHT`.
    fn from_str(raw: &str) -> Result<Self, Error> {
        let (w, h) = raw
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::BadViewport(format!("expected WIDTHxHEIGHT, got {raw:?}")))?;
        Self::from_parts(w, h)
    }
}

/// Remaining time as shown on a timer label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// No session is running; rendered as `--:--`.
    Unset,
    Seconds(u32),
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Countdown::Unset => f.write_str("--:--"),
            Countdown::Seconds(secs) => write!(f, "{:02}:{:02}", secs / 60, secs % 60),
        }
    }
}

/// Request for the presenter to produce a bitmap of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub generation: u64,
    pub index: usize,
    pub path: PathBuf,
    pub transforms: Transforms,
    pub viewport: Viewport,
}

/// Scaled, transformed RGBA8 pixels ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Rendered(Arc<RenderedImage>),
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct RenderResult {
    pub generation: u64,
    pub outcome: RenderOutcome,
}

/// What the UI layer asks the session to do.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Start,
    PauseResume,
    Stop,
    Next,
    Previous,
    Toggle(Transform),
    Resize(Viewport),
    SettingsConfirmed(Preferences),
}

/// What the session tells the UI layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started { images: usize },
    Paused,
    Resumed,
    ImageTimeUpdated(Countdown),
    SessionTimeUpdated(Countdown),
    SessionProgress(u8),
    /// Consumed by the render task; the UI never sees a bitmap until
    /// [`SessionEvent::ImageChanged`].
    RenderRequested(RenderRequest),
    ImageChanged {
        index: usize,
        path: PathBuf,
        transforms: Transforms,
        image: Arc<RenderedImage>,
    },
    HalfwayReached,
    DisplayCleared,
    SessionCompleted,
    CatalogLoaded {
        images: usize,
        folders: Vec<FolderCount>,
    },
    NoFoldersEnabled,
    NoImagesAvailable,
    NoDisplayableImages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_formats_minutes_and_seconds() {
        assert_eq!(Countdown::Seconds(0).to_string(), "00:00");
        assert_eq!(Countdown::Seconds(65).to_string(), "01:05");
        assert_eq!(Countdown::Seconds(3600).to_string(), "60:00");
        assert_eq!(Countdown::Unset.to_string(), "--:--");
    }

    #[test]
    fn viewport_parsing_checks_bounds() {
        assert_eq!(
            "1024x768".parse::<Viewport>().unwrap(),
            Viewport {
                width: 1024,
                height: 768
            }
        );
        assert_eq!(
            Viewport::from_parts(" 640", "480 ").unwrap(),
            Viewport {
                width: 640,
                height: 480
            }
        );
        assert!("0x600".parse::<Viewport>().is_err());
        assert!("100000x100000".parse::<Viewport>().is_err());
        assert!("wide".parse::<Viewport>().is_err());
        assert!(Viewport::from_parts("tall", "10").is_err());
        assert!(Viewport::new(MAX_VIEWPORT_EDGE, 1).is_ok());
        assert!(Viewport::new(MAX_VIEWPORT_EDGE + 1, 1).is_err());
    }

    #[test]
    fn toggling_twice_restores_flags() {
        let mut t = Transforms::default();
        t.toggle(Transform::FlipHorizontal);
        assert!(t.flip_h);
        t.toggle(Transform::FlipHorizontal);
        assert_eq!(t, Transforms::default());
    }
}
