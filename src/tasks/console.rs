//! Line-oriented stand-in for the GUI: commands on stdin, events on stdout.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::events::{Countdown, RenderedImage, SessionEvent, Transform, UiCommand, Viewport};
use crate::settings::Preferences;

pub const HELP: &str = "\
commands:
  start | pause | stop | next | prev
  flip-h | flip-v | grey
  resize W H | resize WxH
  image-duration SECS | session-minutes MIN
  shuffle on|off | halfway on|off
  folder add|remove|enable|disable PATH
  settings | help | quit";

#[derive(Debug, Clone)]
pub enum ConsoleAction {
    Send(UiCommand),
    ShowSettings,
    Help,
    Quit,
}

/// Parse one console line. Settings edits are applied to `draft` and
/// confirmed at once.
pub fn parse_line(line: &str, draft: &mut Preferences) -> Result<Option<ConsoleAction>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let action = match (verb, rest.as_slice()) {
        ("start", []) => ConsoleAction::Send(UiCommand::Start),
        ("pause" | "resume", []) => ConsoleAction::Send(UiCommand::PauseResume),
        ("stop", []) => ConsoleAction::Send(UiCommand::Stop),
        ("next", []) => ConsoleAction::Send(UiCommand::Next),
        ("prev" | "previous", []) => ConsoleAction::Send(UiCommand::Previous),
        ("flip-h", []) => ConsoleAction::Send(UiCommand::Toggle(Transform::FlipHorizontal)),
        ("flip-v", []) => ConsoleAction::Send(UiCommand::Toggle(Transform::FlipVertical)),
        ("grey" | "gray", []) => ConsoleAction::Send(UiCommand::Toggle(Transform::Greyscale)),
        ("resize", [w, h]) => ConsoleAction::Send(UiCommand::Resize(Viewport::from_parts(w, h)?)),
        ("resize", [size]) => ConsoleAction::Send(UiCommand::Resize(size.parse()?)),
        ("image-duration", [secs]) => {
            draft.image_duration = secs.parse().context("seconds must be a number")?;
            confirm(draft)
        }
        ("session-minutes", [mins]) => {
            draft.set_session_minutes(mins.parse().context("minutes must be a number")?);
            confirm(draft)
        }
        ("shuffle", [flag]) => {
            draft.shuffle = parse_switch(flag)?;
            confirm(draft)
        }
        ("halfway", [flag]) => {
            draft.halfway_sound = parse_switch(flag)?;
            confirm(draft)
        }
        ("folder", [op, path @ ..]) if !path.is_empty() => {
            let path = PathBuf::from(path.join(" "));
            match *op {
                "add" | "enable" => {
                    draft.folders.insert(path, true);
                }
                "disable" => {
                    let Some(enabled) = draft.folders.get_mut(&path) else {
                        bail!("unknown folder {}", path.display());
                    };
                    *enabled = false;
                }
                "remove" => {
                    if draft.folders.remove(&path).is_none() {
                        bail!("unknown folder {}", path.display());
                    }
                }
                other => bail!("unknown folder operation {other:?}"),
            }
            confirm(draft)
        }
        ("settings", []) => ConsoleAction::ShowSettings,
        ("help" | "?", []) => ConsoleAction::Help,
        ("quit" | "exit", []) => ConsoleAction::Quit,
        _ => return Err(anyhow!("unrecognized command {line:?}; try `help`")),
    };
    Ok(Some(action))
}

fn confirm(draft: &mut Preferences) -> ConsoleAction {
    *draft = draft.clone().clamped();
    ConsoleAction::Send(UiCommand::SettingsConfirmed(draft.clone()))
}

fn parse_switch(flag: &str) -> Result<bool> {
    match flag {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => bail!("expected on/off, got {other:?}"),
    }
}

pub fn describe_settings(prefs: &Preferences) -> String {
    let mut out = format!(
        "image duration: {}s\nsession duration: {}m\nshuffle: {}\nhalfway sound: {}\nfolders:",
        prefs.image_duration,
        prefs.session_minutes(),
        prefs.shuffle,
        prefs.halfway_sound
    );
    if prefs.folders.is_empty() {
        out.push_str(" (none)");
    }
    for (path, enabled) in &prefs.folders {
        let mark = if *enabled { "x" } else { " " };
        out.push_str(&format!("\n  [{mark}] {}", path.display()));
    }
    out
}

/// Read stdin on a dedicated thread so shutdown never waits on a pending read.
/// EOF or `quit` cancels the whole pipeline.
pub fn spawn_input(
    commands: Sender<UiCommand>,
    mut draft: Preferences,
    cancel: CancellationToken,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if cancel.is_cancelled() {
                return;
            }
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("stdin read failed: {err}");
                    break;
                }
            };
            match parse_line(&line, &mut draft) {
                Ok(None) => {}
                Ok(Some(ConsoleAction::Send(cmd))) => {
                    if commands.blocking_send(cmd).is_err() {
                        debug!("session closed; stopping console input");
                        return;
                    }
                }
                Ok(Some(ConsoleAction::ShowSettings)) => println!("{}", describe_settings(&draft)),
                Ok(Some(ConsoleAction::Help)) => println!("{HELP}"),
                Ok(Some(ConsoleAction::Quit)) => break,
                Err(err) => println!("{err:#}"),
            }
        }
        info!("console input closed; initiating shutdown");
        cancel.cancel();
    })
}

/// Tracks the labels a window would show and prints them.
#[derive(Debug)]
struct ConsoleView {
    image_time: Countdown,
    session_time: Countdown,
    progress: u8,
    frame_out: Option<PathBuf>,
}

impl ConsoleView {
    fn status_line(&self) -> String {
        format!(
            "Image: {}  Session: {}  [{:>3}%]",
            self.image_time, self.session_time, self.progress
        )
    }

    async fn apply(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Started { images } => println!("session started with {images} images"),
            SessionEvent::Paused => println!("paused"),
            SessionEvent::Resumed => println!("resumed"),
            SessionEvent::ImageTimeUpdated(t) => self.image_time = t,
            SessionEvent::SessionTimeUpdated(t) => self.session_time = t,
            SessionEvent::SessionProgress(p) => {
                self.progress = p;
                if self.session_time != Countdown::Unset {
                    println!("{}", self.status_line());
                }
            }
            SessionEvent::ImageChanged {
                index,
                path,
                transforms,
                image,
            } => {
                println!(
                    "#{} {} ({}x{}){}{}{}",
                    index + 1,
                    path.display(),
                    image.width,
                    image.height,
                    if transforms.greyscale { " grey" } else { "" },
                    if transforms.flip_h { " flip-h" } else { "" },
                    if transforms.flip_v { " flip-v" } else { "" },
                );
                if let Some(out) = self.frame_out.clone() {
                    tokio::task::spawn_blocking(move || write_frame(&out, &image))
                        .await
                        .context("frame writer failed")??;
                }
            }
            SessionEvent::HalfwayReached => println!("halfway"),
            SessionEvent::DisplayCleared => {
                println!("Session ended. Type `start` to begin.");
                if let Some(out) = &self.frame_out {
                    match std::fs::remove_file(out) {
                        Ok(()) => {}
                        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                        Err(err) => warn!(path = %out.display(), "failed to clear frame: {err}"),
                    }
                }
            }
            SessionEvent::SessionCompleted => println!("Your drawing session has ended!"),
            SessionEvent::CatalogLoaded { images, folders } => {
                println!("loaded {images} images");
                for count in folders {
                    println!("  {:>5}  {}", count.images, count.folder.display());
                }
            }
            SessionEvent::NoFoldersEnabled => {
                println!("Please select at least one folder containing images.")
            }
            SessionEvent::NoImagesAvailable => println!(
                "No supported images found in the enabled folders.\nSupported formats: JPG, PNG, BMP, GIF, WEBP"
            ),
            SessionEvent::NoDisplayableImages => {
                println!("None of the images could be displayed; session stopped.")
            }
            SessionEvent::RenderRequested(_) => {}
        }
        Ok(())
    }
}

fn write_frame(path: &Path, image: &RenderedImage) -> Result<()> {
    let buffer = RgbaImage::from_raw(image.width, image.height, image.pixels.clone())
        .context("rendered frame has inconsistent dimensions")?;
    let tmp = path.with_extension("tmp.png");
    buffer
        .save(&tmp)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Print session events and keep `frame_out` holding the current image.
#[instrument(skip_all)]
pub async fn run_output(
    mut events: Receiver<SessionEvent>,
    frame_out: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut view = ConsoleView {
        image_time: Countdown::Unset,
        session_time: Countdown::Unset,
        progress: 0,
        frame_out,
    };
    loop {
        select! {
            _ = cancel.cancelled() => break,
            maybe = events.recv() => match maybe {
                Some(event) => {
                    if let Err(err) = view.apply(event).await {
                        warn!("{err:#}");
                    }
                }
                None => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(action: Option<ConsoleAction>) -> UiCommand {
        match action {
            Some(ConsoleAction::Send(cmd)) => cmd,
            other => panic!("expected a command, got {other:?}"),
        }
    }

    #[test]
    fn parses_playback_commands() {
        let mut draft = Preferences::default();
        assert!(matches!(
            send(parse_line("start", &mut draft).unwrap()),
            UiCommand::Start
        ));
        assert!(matches!(
            send(parse_line("  prev ", &mut draft).unwrap()),
            UiCommand::Previous
        ));
        assert!(matches!(
            send(parse_line("grey", &mut draft).unwrap()),
            UiCommand::Toggle(Transform::Greyscale)
        ));
        assert!(matches!(
            send(parse_line("resize 1024 768", &mut draft).unwrap()),
            UiCommand::Resize(Viewport {
                width: 1024,
                height: 768
            })
        ));
        assert!(parse_line("", &mut draft).unwrap().is_none());
        assert!(matches!(
            send(parse_line("resize 640x480", &mut draft).unwrap()),
            UiCommand::Resize(Viewport {
                width: 640,
                height: 480
            })
        ));
        assert!(parse_line("resize wide tall", &mut draft).is_err());
        assert!(parse_line("resize 100000 100000", &mut draft).is_err());
        assert!(parse_line("resize 0 480", &mut draft).is_err());
        assert!(parse_line("dance", &mut draft).is_err());
    }

    #[test]
    fn settings_edits_confirm_clamped_draft() {
        let mut draft = Preferences::default();
        match send(parse_line("image-duration 2", &mut draft).unwrap()) {
            UiCommand::SettingsConfirmed(prefs) => assert_eq!(prefs.image_duration, 10),
            other => panic!("unexpected {other:?}"),
        }
        match send(parse_line("session-minutes 45", &mut draft).unwrap()) {
            UiCommand::SettingsConfirmed(prefs) => {
                assert_eq!(prefs.session_duration, 2700);
                assert_eq!(prefs.image_duration, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn folder_commands_edit_the_map() {
        let mut draft = Preferences::default();
        send(parse_line("folder add /refs/poses", &mut draft).unwrap());
        send(parse_line("folder add /refs/hands and feet", &mut draft).unwrap());
        send(parse_line("folder disable /refs/poses", &mut draft).unwrap());
        assert_eq!(
            draft.enabled_folders(),
            vec![PathBuf::from("/refs/hands and feet")]
        );
        assert!(parse_line("folder disable /nowhere", &mut draft).is_err());
        send(parse_line("folder remove /refs/poses", &mut draft).unwrap());
        assert_eq!(draft.folders.len(), 1);
    }

    #[test]
    fn describes_settings() {
        let mut prefs = Preferences::default();
        prefs.folders.insert(PathBuf::from("/a"), true);
        prefs.folders.insert(PathBuf::from("/b"), false);
        let text = describe_settings(&prefs);
        assert!(text.contains("image duration: 60s"));
        assert!(text.contains("session duration: 30m"));
        assert!(text.contains("[x] /a"));
        assert!(text.contains("[ ] /b"));
    }
}
