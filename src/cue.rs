//! Halfway notification cue.

use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

/// A fire-and-forget signal played once per image at its midpoint.
pub trait HalfwayCue: Send + Sync {
    fn play(&self) -> Result<()>;
}

/// Play `cue`, logging instead of propagating any failure.
pub fn play_logged(cue: &dyn HalfwayCue) {
    if let Err(err) = cue.play() {
        warn!("halfway cue failed: {err:#}");
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct BellCue;

impl HalfwayCue for BellCue {
    fn play(&self) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07").context("failed to ring terminal bell")?;
        stderr.flush().context("failed to flush terminal bell")?;
        Ok(())
    }
}

/// Does nothing; used when the cue is disabled on the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCue;

impl HalfwayCue for SilentCue {
    fn play(&self) -> Result<()> {
        Ok(())
    }
}

/// Spawns an external player (e.g. `paplay chime.oga`) without waiting for it.
#[derive(Debug, Clone)]
pub struct CommandCue {
    program: String,
    args: Vec<String>,
}

impl CommandCue {
    /// Build from a command line whose first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("cue command must name a program");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl CommandCue {
    /// Spawn the player and hand it to a detached thread that waits on it,
    /// so a finished player never lingers as a zombie.
    fn launch(&self) -> Result<thread::JoinHandle<io::Result<ExitStatus>>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn cue command {}", self.program))?;
        let pid = child.id();
        debug!(pid, program = %self.program, "cue command spawned");

        let program = self.program.clone();
        thread::Builder::new()
            .name("cue-reaper".into())
            .spawn(move || {
                let status = child.wait();
                match &status {
                    Ok(status) if status.success() => debug!(pid, "cue command finished"),
                    Ok(status) => warn!(pid, %program, "cue command exited with {status}"),
                    Err(err) => warn!(pid, %program, "failed to wait for cue command: {err}"),
                }
                status
            })
            .context("failed to start cue reaper thread")
    }
}

impl HalfwayCue for CommandCue {
    fn play(&self) -> Result<()> {
        // Detached; the reaper thread outlives this call.
        self.launch().map(drop)
    }
}
