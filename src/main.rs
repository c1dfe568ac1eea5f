//! Headless figure-drawing timer driven from the terminal.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use figure_timer::catalog::Catalog;
use figure_timer::cue::{BellCue, CommandCue, HalfwayCue, SilentCue};
use figure_timer::events::{RenderRequest, RenderResult, SessionEvent, UiCommand, Viewport};
use figure_timer::presenter::ImagePresenter;
use figure_timer::tasks::console;
use figure_timer::tasks::render;
use figure_timer::tasks::session::{SessionLinks, SessionTask};
use figure_timer::{Preferences, SessionController, SettingsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CueKind {
    Bell,
    None,
    Command,
}

#[derive(Debug, Parser)]
#[command(
    name = "figure-timer",
    version,
    about = "Timed image slideshow for figure-drawing practice"
)]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,
    /// Keep the currently displayed frame in this PNG file
    #[arg(long = "frame-out", value_name = "FILE")]
    frame_out: Option<PathBuf>,
    /// Size the image is scaled to fit, as WIDTHxHEIGHT
    #[arg(long, value_name = "WxH", value_parser = parse_viewport, default_value = "800x600")]
    viewport: Viewport,
    /// Deterministic RNG seed for catalog shuffling
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// How the halfway point is signalled
    #[arg(long, value_enum, default_value_t = CueKind::Bell)]
    cue: CueKind,
    /// Program and arguments run for `--cue command`
    #[arg(long = "cue-command", value_name = "ARGV", num_args = 1.., allow_hyphen_values = true)]
    cue_command: Vec<String>,
    /// Print the catalog built from the enabled folders and exit
    #[arg(long = "list")]
    list: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn parse_viewport(raw: &str) -> Result<Viewport> {
    raw.parse().context("invalid --viewport")
}

fn init_tracing(verbosity: u8) {
    // RUST_LOG wins; otherwise map -v to a level
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("figure_timer={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn build_cue(kind: CueKind, argv: &[String]) -> Result<Box<dyn HalfwayCue>> {
    Ok(match kind {
        CueKind::Bell => Box::new(BellCue),
        CueKind::None => Box::new(SilentCue),
        CueKind::Command => Box::new(
            CommandCue::from_argv(argv).context("--cue command requires --cue-command")?,
        ),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let settings_path = args
        .settings
        .clone()
        .or_else(SettingsStore::default_path)
        .context("no settings path given and no platform config directory found")?;
    let store = SettingsStore::new(settings_path);
    let prefs = store.load();
    tracing::info!(path = %store.path().display(), ?prefs, "settings loaded");

    if args.list {
        print_catalog(&prefs, args.seed);
        return Ok(());
    }

    let cue = build_cue(args.cue, &args.cue_command)?;
    let mut controller = match args.seed {
        Some(seed) => SessionController::with_seed(prefs.clone(), seed),
        None => SessionController::new(prefs.clone()),
    };
    controller.resize(args.viewport);

    // Channels (small/bounded)
    let (cmd_tx, cmd_rx) = mpsc::channel::<UiCommand>(32); // Console -> Session
    let (ui_tx, ui_rx) = mpsc::channel::<SessionEvent>(256); // Session -> Console
    let (render_tx, render_rx) = mpsc::channel::<RenderRequest>(16); // Session -> Render
    let (result_tx, result_rx) = mpsc::channel::<RenderResult>(4); // Render -> Session
    let latest = Arc::new(AtomicU64::new(0));

    // Report the catalog the saved folders produce before the first command
    for event in controller.apply_preferences(prefs.clone()) {
        ui_tx.send(event).await.context("console closed early")?;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let latest = Arc::clone(&latest);
        let cancel = cancel.clone();
        async move {
            render::run(
                render_rx,
                result_tx,
                Arc::new(ImagePresenter),
                latest,
                cancel,
            )
            .await
            .context("render task failed")
        }
    });

    tasks.spawn({
        let task = SessionTask {
            controller,
            store,
            cue,
            latest,
        };
        let links = SessionLinks {
            commands: cmd_rx,
            to_ui: ui_tx,
            to_render: render_tx,
            render_results: result_rx,
        };
        let cancel = cancel.clone();
        async move { task.run(links, cancel).await.context("session task failed") }
    });

    tasks.spawn({
        let frame_out = args.frame_out.clone();
        let cancel = cancel.clone();
        async move {
            console::run_output(ui_rx, frame_out, cancel)
                .await
                .context("console output failed")
        }
    });

    println!("{}", console::HELP);
    // Detached: a pending stdin read must not hold up shutdown
    let _input = console::spawn_input(cmd_tx, prefs, cancel.clone());

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
        // One task ending takes the rest down with it
        cancel.cancel();
    }

    Ok(())
}

fn print_catalog(prefs: &Preferences, seed: Option<u64>) {
    let folders = prefs.enabled_folders();
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let catalog = Catalog::build(&folders, prefs.shuffle, &mut rng);

    println!(
        "# catalog\n# folders: {}\n# shuffle: {}\n# seed: {}\n",
        folders.len(),
        prefs.shuffle,
        seed.map_or_else(|| "(random)".to_string(), |s| s.to_string())
    );
    for count in catalog.folder_counts() {
        println!("  {:>5}  {}", count.images, count.folder.display());
    }
    if catalog.is_empty() {
        println!("\n(no images discovered)");
        return;
    }
    println!("\n# order:");
    for (idx, path) in catalog.as_slice().iter().enumerate() {
        println!("  {:>4}: {}", idx + 1, path.display());
    }
}
