mod control;
mod sink;
mod source;

use control::Command;
use filter_deck_common::config::{Config, ConfigError};
use filter_deck_core::{FilterRegistry, FilterSession, SessionError};
use sink::{SinkError, SnapshotSink};
use source::{DirectorySource, SourceError};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const DEFAULT_CONFIG: &str = "config.toml";
const FRAME_QUEUE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("failed to serialize filter list: {0}")]
    Json(#[from] serde_json::Error),
}

struct Args {
    config_path: Option<PathBuf>,
    list: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Args {
    let mut parsed = Args {
        config_path: None,
        list: false,
    };
    for arg in args {
        if arg == "--list" {
            parsed.list = true;
        } else if parsed.config_path.is_none() {
            parsed.config_path = Some(PathBuf::from(arg));
        }
    }
    parsed
}

/// An explicit path must load; the implicit `config.toml` is optional.
fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(Path::new(DEFAULT_CONFIG)),
        None => Ok(Config::default()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = parse_args(std::env::args().skip(1));

    let config = match load_config(args.config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    if args.list {
        match list_filters(&config) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        app = config.session.app_name,
        default_filter = config.session.default_filter,
        source_dir = config.source.dir,
        fps = config.source.fps,
        sink_dir = config.sink.dir,
        sink_every = config.sink.every,
        "starting filter-deck player"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "player stopped");
        std::process::exit(1);
    }
    // the stdin reader parks a blocking thread that would hold up runtime shutdown
    std::process::exit(0);
}

fn list_filters(config: &Config) -> Result<String, PlayerError> {
    let registry = FilterRegistry::standard(config);
    Ok(serde_json::to_string(&registry.names())?)
}

async fn run(config: Config) -> Result<(), PlayerError> {
    let mut session = FilterSession::from_config(&config)?;
    session.on_select(|selection| println!("{}", selection.title));
    println!("{}", session.title());

    let source = DirectorySource::open(&config.source)?;
    let (mut frames, source_task) = source.spawn(FRAME_QUEUE);

    let (command_tx, mut commands) = mpsc::channel(8);
    let _stdin_task = control::spawn_stdin(command_tx);

    let mut sink = SnapshotSink::new(&config.sink);
    let cycle_every = config.player.cycle_every;
    let mut total: u64 = 0;
    let mut degraded: u64 = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    info!(total, degraded, "frame source ended");
                    break;
                };
                total += 1;

                let outcome = session.convert(&frame);
                if outcome.is_degraded() {
                    degraded += 1;
                }
                let filter = session.selection().name;
                match sink.offer(outcome.frame(), &filter).await {
                    Ok(Some(path)) => debug!(path = %path.display(), "snapshot saved"),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "failed to write snapshot"),
                }

                if total % 100 == 0 {
                    debug!(total, degraded, snapshots = sink.written(), "frames processed");
                }
                if cycle_every > 0 && total % cycle_every == 0 {
                    session.next();
                }
            }
            Some(command) = commands.recv() => {
                if !apply_command(&mut session, command) {
                    info!(total, "quit requested");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!(total, "interrupted");
                break;
            }
        }
    }

    drop(frames);
    match source_task.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "source task panicked"),
    }
    Ok(())
}

/// Returns `false` when the player should stop.
fn apply_command(session: &mut FilterSession, command: Command) -> bool {
    match command {
        Command::Next => {
            session.next();
        }
        Command::Previous => {
            session.previous();
        }
        Command::Select(index) => {
            if let Err(e) = session.set(index) {
                warn!(error = %e, "ignoring selection");
            }
        }
        Command::List => {
            let current = session.current();
            for (i, name) in session.names().iter().enumerate() {
                let marker = if i == current { '*' } else { ' ' };
                println!("{marker} {i:2} {name}");
            }
        }
        Command::Quit => return false,
    }
    true
}
