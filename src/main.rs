//! Shufflebox - command-line shuffle player
//!
//! Scans a directory for `.mp3` files, shuffles them into a
//! non-repeating play order, and plays through it with next/previous
//! navigation. Title, artist and artwork info come from the in-repo ID3
//! reader. The selected directory is remembered across runs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shufflebox::audio::{self, SinkEvent};
use shufflebox::db::{DatabaseConnection, StateStore, MUSIC_DIR_KEY};
use shufflebox::library::DirectoryScanner;
use shufflebox::session::{Navigation, PlayerSession};
use shufflebox::settings::AppSettings;
use shufflebox::state::AppState;

/// Command-line arguments for shufflebox
#[derive(Parser, Debug)]
#[command(name = "shufflebox")]
#[command(about = "Shuffle-first MP3 player")]
#[command(version)]
struct Args {
    /// Directory to play; defaults to the one remembered from last time
    music_dir: Option<PathBuf>,

    /// Where the settings file and state database live
    #[arg(long, env = "SHUFFLEBOX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Playback volume, 0.0 to 1.0
    #[arg(short, long)]
    volume: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shufflebox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let app_dir = args
        .data_dir
        .clone()
        .or_else(|| dirs::data_local_dir().map(|d| d.join("shufflebox")))
        .context("cannot determine a data directory")?;

    // A broken state database degrades to "no remembered directory"
    let db = match DatabaseConnection::new(app_dir.join("shufflebox.db")) {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("state database unavailable: {}", e);
            None
        }
    };

    let mut settings = AppSettings::load(&app_dir).unwrap_or_else(|e| {
        warn!("settings unreadable, using defaults: {}", e);
        AppSettings::default()
    });
    if let Some(volume) = args.volume {
        settings.volume = volume.clamp(0.0, 1.0);
    }

    let (music_dir, restored) = resolve_music_dir(&args, db.as_ref())?;
    let tracks = DirectoryScanner::scan(&music_dir)
        .with_context(|| format!("failed to scan {}", music_dir.display()))?;

    if tracks.is_empty() {
        // A remembered directory that no longer yields tracks is forgotten
        if restored {
            if let Some(db) = &db {
                let _ = StateStore::delete(db, MUSIC_DIR_KEY);
            }
        }
        println!("Nothing to play in {}", music_dir.display());
        return Ok(());
    }

    if let Some(db) = &db {
        if let Err(e) = StateStore::put(db, MUSIC_DIR_KEY, &music_dir.to_string_lossy()) {
            warn!("could not remember music directory: {}", e);
        }
    }

    info!("{} tracks in {}", tracks.len(), music_dir.display());

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = audio::start_sink(event_tx, settings.volume);
    let session = Arc::new(PlayerSession::new(tracks, sink));
    let state = AppState::new(session.clone(), db, app_dir);

    // Start playing right away
    report(&session.play_next().await);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(SinkEvent::TrackEnded) => {
                    report(&state.session.handle_track_ended().await);
                }
                Some(SinkEvent::PlaybackError(e)) => warn!("playback error: {}", e),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if handle_command(line.trim(), &state, &mut settings).await {
                    break;
                }
            }
        }
    }

    state.session.shutdown();
    if let Err(e) = settings.save(&state.app_dir) {
        warn!("could not save settings: {}", e);
    }
    Ok(())
}

/// Pick the directory to play: an explicit argument wins, otherwise the
/// remembered one. The bool reports whether the directory was restored.
fn resolve_music_dir(args: &Args, db: Option<&DatabaseConnection>) -> Result<(PathBuf, bool)> {
    if let Some(dir) = &args.music_dir {
        return Ok((dir.clone(), false));
    }

    let remembered = db
        .and_then(|db| StateStore::get(db, MUSIC_DIR_KEY).ok())
        .flatten();

    match remembered {
        Some(dir) => {
            info!("restoring remembered directory {}", dir);
            Ok((PathBuf::from(dir), true))
        }
        None => bail!("no music directory given and none remembered; pass one as an argument"),
    }
}

/// Run one console command; returns true when the user wants to quit
async fn handle_command(line: &str, state: &AppState, settings: &mut AppSettings) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("n") | Some("next") => report(&state.session.play_next().await),
        Some("p") | Some("prev") => report(&state.session.play_prev().await),
        Some("pause") => state.session.pause(),
        Some("r") | Some("resume") => state.session.resume(),
        Some("v") | Some("volume") => match parts.next().and_then(|v| v.parse::<f32>().ok()) {
            Some(volume) => {
                settings.volume = volume.clamp(0.0, 1.0);
                state.session.set_volume(settings.volume);
            }
            None => println!("usage: v <0.0..=1.0>"),
        },
        Some("q") | Some("quit") => return true,
        Some(_) => print_help(),
        None => {}
    }
    false
}

fn report(nav: &Navigation) {
    match nav {
        Navigation::Playing(np) => {
            if np.artist.is_empty() {
                println!("> {}", np.title);
            } else {
                println!("> {} - {}", np.title, np.artist);
            }
            if let Some(mime) = &np.artwork_mime {
                println!("  [artwork: {}]", mime);
            }
        }
        Navigation::Exhausted => println!("End of shuffle: every track has played."),
        Navigation::NoPrevious => println!("Already at the first track."),
        Navigation::NothingToPlay => println!("Nothing to play."),
        Navigation::Superseded => {}
        Navigation::TrackFailed(e) => println!("Skipped: {}", e),
    }
}

fn print_help() {
    println!("commands: n(ext), p(rev), pause, r(esume), v <volume>, q(uit)");
}
