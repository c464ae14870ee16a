// Playback session
// Composes the shuffle sequencer with the tag reader and the audio sink.
// Navigation requests (next, previous, natural end of track) are
// serialized through one async mutex, and each request claims a
// generation number so a request that got overtaken while waiting or
// resolving applies none of its effects.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::audio::SinkHandle;
use crate::library::track::{TagSource, TrackFile};
use crate::metadata::{extract_metadata, Artwork, TagMetadata};
use crate::queue::Sequencer;

/// Summary of the track a navigation landed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub track_index: usize,
    pub title: String,
    pub artist: String,
    pub artwork_mime: Option<String>,
}

/// Outcome of one navigation request.
///
/// Partial success is modeled here rather than logged and swallowed:
/// every way a navigation can end has a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// A track was resolved and handed to the sink
    Playing(NowPlaying),
    /// Every position has been played; the sink was told to stop
    Exhausted,
    /// Nothing earlier in the history to go back to
    NoPrevious,
    /// The collection is empty
    NothingToPlay,
    /// A newer request arrived first; this one applied nothing
    Superseded,
    /// The resolved track could not be read. Forward skips still count
    /// the position as visited so the non-repeat guarantee holds.
    TrackFailed(String),
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

struct CurrentTrack {
    track_index: usize,
    /// Owns the artwork bytes; installing the next track's metadata
    /// replaces the whole value, which releases the previous artwork on
    /// every path
    metadata: TagMetadata,
}

struct SessionInner {
    tracks: Vec<TrackFile>,
    sequencer: Sequencer,
    current: Option<CurrentTrack>,
}

/// One playback session over a fixed track collection.
///
/// Built when a playlist is loaded and discarded when it is replaced;
/// the shuffle order and history live and die with it.
pub struct PlayerSession {
    inner: Mutex<SessionInner>,
    generation: AtomicU64,
    sink: SinkHandle,
}

impl PlayerSession {
    pub fn new(tracks: Vec<TrackFile>, sink: SinkHandle) -> Self {
        let sequencer = Sequencer::new(tracks.len());
        Self {
            inner: Mutex::new(SessionInner {
                tracks,
                sequencer,
                current: None,
            }),
            generation: AtomicU64::new(0),
            sink,
        }
    }

    /// Advance to the next unplayed track
    pub async fn play_next(&self) -> Navigation {
        let gen = self.claim_generation();
        let mut inner = self.inner.lock().await;
        if self.superseded(gen) {
            return Navigation::Superseded;
        }

        if inner.sequencer.is_empty() {
            return Navigation::NothingToPlay;
        }

        let Some(position) = inner.sequencer.peek_advance() else {
            info!("shuffle order exhausted, stopping playback");
            self.sink.stop();
            return Navigation::Exhausted;
        };

        self.activate(&mut inner, gen, position, Direction::Forward)
            .await
    }

    /// Step back to the previously played track
    pub async fn play_prev(&self) -> Navigation {
        let gen = self.claim_generation();
        let mut inner = self.inner.lock().await;
        if self.superseded(gen) {
            return Navigation::Superseded;
        }

        if inner.sequencer.is_empty() {
            return Navigation::NothingToPlay;
        }

        let Some(position) = inner.sequencer.peek_retreat() else {
            return Navigation::NoPrevious;
        };

        self.activate(&mut inner, gen, position, Direction::Backward)
            .await
    }

    /// A track finishing on its own is the same as pressing next
    pub async fn handle_track_ended(&self) -> Navigation {
        self.play_next().await
    }

    /// Resolve an order position to its track, decode its tags, and hand
    /// it to the sink. Nothing is applied until the generation check has
    /// confirmed this request is still the newest one.
    async fn activate(
        &self,
        inner: &mut SessionInner,
        gen: u64,
        position: usize,
        direction: Direction,
    ) -> Navigation {
        let Some(track_index) = inner.sequencer.track_index(position) else {
            return Navigation::TrackFailed(format!("order position {} out of range", position));
        };
        let track = inner.tracks[track_index].clone();
        let path = track.path().to_path_buf();
        let display_name = track.display_name();

        // Confirm the file is readable and decode its tags off the
        // runtime. The sink handoff below does not wait on the decoded
        // result, only on the supersede check.
        let resolved = tokio::task::spawn_blocking(move || {
            track.byte_len()?;
            Ok::<TagMetadata, std::io::Error>(extract_metadata(&track))
        })
        .await;

        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => return Navigation::TrackFailed(format!("resolution task failed: {}", e)),
        };

        if self.superseded(gen) {
            // A newer navigation arrived while this one was resolving;
            // drop everything it would have applied
            return Navigation::Superseded;
        }

        match resolved {
            Ok(metadata) => {
                self.apply(inner, direction);
                self.sink.play(path);

                let now_playing = NowPlaying {
                    track_index,
                    title: metadata.title.clone(),
                    artist: metadata.artist.clone(),
                    artwork_mime: metadata.artwork.as_ref().map(|a| a.mime.clone()),
                };
                // Replacing the previous entry drops its artwork
                inner.current = Some(CurrentTrack {
                    track_index,
                    metadata,
                });
                Navigation::Playing(now_playing)
            }
            Err(e) => {
                warn!("cannot read {}: {}", display_name, e);
                // The skip still moves the sequencer: the unreadable
                // track's position must not be offered again
                self.apply(inner, direction);
                Navigation::TrackFailed(format!("cannot read {}: {}", display, e))
            }
        }
    }

    fn apply(&self, inner: &mut SessionInner, direction: Direction) {
        match direction {
            Direction::Forward => {
                inner.sequencer.advance();
            }
            Direction::Backward => {
                inner.sequencer.retreat();
            }
        }
    }

    fn claim_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn superseded(&self, gen: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != gen
    }

    /// Metadata summary of the current track, if any
    pub async fn current(&self) -> Option<NowPlaying> {
        let inner = self.inner.lock().await;
        inner.current.as_ref().map(|c| NowPlaying {
            track_index: c.track_index,
            title: c.metadata.title.clone(),
            artist: c.metadata.artist.clone(),
            artwork_mime: c.metadata.artwork.as_ref().map(|a| a.mime.clone()),
        })
    }

    /// The current track's artwork for a display surface to render
    pub async fn current_artwork(&self) -> Option<Artwork> {
        let inner = self.inner.lock().await;
        inner
            .current
            .as_ref()
            .and_then(|c| c.metadata.artwork.clone())
    }

    pub fn pause(&self) {
        self.sink.pause();
    }

    pub fn resume(&self) {
        self.sink.resume();
    }

    pub fn stop(&self) {
        self.sink.stop();
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }

    pub fn shutdown(&self) {
        self.sink.shutdown();
    }
}
