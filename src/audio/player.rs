// Audio sink worker
// Owns the decoder and output stream for the current track and runs a
// command loop on a dedicated thread. Replacing or stopping the track
// drops both, which releases the device stream.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::audio::decoder::AudioDecoder;
use crate::audio::output::AudioOutput;
use crate::error::Result;

/// Commands accepted by the sink worker
#[derive(Debug)]
pub enum SinkCommand {
    Play(PathBuf),
    Pause,
    Resume,
    Stop,
    SetVolume(f32),
    Shutdown,
}

/// Events emitted back to the orchestration side
#[derive(Debug, Clone)]
pub enum SinkEvent {
    /// The current track played to its natural end
    TrackEnded,
    /// The current track could not be opened or decoded
    PlaybackError(String),
}

/// Cheap cloneable handle for sending commands to the worker
#[derive(Clone)]
pub struct SinkHandle {
    command_tx: Sender<SinkCommand>,
}

impl SinkHandle {
    pub fn new(command_tx: Sender<SinkCommand>) -> Self {
        Self { command_tx }
    }

    /// Best-effort send. If the worker died, the command is dropped.
    pub fn send(&self, command: SinkCommand) {
        let _ = self.command_tx.send(command);
    }

    pub fn play(&self, path: PathBuf) {
        self.send(SinkCommand::Play(path));
    }

    pub fn pause(&self) {
        self.send(SinkCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(SinkCommand::Resume);
    }

    pub fn stop(&self) {
        self.send(SinkCommand::Stop);
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(SinkCommand::SetVolume(volume));
    }

    pub fn shutdown(&self) {
        self.send(SinkCommand::Shutdown);
    }
}

/// Spawn the sink worker thread and return a handle to it
pub fn start_sink(event_tx: UnboundedSender<SinkEvent>, volume: f32) -> SinkHandle {
    let (command_tx, command_rx) = mpsc::channel();

    thread::spawn(move || {
        let mut worker = Worker::new(event_tx, volume);
        worker.run(command_rx);
    });

    SinkHandle::new(command_tx)
}

struct Worker {
    decoder: Option<AudioDecoder>,
    output: Option<AudioOutput>,
    upmix_mono: bool,
    paused: bool,
    volume: f32,
    pending: Vec<f32>,
    pending_pos: usize,
    event_tx: UnboundedSender<SinkEvent>,
}

impl Worker {
    fn new(event_tx: UnboundedSender<SinkEvent>, volume: f32) -> Self {
        Self {
            decoder: None,
            output: None,
            upmix_mono: false,
            paused: false,
            volume: volume.clamp(0.0, 1.0),
            pending: Vec::new(),
            pending_pos: 0,
            event_tx,
        }
    }

    fn run(&mut self, command_rx: Receiver<SinkCommand>) {
        loop {
            if self.is_active() {
                // Playing: stay responsive while pumping samples
                match command_rx.try_recv() {
                    Ok(cmd) => {
                        if self.handle_command(cmd) {
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => self.pump(),
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                // Idle or paused: just wait for commands
                match command_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(cmd) => {
                        if self.handle_command(cmd) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }

        self.stop_internal();
    }

    fn is_active(&self) -> bool {
        self.decoder.is_some() && !self.paused
    }

    fn handle_command(&mut self, cmd: SinkCommand) -> bool {
        match cmd {
            SinkCommand::Play(path) => {
                if let Err(e) = self.play_file(&path) {
                    warn!("cannot play {}: {}", path.display(), e);
                    let _ = self.event_tx.send(SinkEvent::PlaybackError(e.to_string()));
                }
            }
            SinkCommand::Pause => {
                self.paused = true;
                if let Some(output) = &self.output {
                    let _ = output.pause();
                }
            }
            SinkCommand::Resume => {
                self.paused = false;
                if let Some(output) = &self.output {
                    let _ = output.resume();
                }
            }
            SinkCommand::Stop => self.stop_internal(),
            SinkCommand::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 1.0);
                if let Some(output) = &self.output {
                    output.set_volume(self.volume);
                }
            }
            SinkCommand::Shutdown => return true,
        }

        false
    }

    fn play_file(&mut self, path: &Path) -> Result<()> {
        // Replacing the current track releases its decoder and stream first
        self.stop_internal();

        let decoder = AudioDecoder::open(path)?;

        // Mono sources are duplicated onto a stereo stream; everything
        // else plays at its own channel count
        let (out_channels, upmix_mono) = match decoder.channels() {
            1 => (2u16, true),
            n => (n as u16, false),
        };

        let output = AudioOutput::open(decoder.sample_rate(), out_channels, self.volume)?;

        debug!(
            "playing {} ({} Hz, {} ch)",
            path.display(),
            decoder.sample_rate(),
            decoder.channels()
        );

        self.decoder = Some(decoder);
        self.output = Some(output);
        self.upmix_mono = upmix_mono;
        self.paused = false;
        Ok(())
    }

    /// Move one step of audio from the decoder into the output buffer
    fn pump(&mut self) {
        if self.pending_pos >= self.pending.len() {
            let decoded = match self.decoder.as_mut() {
                Some(decoder) => decoder.decode_next(),
                None => return,
            };

            match decoded {
                Ok(Some(samples)) => {
                    self.pending = if self.upmix_mono {
                        samples.iter().flat_map(|s| [*s, *s]).collect()
                    } else {
                        samples
                    };
                    self.pending_pos = 0;
                }
                Ok(None) => {
                    // Source exhausted: report the natural end once the
                    // device has drained what was queued
                    let drained = self.output.as_ref().map(|o| o.is_drained()).unwrap_or(true);
                    if drained {
                        let _ = self.event_tx.send(SinkEvent::TrackEnded);
                        self.stop_internal();
                    } else {
                        thread::sleep(Duration::from_millis(10));
                    }
                    return;
                }
                Err(e) => {
                    warn!("decode failed mid-track: {}", e);
                    let _ = self.event_tx.send(SinkEvent::PlaybackError(e.to_string()));
                    self.stop_internal();
                    return;
                }
            }
        }

        if let Some(output) = &self.output {
            let written = output.write(&self.pending[self.pending_pos..]);
            self.pending_pos += written;
            if written == 0 {
                // Ring buffer full; give the device a moment
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    fn stop_internal(&mut self) {
        // Dropping the output tears down the device stream
        self.decoder = None;
        self.output = None;
        self.pending.clear();
        self.pending_pos = 0;
        self.paused = false;
    }
}
