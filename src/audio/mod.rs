// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod decoder;
pub mod output;
pub mod player;

pub use player::{start_sink, SinkCommand, SinkEvent, SinkHandle};
