// Queue management module
// This module handles the shuffled play order and its history

pub mod shuffle;

pub use shuffle::Sequencer;
