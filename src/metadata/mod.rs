// Metadata module
// This module handles ID3 tag parsing for display metadata

pub mod id3;
pub mod text;

pub use id3::{extract_metadata, Artwork, TagMetadata};
