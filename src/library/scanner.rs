use std::path::Path;
use walkdir::WalkDir;

use crate::library::track::TrackFile;

/// List of supported audio file extensions
const SUPPORTED_EXTENSIONS: &[&str] = &["mp3"];

/// Scanner for finding audio files in a directory tree
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan a directory recursively and return all audio tracks.
    ///
    /// Files are accepted on extension alone; no format sniffing happens
    /// here. The resulting order is the walk order, which stays fixed for
    /// the session; playlist indices refer into it.
    pub fn scan<P: AsRef<Path>>(directory: P) -> Result<Vec<TrackFile>, anyhow::Error> {
        let mut tracks = Vec::new();

        for entry in WalkDir::new(directory)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            // Skip directories
            if !path.is_file() {
                continue;
            }

            // Check if file has a supported extension
            if let Some(extension) = path.extension() {
                let ext_str = extension.to_string_lossy().to_lowercase();
                if SUPPORTED_EXTENSIONS.contains(&ext_str.as_str()) {
                    tracks.push(TrackFile::new(path.to_path_buf()));
                }
            }
        }

        Ok(tracks)
    }
}
