// Track handles and byte-range access
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Byte-level view of a track's contents.
///
/// The tag reader only ever needs the total length and arbitrary
/// sub-ranges, never a whole-file read, so this trait is the seam between
/// parsing and file I/O. Tests run the parser over in-memory buffers.
pub trait TagSource {
    /// Total size of the underlying data in bytes
    fn byte_len(&self) -> std::io::Result<u64>;

    /// Materialize the byte range `[start, end)` into memory.
    /// The range is clamped to the data's length.
    fn read_range(&self, start: u64, end: u64) -> std::io::Result<Vec<u8>>;

    /// Name used for display and for the title fallback
    fn display_name(&self) -> String;
}

/// A single audio file in the collection.
///
/// Holds only the path; bytes are materialized on demand. Immutable for
/// the lifetime of a session.
#[derive(Debug, Clone)]
pub struct TrackFile {
    path: PathBuf,
}

impl TrackFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TagSource for TrackFile {
    fn byte_len(&self) -> std::io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn read_range(&self, start: u64, end: u64) -> std::io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        let start = start.min(len);
        let end = end.clamp(start, len);

        let mut buf = vec![0u8; (end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}
