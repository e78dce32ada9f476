//! Whole-file stream with guaranteed tail padding
use super::{Stream, PAD};
use crate::Error;

use memmap2::MmapMut;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// [MappedStream] holds the entire file in one anonymous mapping
/// sized `len + PAD`. A file-backed mapping cannot promise readable
/// zeros past the final page, so the file is read into fresh
/// zero-filled pages instead; the window is then any suffix of the
/// mapping and never needs to move data again.
pub struct MappedStream {
    map: MmapMut,
    len: usize,
    offset: usize,
}

impl MappedStream {
    /// Maps the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        let mut map = MmapMut::map_anon(len + PAD)?;
        file.read_exact(&mut map[..len])?;
        Ok(Self {
            map,
            len,
            offset: 0,
        })
    }
}

impl Stream for MappedStream {
    fn advance(&mut self, _req: usize, step: usize) -> Result<usize, Error> {
        // the whole file is resident: req is always satisfied
        self.offset = (self.offset + step).min(self.len);
        Ok(self.len - self.offset)
    }

    fn window(&self) -> &[u8] {
        &self.map[self.offset..]
    }

    fn len(&self) -> usize {
        self.len - self.offset
    }
}
