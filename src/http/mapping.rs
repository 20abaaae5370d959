use std::fs::File;
use std::io;

use memmap2::{Mmap, MmapOptions};

use crate::http::range::ByteWindow;

/// A read-only mapping of a served file, or of a page-aligned slice of it.
///
/// The mapped length lives inside the mapping itself, so the length released
/// is always the length that was mapped. Dropping the region unmaps it.
#[derive(Debug)]
pub struct MappedRegion {
    map: Mmap,
    /// Start of the client-visible bytes inside `map`.
    visible: usize,
}

impl MappedRegion {
    /// Maps the whole file.
    pub fn full(file: &File, file_len: u64) -> io::Result<Self> {
        let len = to_usize(file_len)?;
        // SAFETY: the mapping is private and read-only. Truncation of the file
        // by another process while the mapping is alive is outside our control,
        // as with any file-backed mapping.
        let map = unsafe { MmapOptions::new().len(len).map(file)? };
        Ok(Self { map, visible: 0 })
    }

    /// Maps just enough of the file to cover `window`, starting on a page boundary.
    pub fn window(file: &File, window: ByteWindow) -> io::Result<Self> {
        let len = to_usize(window.map_len())?;
        // SAFETY: see `full`.
        let map = unsafe {
            MmapOptions::new()
                .offset(window.map_start())
                .len(len)
                .map(file)?
        };
        Ok(Self {
            map,
            visible: to_usize(window.offset())?,
        })
    }

    /// The bytes that go on the wire.
    pub fn as_slice(&self) -> &[u8] {
        &self.map[self.visible..]
    }

    /// Length of the mapping itself, alignment padding included.
    pub fn mapped_len(&self) -> usize {
        self.map.len()
    }
}

fn to_usize(n: u64) -> io::Result<usize> {
    usize::try_from(n).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file too large to map"))
}
