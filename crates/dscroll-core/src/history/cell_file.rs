//! Append-only byte log backing the disk-based history store.
//!
//! ## Design
//!
//! A [`CellFile`] owns an anonymous temp file: created under the OS temp
//! directory from a `konsole-XXXXXX.history` template, then immediately
//! unlinked while the handle stays open, so the log disappears with the
//! session even on abnormal exit.
//!
//! Terminal workloads oscillate between a bulk-output phase (write-heavy)
//! and a scrollback-inspection phase (read-heavy). A signed balance counter
//! tracks the pattern: +1 per append, -1 per read. Once the balance sinks
//! below [`MAP_THRESHOLD`] the whole file is mapped read-only and every
//! byte fetch becomes a plain load. Any append while mapped drops the
//! mapping first, since appends extend the file past the mapped range.
//!
//! I/O failures are logged and leave the operation a no-op; the log stays
//! usable. A subsystem this far below the UI has no local recovery story,
//! so it prefers best-effort continuation over surfacing errors.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use memmap2::{Mmap, MmapOptions};
use tracing::warn;

/// Balance value below which a read maps the file.
///
/// Large enough that a short scrollback glance stays on positioned reads;
/// sustained inspection (a user actually reading history) flips to mmap.
const MAP_THRESHOLD: i32 = -1000;

/// Append-only, randomly readable byte log on an unlinked temp file.
pub struct CellFile {
    file: File,
    length: u64,
    map: Option<Mmap>,
    read_write_balance: i32,
}

impl CellFile {
    /// Create the backing temp file.
    ///
    /// The file is unlinked immediately after creation; the open handle
    /// keeps the storage alive for the session.
    pub fn new() -> std::io::Result<Self> {
        let named = tempfile::Builder::new()
            .prefix("konsole-")
            .suffix(".history")
            .tempfile()?;
        // Dropping the TempPath unlinks the file while the handle stays
        // open, so the kernel reclaims the storage when we close it.
        let (file, path) = named.into_parts();
        drop(path);
        Ok(Self {
            file,
            length: 0,
            map: None,
            read_write_balance: 0,
        })
    }

    /// Current log length in bytes.
    #[must_use]
    #[inline]
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the log is empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether the file is currently memory-mapped.
    #[must_use]
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map.is_some()
    }

    /// Map the whole file read-only, if it has any content.
    ///
    /// On failure the balance is reset so the heuristic does not retry on
    /// the very next read.
    pub fn map(&mut self) {
        debug_assert!(self.map.is_none());
        if self.length == 0 {
            return;
        }
        #[allow(clippy::cast_possible_truncation)] // mapped files fit the address space
        let result = unsafe { MmapOptions::new().len(self.length as usize).map(&self.file) };
        match result {
            Ok(map) => self.map = Some(map),
            Err(err) => {
                self.read_write_balance = 0;
                warn!("mmap of history file failed, using positioned reads: {err}");
            }
        }
    }

    /// Map the file if it is not already mapped.
    pub fn ensure_mapped(&mut self) {
        if self.map.is_none() {
            self.map();
        }
    }

    /// Drop the mapping.
    pub fn unmap(&mut self) {
        self.map = None;
    }

    /// Append bytes at the end of the log.
    ///
    /// Advances the logical length by the count the kernel reports, never
    /// by the requested count. Seek and write failures are logged and leave
    /// the log unchanged.
    pub fn add(&mut self, buffer: &[u8]) {
        if self.map.is_some() {
            self.unmap();
        }

        self.read_write_balance += 1;

        if let Err(err) = self.file.seek(SeekFrom::Start(self.length)) {
            warn!("history append seek failed: {err}");
            return;
        }
        match self.file.write(buffer) {
            Ok(written) => {
                if written < buffer.len() {
                    warn!(
                        requested = buffer.len(),
                        written, "short write to history file"
                    );
                }
                self.length += written as u64;
            }
            Err(err) => warn!("history append write failed: {err}"),
        }
    }

    /// Read `buffer.len()` bytes at `offset`.
    ///
    /// Reads count toward the map heuristic. On the positioned-I/O path an
    /// out-of-range request is a caller bug: it aborts in debug builds and
    /// is a logged no-op in release, leaving `buffer` untouched.
    pub fn get(&mut self, buffer: &mut [u8], offset: u64) {
        self.read_write_balance -= 1;
        if self.map.is_none() && self.read_write_balance < MAP_THRESHOLD {
            self.map();
        }

        let end = offset + buffer.len() as u64;
        if let Some(map) = &self.map {
            #[allow(clippy::cast_possible_truncation)]
            buffer.copy_from_slice(&map[offset as usize..end as usize]);
        } else {
            debug_assert!(
                end <= self.length,
                "history read out of range: {end} > {}",
                self.length
            );
            if end > self.length {
                warn!(offset, len = buffer.len(), "history read out of range");
                return;
            }
            if let Err(err) = self.file.seek(SeekFrom::Start(offset)) {
                warn!("history read seek failed: {err}");
                return;
            }
            if let Err(err) = self.file.read_exact(buffer) {
                warn!("history read failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_back() {
        let mut log = CellFile::new().unwrap();
        log.add(b"hello ");
        log.add(b"world");
        assert_eq!(log.len(), 11);

        let mut buf = [0u8; 5];
        log.get(&mut buf, 6);
        assert_eq!(&buf, b"world");

        log.get(&mut buf, 0);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn read_heavy_workload_maps_file() {
        let mut log = CellFile::new().unwrap();
        log.add(b"0123456789");
        assert!(!log.is_mapped());

        let mut buf = [0u8; 1];
        // Drive the balance well past the threshold.
        for _ in 0..1200 {
            log.get(&mut buf, 3);
        }
        assert!(log.is_mapped());
        assert_eq!(buf[0], b'3');
    }

    #[test]
    fn append_drops_mapping() {
        let mut log = CellFile::new().unwrap();
        log.add(b"abc");
        log.ensure_mapped();
        assert!(log.is_mapped());

        log.add(b"def");
        assert!(!log.is_mapped());
        assert_eq!(log.len(), 6);

        let mut buf = [0u8; 6];
        log.get(&mut buf, 0);
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn mapped_reads_see_all_committed_bytes() {
        let mut log = CellFile::new().unwrap();
        log.add(b"first");
        log.add(b"second");
        log.ensure_mapped();

        let mut buf = [0u8; 6];
        log.get(&mut buf, 5);
        assert_eq!(&buf, b"second");
    }

    #[test]
    fn mapping_empty_file_is_noop() {
        let mut log = CellFile::new().unwrap();
        log.ensure_mapped();
        assert!(!log.is_mapped());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn out_of_range_read_is_noop() {
        let mut log = CellFile::new().unwrap();
        log.add(b"ab");
        let mut buf = [0xAAu8; 4];
        log.get(&mut buf, 1);
        assert_eq!(buf, [0xAA; 4]);
    }
}
