//! Disk-backed unbounded history store.
//!
//! ## Design
//!
//! Three parallel [`CellFile`] logs:
//!
//! - **cells**: concatenated cell records, one run per line;
//! - **index**: for each line `L >= 1`, a `u32` byte offset into `cells`
//!   marking the start of line `L` (line 0 implicitly starts at 0, so
//!   entry `k` is both the end of line `k` and the start of line `k + 1`);
//! - **lineflags**: one byte per line holding the wrapped flag.
//!
//! The producer contract is strictly `add_cells(...)` then `add_line(...)`
//! per logical line; interleaving them out of order corrupts the index.
//!
//! The store is unbounded by design and grows until disk or quota runs
//! out.

use crate::character::{Character, CELL_BYTES};
use crate::history::cell_file::CellFile;
use crate::history::{HistoryScroll, HistoryType};

/// Serialized size of one index entry.
const INDEX_BYTES: usize = 4;

/// Unbounded history store backed by temp files.
pub struct FileHistoryScroll {
    cells: CellFile,
    index: CellFile,
    lineflags: CellFile,
    /// Reusable scratch for cell (de)serialization.
    io_buffer: Vec<u8>,
}

impl FileHistoryScroll {
    /// Create the store and its three backing temp files.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            cells: CellFile::new()?,
            index: CellFile::new()?,
            lineflags: CellFile::new()?,
            io_buffer: Vec::new(),
        })
    }

    /// Byte offset in `cells` where `line` starts.
    ///
    /// The index file is the hottest of the three (every cell read goes
    /// through it), so it is force-mapped on first use rather than waiting
    /// for the balance heuristic.
    fn start_of_line(&mut self, line: usize) -> u64 {
        if line == 0 {
            return 0;
        }
        if line <= self.line_count() {
            self.index.ensure_mapped();
            let mut entry = [0u8; INDEX_BYTES];
            self.index.get(&mut entry, ((line - 1) * INDEX_BYTES) as u64);
            return u64::from(u32::from_le_bytes(entry));
        }
        self.cells.len()
    }
}

impl HistoryScroll for FileHistoryScroll {
    fn history_type(&self) -> HistoryType {
        HistoryType::File
    }

    #[allow(clippy::cast_possible_truncation)] // index length tracks real appends
    fn line_count(&self) -> usize {
        self.index.len() as usize / INDEX_BYTES
    }

    fn line_len(&mut self, line: usize) -> usize {
        let start = self.start_of_line(line);
        let end = self.start_of_line(line + 1);
        ((end - start) as usize) / CELL_BYTES
    }

    fn is_wrapped_line(&mut self, line: usize) -> bool {
        // Out-of-range indices (including one past the end) read nothing.
        if line >= self.line_count() {
            return false;
        }
        let mut flag = [0u8; 1];
        self.lineflags.get(&mut flag, line as u64);
        flag[0] != 0
    }

    fn get_cells(&mut self, line: usize, start_column: usize, out: &mut [Character]) {
        if out.is_empty() {
            return;
        }
        let offset = self.start_of_line(line) + (start_column * CELL_BYTES) as u64;

        let mut buf = std::mem::take(&mut self.io_buffer);
        buf.clear();
        buf.resize(out.len() * CELL_BYTES, 0);
        self.cells.get(&mut buf, offset);
        for (cell, record) in out.iter_mut().zip(buf.chunks_exact(CELL_BYTES)) {
            *cell = Character::read_from(record);
        }
        self.io_buffer = buf;
    }

    fn add_cells(&mut self, cells: &[Character]) {
        let mut buf = std::mem::take(&mut self.io_buffer);
        buf.clear();
        buf.resize(cells.len() * CELL_BYTES, 0);
        for (cell, record) in cells.iter().zip(buf.chunks_exact_mut(CELL_BYTES)) {
            cell.write_to(record);
        }
        self.cells.add(&buf);
        self.io_buffer = buf;
    }

    fn add_line(&mut self, previous_wrapped: bool) {
        // Index entries saturate at u32::MAX; a cells log that large has
        // long since exhausted any sane disk quota.
        let offset = u32::try_from(self.cells.len()).unwrap_or(u32::MAX);
        self.index.add(&offset.to_le_bytes());
        self.lineflags.add(&[u8::from(previous_wrapped)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells_of(text: &str) -> Vec<Character> {
        text.chars().map(|c| Character::from_code(c as u16)).collect()
    }

    fn text_of(cells: &[Character]) -> String {
        cells
            .iter()
            .map(|c| char::from_u32(u32::from(c.code)).unwrap())
            .collect()
    }

    fn push_line(store: &mut FileHistoryScroll, text: &str, wrapped: bool) {
        store.add_cells(&cells_of(text));
        store.add_line(wrapped);
    }

    #[test]
    fn round_trip_two_lines() {
        let mut store = FileHistoryScroll::new().unwrap();
        push_line(&mut store, "foo", true);
        push_line(&mut store, "bar", false);

        assert_eq!(store.line_count(), 2);
        assert_eq!(store.line_len(0), 3);
        assert_eq!(store.line_len(1), 3);
        assert!(store.is_wrapped_line(0));
        assert!(!store.is_wrapped_line(1));

        let mut out = vec![Character::DEFAULT; 3];
        store.get_cells(1, 0, &mut out);
        assert_eq!(text_of(&out), "bar");
    }

    #[test]
    fn preserves_formats_bitwise() {
        use crate::character::{PackedColor, Rendition};

        let mut line = cells_of("ok");
        line[0].rendition = Rendition::BOLD | Rendition::REVERSE;
        line[0].foreground = PackedColor::rgb(1, 2, 3);
        line[1].background = PackedColor::indexed(11);

        let mut store = FileHistoryScroll::new().unwrap();
        store.add_cells(&line);
        store.add_line(false);

        let mut out = vec![Character::DEFAULT; 2];
        store.get_cells(0, 0, &mut out);
        assert_eq!(out, line);
    }

    #[test]
    fn column_offset_reads_mid_line() {
        let mut store = FileHistoryScroll::new().unwrap();
        push_line(&mut store, "abcdef", false);

        let mut out = vec![Character::DEFAULT; 3];
        store.get_cells(0, 2, &mut out);
        assert_eq!(text_of(&out), "cde");
    }

    #[test]
    fn wrapped_query_out_of_range_is_false() {
        let mut store = FileHistoryScroll::new().unwrap();
        push_line(&mut store, "x", true);

        assert!(store.is_wrapped_line(0));
        // One past the end used to read an unwritten byte; now it is
        // simply out of range.
        assert!(!store.is_wrapped_line(1));
        assert!(!store.is_wrapped_line(100));
    }

    #[test]
    fn empty_lines_have_zero_len() {
        let mut store = FileHistoryScroll::new().unwrap();
        push_line(&mut store, "", false);
        push_line(&mut store, "a", false);

        assert_eq!(store.line_count(), 2);
        assert_eq!(store.line_len(0), 0);
        assert_eq!(store.line_len(1), 1);
    }

    #[test]
    fn has_scroll_by_default() {
        let store = FileHistoryScroll::new().unwrap();
        assert!(store.has_scroll());
        assert_eq!(store.history_type(), HistoryType::File);
    }
}
