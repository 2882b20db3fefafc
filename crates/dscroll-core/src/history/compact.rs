//! In-memory bounded history store with per-line format compression.
//!
//! ## Design
//!
//! Terminal lines usually carry long runs of identically formatted cells
//! (a prompt in one color, output in another). Instead of 12 bytes per
//! cell, a [`CompactLine`] stores the line as format *runs* plus raw code
//! units, packed into a single arena allocation:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ runs: run_count x 12 bytes                          │
//! │   start_column: u16 | rendition: u16 | fg | bg: u32 │
//! ├─────────────────────────────────────────────────────┤
//! │ text: length x u16 code units                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! A run extends from its start column to the next run's start (or end of
//! line). Lookup is a linear scan over the runs; ordinary output has a
//! handful per line, and a pathologically formatted line degrades to
//! linear in its own run count, never in history size.
//!
//! The store keeps at most `max_line_count` lines, evicting oldest-first
//! after every append so the cap holds at all observation points.

use std::collections::VecDeque;

use smallvec::SmallVec;

use crate::character::{Character, PackedColor, Rendition};
use crate::history::block_list::{BlockHandle, BlockList};
use crate::history::{HistoryScroll, HistoryType};

/// Serialized size of one format run.
const RUN_BYTES: usize = 12;

/// One committed history line in run-length-compressed form.
///
/// Header fields live here, in the store's line table; the run and text
/// arrays live in the arena behind `data`. Empty lines allocate nothing.
struct CompactLine {
    data: Option<BlockHandle>,
    length: u32,
    run_count: u16,
    wrapped: bool,
}

impl CompactLine {
    fn new(cells: &[Character], blocks: &mut BlockList) -> Self {
        // Run starts are stored as u16; lines are pre-split at the screen
        // width, far below that.
        debug_assert!(cells.len() <= usize::from(u16::MAX));
        if cells.is_empty() {
            return Self {
                data: None,
                length: 0,
                run_count: 0,
                wrapped: false,
            };
        }

        // One pass to find the run boundaries; the first cell always
        // starts a run.
        let mut runs: SmallVec<[(u16, Character); 8]> = SmallVec::new();
        runs.push((0, cells[0]));
        for (i, pair) in cells.windows(2).enumerate() {
            if !pair[1].same_format(&pair[0]) {
                runs.push(((i + 1) as u16, pair[1]));
            }
        }

        let text_base = runs.len() * RUN_BYTES;
        let handle = blocks.allocate(text_base + cells.len() * 2);
        let buf = blocks.bytes_mut(handle);
        for (j, (start, cell)) in runs.iter().enumerate() {
            let at = j * RUN_BYTES;
            buf[at..at + 2].copy_from_slice(&start.to_le_bytes());
            buf[at + 2..at + 4].copy_from_slice(&cell.rendition.bits().to_le_bytes());
            buf[at + 4..at + 8].copy_from_slice(&cell.foreground.0.to_le_bytes());
            buf[at + 8..at + 12].copy_from_slice(&cell.background.0.to_le_bytes());
        }
        for (i, cell) in cells.iter().enumerate() {
            let at = text_base + i * 2;
            buf[at..at + 2].copy_from_slice(&cell.code.to_le_bytes());
        }

        Self {
            data: Some(handle),
            length: cells.len() as u32,
            run_count: runs.len() as u16,
            wrapped: false,
        }
    }

    /// Decode run `j` from the packed record.
    fn run(&self, bytes: &[u8], j: usize) -> (usize, Rendition, PackedColor, PackedColor) {
        let at = j * RUN_BYTES;
        (
            usize::from(u16::from_le_bytes([bytes[at], bytes[at + 1]])),
            Rendition::from_bits_truncate(u16::from_le_bytes([bytes[at + 2], bytes[at + 3]])),
            PackedColor(u32::from_le_bytes([
                bytes[at + 4],
                bytes[at + 5],
                bytes[at + 6],
                bytes[at + 7],
            ])),
            PackedColor(u32::from_le_bytes([
                bytes[at + 8],
                bytes[at + 9],
                bytes[at + 10],
                bytes[at + 11],
            ])),
        )
    }

    /// Materialize the cell at `index`.
    fn character(&self, index: usize, blocks: &BlockList) -> Character {
        debug_assert!(index < self.length as usize);
        let bytes = blocks.bytes(self.data.expect("non-empty line has storage"));

        let runs = usize::from(self.run_count);
        let mut pos = 0;
        while pos + 1 < runs {
            let (next_start, ..) = self.run(bytes, pos + 1);
            if index < next_start {
                break;
            }
            pos += 1;
        }
        let (_, rendition, foreground, background) = self.run(bytes, pos);

        let at = runs * RUN_BYTES + index * 2;
        Character {
            code: u16::from_le_bytes([bytes[at], bytes[at + 1]]),
            rendition,
            foreground,
            background,
        }
    }

    /// Materialize `out.len()` consecutive cells starting at
    /// `start_column`. The caller guarantees the range is in bounds.
    fn get_characters(&self, out: &mut [Character], start_column: usize, blocks: &BlockList) {
        debug_assert!(start_column + out.len() <= self.length as usize);
        for (i, cell) in out.iter_mut().enumerate() {
            *cell = self.character(start_column + i, blocks);
        }
    }

    /// Return the line's storage to the arena.
    fn release(self, blocks: &mut BlockList) {
        if let Some(handle) = self.data {
            blocks.deallocate(handle);
        }
    }
}

/// Bounded in-memory history store.
pub struct CompactHistoryScroll {
    lines: VecDeque<CompactLine>,
    blocks: BlockList,
    max_line_count: usize,
}

impl CompactHistoryScroll {
    /// Create a store that keeps at most `max_line_count` lines.
    #[must_use]
    pub fn new(max_line_count: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            blocks: BlockList::new(),
            max_line_count,
        }
    }

    /// Line cap currently in force.
    #[must_use]
    pub fn max_line_count(&self) -> usize {
        self.max_line_count
    }

    fn evict_over_cap(&mut self) {
        while self.lines.len() > self.max_line_count {
            if let Some(oldest) = self.lines.pop_front() {
                oldest.release(&mut self.blocks);
            }
        }
    }

    #[cfg(test)]
    fn arena_block_count(&self) -> usize {
        self.blocks.block_count()
    }
}

impl HistoryScroll for CompactHistoryScroll {
    fn history_type(&self) -> HistoryType {
        HistoryType::Compact {
            max_lines: self.max_line_count,
        }
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line_len(&mut self, line: usize) -> usize {
        debug_assert!(line < self.lines.len());
        self.lines.get(line).map_or(0, |l| l.length as usize)
    }

    fn is_wrapped_line(&mut self, line: usize) -> bool {
        debug_assert!(line < self.lines.len());
        self.lines.get(line).is_some_and(|l| l.wrapped)
    }

    fn get_cells(&mut self, line: usize, start_column: usize, out: &mut [Character]) {
        if out.is_empty() {
            return;
        }
        debug_assert!(line < self.lines.len());
        if let Some(l) = self.lines.get(line) {
            l.get_characters(out, start_column, &self.blocks);
        }
    }

    fn add_cells(&mut self, cells: &[Character]) {
        let line = CompactLine::new(cells, &mut self.blocks);
        self.lines.push_back(line);
        self.evict_over_cap();
    }

    fn add_line(&mut self, previous_wrapped: bool) {
        // The producer commits the line at add_cells time; this call only
        // stamps the wrap flag on it.
        debug_assert!(!self.lines.is_empty());
        if let Some(last) = self.lines.back_mut() {
            last.wrapped = previous_wrapped;
        }
    }

    fn set_max_line_count(&mut self, max_lines: usize) {
        self.max_line_count = max_lines;
        self.evict_over_cap();
    }
}
