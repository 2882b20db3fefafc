//! Append-only history storage behind one pluggable contract.
//!
//! ## Design
//!
//! The live screen pushes lines that scroll off its top into a history
//! store. Three variants coexist behind [`HistoryScroll`]:
//!
//! - **disabled** ([`NoneHistoryScroll`]): drops everything;
//! - **file-backed** ([`FileHistoryScroll`]): unbounded, spills to an
//!   unlinked temp file;
//! - **compact** ([`CompactHistoryScroll`]): bounded, in-memory,
//!   format-run compressed.
//!
//! [`HistoryType`] describes the configured variant and reconfigures a
//! session's store in place, migrating content across kinds when the old
//! store has any.
//!
//! The producer contract for every variant is `add_cells(line)` followed
//! by `add_line(wrapped)`, once per logical line, in append order. All
//! operations run on the session's event thread; no store is shared.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::character::Character;

mod block_list;
pub mod cell_file;
mod compact;
mod file;

pub use cell_file::CellFile;
pub use compact::CompactHistoryScroll;
pub use file::FileHistoryScroll;

/// Cells of scratch reused while replaying lines across a migration.
/// Longer lines fall back to a one-off heap buffer.
const COPY_BUFFER_CELLS: usize = 1024;

/// Append-only, line-addressable history of terminal output.
///
/// Lines are indexed `0..line_count()`, oldest first. Read methods take
/// `&mut self`: the file-backed store's access-pattern heuristic and lazy
/// mapping update internal state on every read.
///
/// Indexing a nonexistent line is a caller bug; implementations abort in
/// debug builds and return blanks/defaults in release. Check
/// `line_count()` first.
pub trait HistoryScroll {
    /// The configuration this store was built from.
    fn history_type(&self) -> HistoryType;

    /// Whether this store retains anything at all.
    fn has_scroll(&self) -> bool {
        true
    }

    /// Number of committed lines.
    fn line_count(&self) -> usize;

    /// Cell count of `line`.
    fn line_len(&mut self, line: usize) -> usize;

    /// Whether `line` was soft-wrapped into its successor. Out-of-range
    /// indices return `false`.
    fn is_wrapped_line(&mut self, line: usize) -> bool;

    /// Copy `out.len()` cells of `line` starting at `start_column` into
    /// `out`.
    fn get_cells(&mut self, line: usize, start_column: usize, out: &mut [Character]);

    /// Append the cells of the next logical line.
    fn add_cells(&mut self, cells: &[Character]);

    /// Commit the pending line, recording its wrap flag.
    fn add_line(&mut self, previous_wrapped: bool);

    /// Adjust the line cap. Only the compact store has one; elsewhere this
    /// is a no-op.
    fn set_max_line_count(&mut self, max_lines: usize) {
        let _ = max_lines;
    }
}

/// History store with everything disabled.
///
/// The only store for which [`HistoryScroll::has_scroll`] is `false`.
#[derive(Debug, Default)]
pub struct NoneHistoryScroll;

impl NoneHistoryScroll {
    /// Create the disabled store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HistoryScroll for NoneHistoryScroll {
    fn history_type(&self) -> HistoryType {
        HistoryType::None
    }

    fn has_scroll(&self) -> bool {
        false
    }

    fn line_count(&self) -> usize {
        0
    }

    fn line_len(&mut self, _line: usize) -> usize {
        0
    }

    fn is_wrapped_line(&mut self, _line: usize) -> bool {
        false
    }

    fn get_cells(&mut self, _line: usize, _start_column: usize, _out: &mut [Character]) {}

    fn add_cells(&mut self, _cells: &[Character]) {}

    fn add_line(&mut self, _previous_wrapped: bool) {}
}

/// Configured history variant; the session's reconfigurator.
///
/// The profile layer persists these, so the variants are serde-friendly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryType {
    /// History disabled.
    None,
    /// Unbounded, disk-backed.
    File,
    /// Bounded in-memory compact storage.
    Compact {
        /// Largest number of lines retained.
        max_lines: usize,
    },
}

impl HistoryType {
    /// Whether this configuration retains any history.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Line cap: `None` means unlimited, `Some(0)` disabled, `Some(n)` a
    /// bounded store keeping `n` lines.
    #[must_use]
    pub fn maximum_line_count(&self) -> Option<usize> {
        match self {
            Self::None => Some(0),
            Self::File => None,
            Self::Compact { max_lines } => Some(*max_lines),
        }
    }

    /// Produce a store matching this configuration, reusing or migrating
    /// `old` where possible.
    ///
    /// A store of the requested kind is adjusted in place and returned.
    /// Otherwise a fresh store is built and every old line is replayed
    /// into it, wrap flags included; migrating to `None` discards content
    /// and migrating to a bounded store keeps only the newest lines.
    ///
    /// Callers must drain the screen's pending scroll-off before
    /// reconfiguring; migration must not observe output mid-flight.
    #[must_use]
    pub fn scroll(&self, old: Option<Box<dyn HistoryScroll>>) -> Box<dyn HistoryScroll> {
        match self {
            Self::None => Box::new(NoneHistoryScroll::new()),
            Self::File => {
                if let Some(old) = old {
                    if old.history_type() == Self::File {
                        return old;
                    }
                    let mut new = match FileHistoryScroll::new() {
                        Ok(store) => Box::new(store),
                        Err(err) => {
                            warn!("could not create history files, disabling history: {err}");
                            return Box::new(NoneHistoryScroll::new());
                        }
                    };
                    copy_lines(old, new.as_mut());
                    new
                } else {
                    match FileHistoryScroll::new() {
                        Ok(store) => Box::new(store),
                        Err(err) => {
                            warn!("could not create history files, disabling history: {err}");
                            Box::new(NoneHistoryScroll::new())
                        }
                    }
                }
            }
            Self::Compact { max_lines } => {
                if let Some(mut old) = old {
                    if matches!(old.history_type(), Self::Compact { .. }) {
                        old.set_max_line_count(*max_lines);
                        return old;
                    }
                    let mut new = Box::new(CompactHistoryScroll::new(*max_lines));
                    copy_lines(old, new.as_mut());
                    new
                } else {
                    Box::new(CompactHistoryScroll::new(*max_lines))
                }
            }
        }
    }
}

/// Replay every line of `old` into `new`, preserving wrap flags.
fn copy_lines(mut old: Box<dyn HistoryScroll>, new: &mut dyn HistoryScroll) {
    let mut buffer = vec![Character::DEFAULT; COPY_BUFFER_CELLS];
    let lines = old.line_count();
    for line in 0..lines {
        let len = old.line_len(line);
        if len > buffer.len() {
            let mut long = vec![Character::DEFAULT; len];
            old.get_cells(line, 0, &mut long);
            new.add_cells(&long);
        } else {
            old.get_cells(line, 0, &mut buffer[..len]);
            new.add_cells(&buffer[..len]);
        }
        new.add_line(old.is_wrapped_line(line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells_of(text: &str) -> Vec<Character> {
        text.chars().map(|c| Character::from_code(c as u16)).collect()
    }

    fn text_of(store: &mut dyn HistoryScroll, line: usize) -> String {
        let len = store.line_len(line);
        let mut out = vec![Character::DEFAULT; len];
        store.get_cells(line, 0, &mut out);
        out.iter()
            .map(|c| char::from_u32(u32::from(c.code)).unwrap())
            .collect()
    }

    fn filled(ty: HistoryType, texts: &[&str]) -> Box<dyn HistoryScroll> {
        let mut store = ty.scroll(None);
        for text in texts {
            store.add_cells(&cells_of(text));
            store.add_line(false);
        }
        store
    }

    #[test]
    fn none_store_drops_everything() {
        let mut store = NoneHistoryScroll::new();
        store.add_cells(&cells_of("ignored"));
        store.add_line(true);

        assert!(!store.has_scroll());
        assert_eq!(store.line_count(), 0);
        assert!(!store.is_wrapped_line(0));
    }

    #[test]
    fn type_queries() {
        assert!(!HistoryType::None.is_enabled());
        assert!(HistoryType::File.is_enabled());
        assert!(HistoryType::Compact { max_lines: 5 }.is_enabled());

        assert_eq!(HistoryType::None.maximum_line_count(), Some(0));
        assert_eq!(HistoryType::File.maximum_line_count(), None);
        assert_eq!(
            HistoryType::Compact { max_lines: 5 }.maximum_line_count(),
            Some(5)
        );
    }

    #[test]
    fn fresh_stores_match_their_type() {
        assert_eq!(
            HistoryType::None.scroll(None).history_type(),
            HistoryType::None
        );
        assert_eq!(
            HistoryType::File.scroll(None).history_type(),
            HistoryType::File
        );
        assert_eq!(
            HistoryType::Compact { max_lines: 3 }.scroll(None).history_type(),
            HistoryType::Compact { max_lines: 3 }
        );
    }

    #[test]
    fn file_to_file_is_reused_unchanged() {
        let old = filled(HistoryType::File, &["keep me"]);
        let mut new = HistoryType::File.scroll(Some(old));
        assert_eq!(new.line_count(), 1);
        assert_eq!(text_of(new.as_mut(), 0), "keep me");
    }

    #[test]
    fn compact_to_compact_adjusts_cap_in_place() {
        let old = filled(HistoryType::Compact { max_lines: 10 }, &["a", "b", "c"]);
        let mut new = HistoryType::Compact { max_lines: 2 }.scroll(Some(old));

        assert_eq!(
            new.history_type(),
            HistoryType::Compact { max_lines: 2 }
        );
        assert_eq!(new.line_count(), 2);
        assert_eq!(text_of(new.as_mut(), 0), "b");
        assert_eq!(text_of(new.as_mut(), 1), "c");
    }

    #[test]
    fn file_to_compact_keeps_newest_tail() {
        let old = filled(HistoryType::File, &["0", "1", "2", "3", "4"]);
        let mut new = HistoryType::Compact { max_lines: 2 }.scroll(Some(old));

        assert_eq!(new.line_count(), 2);
        assert_eq!(text_of(new.as_mut(), 0), "3");
        assert_eq!(text_of(new.as_mut(), 1), "4");
    }

    #[test]
    fn compact_to_file_replays_all_lines_and_flags() {
        let mut old = HistoryType::Compact { max_lines: 10 }.scroll(None);
        old.add_cells(&cells_of("first"));
        old.add_line(true);
        old.add_cells(&cells_of("second"));
        old.add_line(false);

        let mut new = HistoryType::File.scroll(Some(old));
        assert_eq!(new.line_count(), 2);
        assert_eq!(text_of(new.as_mut(), 0), "first");
        assert_eq!(text_of(new.as_mut(), 1), "second");
        assert!(new.is_wrapped_line(0));
        assert!(!new.is_wrapped_line(1));
    }

    #[test]
    fn migration_to_none_discards_content() {
        let old = filled(HistoryType::Compact { max_lines: 10 }, &["gone"]);
        let new = HistoryType::None.scroll(Some(old));
        assert_eq!(new.line_count(), 0);
        assert!(!new.has_scroll());
    }

    #[test]
    fn migration_copies_lines_longer_than_the_scratch_buffer() {
        let long: String = "x".repeat(COPY_BUFFER_CELLS + 37);
        let old = filled(HistoryType::Compact { max_lines: 4 }, &[&long, "short"]);

        let mut new = HistoryType::File.scroll(Some(old));
        assert_eq!(new.line_count(), 2);
        assert_eq!(new.line_len(0), COPY_BUFFER_CELLS + 37);
        assert_eq!(text_of(new.as_mut(), 1), "short");
    }

    #[test]
    fn history_type_serde_round_trip() {
        for ty in [
            HistoryType::None,
            HistoryType::File,
            HistoryType::Compact { max_lines: 1000 },
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            let back: HistoryType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ty);
        }
    }
}
