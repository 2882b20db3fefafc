//! The live-screen collaborator consumed by the view window.
//!
//! The screen itself (cursor state, escape handling, the selection
//! primitive) lives above this crate; the window only needs the
//! capability set below. Line arguments are *global* indices over the
//! combined `history + live screen` space: lines `0..hist_lines()` are
//! history, the rest is the live grid.

use crate::character::{Character, LineProperty};

bitflags::bitflags! {
    /// Options for decoding selected text.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct DecodingOptions: u32 {
        /// Keep hard line breaks instead of joining wrapped lines.
        const PRESERVE_LINE_BREAKS     = 1 << 0;
        /// Strip leading whitespace from each decoded line.
        const TRIM_LEADING_WHITESPACE  = 1 << 1;
        /// Strip trailing whitespace from each decoded line.
        const TRIM_TRAILING_WHITESPACE = 1 << 2;
        /// Emit HTML instead of plain text.
        const CONVERT_TO_HTML          = 1 << 3;
    }
}

/// Axis-aligned cell rectangle, used for damage hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Capability set the view window needs from the live screen.
pub trait Screen {
    /// Width of the live grid in columns.
    fn columns(&self) -> i32;

    /// Height of the live grid in lines.
    fn lines(&self) -> i32;

    /// Lines currently held in history.
    fn hist_lines(&self) -> i32;

    /// Combined line count before the resize now in progress.
    fn old_total_lines(&self) -> i32;

    /// Whether a resize is pending acknowledgement.
    fn is_resize(&self) -> bool;

    /// Cursor column within the live grid.
    fn cursor_x(&self) -> i32;

    /// Cursor line within the live grid.
    fn cursor_y(&self) -> i32;

    /// Fill `out` with the cells of global lines `from..=to`.
    fn image(&self, out: &mut [Character], from: i32, to: i32);

    /// Line properties for global lines `from..=to` (inclusive).
    fn line_properties(&self, from: i32, to: i32) -> Vec<LineProperty>;

    /// Begin a selection at a global position.
    fn set_selection_start(&mut self, column: i32, line: i32, column_mode: bool);

    /// Extend the selection to a global position.
    fn set_selection_end(&mut self, column: i32, line: i32, trim_trailing_whitespace: bool);

    /// Selection anchor as `(column, global line)`.
    fn selection_start(&self) -> (i32, i32);

    /// Selection end as `(column, global line)`.
    fn selection_end(&self) -> (i32, i32);

    /// Drop the selection.
    fn clear_selection(&mut self);

    /// Whether the cell at a global position is selected.
    fn is_selected(&self, column: i32, line: i32) -> bool;

    /// Decode the selected region to text.
    fn selected_text(&self, options: DecodingOptions) -> String;

    /// Lines the live grid scrolled since the last output notification.
    fn scrolled_lines(&self) -> i32;

    /// Oldest history lines evicted since the last output notification.
    fn dropped_lines(&self) -> i32;

    /// The band the last scroll moved, for damage-minimal redraw.
    fn last_scrolled_region(&self) -> Rect;

    /// Whether the shell integration reports prompt boundaries.
    fn has_repl(&self) -> bool;
}

/// Fill `out` with the default blank cell.
///
/// Used for window area that looks past the end of output.
pub fn fill_with_default_char(out: &mut [Character]) {
    out.fill(Character::DEFAULT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fill_blanks_every_cell() {
        let mut buf = vec![Character::from_code(b'x' as u16); 6];
        fill_with_default_char(&mut buf);
        assert!(buf.iter().all(|c| *c == Character::DEFAULT));
    }
}
