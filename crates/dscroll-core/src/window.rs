//! A movable window onto the combined history + live screen space.
//!
//! ## Design
//!
//! The presentation layer never touches the screen or the history stores
//! directly; it looks through a [`ScreenWindow`] of fixed line height. The
//! window materializes an image of exactly `window_lines x columns` cells
//! on demand, translates selection coordinates between window-local and
//! global space, implements line/page/prompt scrolling, and either tracks
//! new output (following the bottom of the screen) or holds its visual
//! anchor steady while bounded history drops old lines underneath it.
//!
//! The image is cached and invalidated by any scroll, selection change,
//! resize, or output notification; the next materialization refills it
//! and blank-fills whatever part of the window looks past the end of
//! output.
//!
//! Everything here runs on the session's event thread. Change
//! notifications go out through the [`SignalBus`] synchronously, at the
//! end of the operation that caused them.

use std::cell::RefCell;
use std::cmp::{max, min};
use std::rc::Rc;

use crate::character::{Character, LineProperty};
use crate::screen::{fill_with_default_char, DecodingOptions, Rect, Screen};
use crate::signal::{SignalBus, SignalKind, WindowSignal};

/// Units for [`ScreenWindow::scroll_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeScrollMode {
    /// Scroll by single lines.
    Lines,
    /// Scroll by half or full pages.
    Pages,
    /// Scroll between shell prompts (falls back to pages without REPL
    /// integration).
    Prompts,
}

/// Movable view of fixed line height over `history + live screen`.
///
/// Line coordinates in the public API are window-local unless a method
/// says otherwise; internally everything is translated to the global
/// space, where lines `0..hist_lines` are history and the rest is the
/// live grid.
pub struct ScreenWindow {
    screen: Rc<RefCell<dyn Screen>>,
    window_buffer: Vec<Character>,
    buffer_needs_update: bool,
    window_lines: i32,
    /// Stored anchor. May sit transiently outside the valid range between
    /// operations; [`Self::current_line`] clamps at read time.
    current_line: i32,
    current_result_line: i32,
    track_output: bool,
    scroll_count: i32,
    signals: SignalBus,
}

impl ScreenWindow {
    /// Create a one-line window tracking the bottom of `screen`.
    #[must_use]
    pub fn new(screen: Rc<RefCell<dyn Screen>>) -> Self {
        Self {
            screen,
            window_buffer: Vec::new(),
            buffer_needs_update: true,
            window_lines: 1,
            current_line: 0,
            current_result_line: -1,
            track_output: true,
            scroll_count: 0,
            signals: SignalBus::new(),
        }
    }

    /// Point the window at a different screen.
    ///
    /// Emits `ScreenAboutToChange` before the switch; a no-op when handed
    /// the screen already in use.
    pub fn set_screen(&mut self, screen: Rc<RefCell<dyn Screen>>) {
        if Rc::ptr_eq(&self.screen, &screen) {
            return;
        }
        self.signals.emit(WindowSignal::ScreenAboutToChange);
        self.screen = screen;
    }

    /// The screen this window views.
    #[must_use]
    pub fn screen(&self) -> Rc<RefCell<dyn Screen>> {
        Rc::clone(&self.screen)
    }

    /// Register a handler for one of the window's signals.
    pub fn subscribe(&mut self, kind: SignalKind, handler: impl FnMut(&WindowSignal) + 'static) {
        self.signals.subscribe(kind, handler);
    }

    /// Materialize the visible image.
    ///
    /// Returns the cached buffer when nothing changed since the last
    /// call; otherwise asks the screen for the window's line range and
    /// blank-fills any suffix that looks past the end of output.
    pub fn image(&mut self) -> &[Character] {
        // Reallocate when the window geometry changed since the last
        // materialization.
        let size = (self.window_lines * self.window_columns()) as usize;
        if self.window_buffer.len() != size {
            self.window_buffer = vec![Character::DEFAULT; size];
            self.buffer_needs_update = true;
        }

        if !self.buffer_needs_update {
            return &self.window_buffer;
        }

        let from = self.current_line();
        let to = self.end_window_line();
        self.screen.borrow().image(&mut self.window_buffer, from, to);
        self.fill_unused_area();

        self.buffer_needs_update = false;
        &self.window_buffer
    }

    /// Blank-fill the part of the window past the last line of output.
    fn fill_unused_area(&mut self) {
        let screen_end_line = self.line_count() - 1;
        let window_end_line = self.current_line() + self.window_lines - 1;

        let unused_lines = window_end_line - screen_end_line;
        if unused_lines <= 0 {
            return;
        }

        let chars_to_fill = (unused_lines * self.window_columns()) as usize;
        let filled = self.window_buffer.len();
        fill_with_default_char(&mut self.window_buffer[filled - chars_to_fill..]);
    }

    /// Global index of the window's last line, capped at the last line of
    /// output. Line arguments handed to the screen never exceed this.
    fn end_window_line(&self) -> i32 {
        min(self.current_line() + self.window_lines - 1, self.line_count() - 1)
    }

    /// Properties of the visible lines, padded with defaults when the
    /// window looks past the end of output.
    #[must_use]
    pub fn line_properties(&self) -> Vec<LineProperty> {
        let mut result = self
            .screen
            .borrow()
            .line_properties(self.current_line(), self.end_window_line());
        result.resize(self.window_lines as usize, LineProperty::default());
        result
    }

    /// Decode the selected region to text.
    #[must_use]
    pub fn selected_text(&self, options: DecodingOptions) -> String {
        self.screen.borrow().selected_text(options)
    }

    /// Selection anchor in window-local coordinates.
    #[must_use]
    pub fn selection_start(&self) -> (i32, i32) {
        let (column, line) = self.screen.borrow().selection_start();
        (column, line - self.current_line())
    }

    /// Selection end in window-local coordinates.
    #[must_use]
    pub fn selection_end(&self) -> (i32, i32) {
        let (column, line) = self.screen.borrow().selection_end();
        (column, line - self.current_line())
    }

    /// Begin a selection at a window-local position.
    pub fn set_selection_start(&mut self, column: i32, line: i32, column_mode: bool) {
        let global = line + self.current_line();
        self.screen
            .borrow_mut()
            .set_selection_start(column, global, column_mode);

        self.buffer_needs_update = true;
        self.signals.emit(WindowSignal::SelectionChanged);
    }

    /// Extend the selection to a window-local position.
    pub fn set_selection_end(&mut self, column: i32, line: i32, trim_trailing_whitespace: bool) {
        let global = line + self.current_line();
        self.screen
            .borrow_mut()
            .set_selection_end(column, global, trim_trailing_whitespace);

        self.buffer_needs_update = true;
        self.signals.emit(WindowSignal::SelectionChanged);
    }

    /// Replace the selection with the full-width range of *global* lines
    /// `start..=end`.
    pub fn set_selection_by_line_range(&mut self, start: i32, end: i32) {
        self.clear_selection();

        let columns = self.window_columns();
        {
            let mut screen = self.screen.borrow_mut();
            screen.set_selection_start(0, start, false);
            screen.set_selection_end(columns, end, false);
        }

        self.buffer_needs_update = true;
        self.signals.emit(WindowSignal::SelectionChanged);
    }

    /// Whether the cell at a window-local position is selected.
    ///
    /// Queries past the bottom of the window are clamped to the last
    /// valid line rather than handed out of range to the screen.
    #[must_use]
    pub fn is_selected(&self, column: i32, line: i32) -> bool {
        let global = min(line + self.current_line(), self.end_window_line());
        self.screen.borrow().is_selected(column, global)
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        self.screen.borrow_mut().clear_selection();

        self.buffer_needs_update = true;
        self.signals.emit(WindowSignal::SelectionChanged);
    }

    /// Set the window height in lines. Must be positive.
    pub fn set_window_lines(&mut self, lines: i32) {
        debug_assert!(lines > 0);
        self.window_lines = lines;
    }

    /// Window height in lines.
    #[must_use]
    pub fn window_lines(&self) -> i32 {
        self.window_lines
    }

    /// Window width in columns (always the screen's width).
    #[must_use]
    pub fn window_columns(&self) -> i32 {
        self.screen.borrow().columns()
    }

    /// Total lines of output: history plus the live screen.
    #[must_use]
    pub fn line_count(&self) -> i32 {
        let screen = self.screen.borrow();
        screen.hist_lines() + screen.lines()
    }

    /// Width of the output in columns.
    #[must_use]
    pub fn column_count(&self) -> i32 {
        self.screen.borrow().columns()
    }

    /// Cursor position within the live grid.
    #[must_use]
    pub fn cursor_position(&self) -> (i32, i32) {
        let screen = self.screen.borrow();
        (screen.cursor_x(), screen.cursor_y())
    }

    /// Global index of the window's first line, clamped to the valid
    /// anchor range.
    #[must_use]
    pub fn current_line(&self) -> i32 {
        self.current_line
            .clamp(0, max(0, self.line_count() - self.window_lines))
    }

    /// Search-result cursor, `-1` when there is none.
    #[must_use]
    pub fn current_result_line(&self) -> i32 {
        self.current_result_line
    }

    /// Move the search-result cursor.
    pub fn set_current_result_line(&mut self, line: i32) {
        if self.current_result_line == line {
            return;
        }
        self.current_result_line = line;
        self.signals.emit(WindowSignal::CurrentResultLineChanged);
    }

    /// Scroll relative to the current position.
    pub fn scroll_by(&mut self, mode: RelativeScrollMode, amount: i32, full_page: bool) {
        match mode {
            RelativeScrollMode::Lines => self.scroll_to(self.current_line() + amount),
            RelativeScrollMode::Pages => self.scroll_pages(amount, full_page),
            RelativeScrollMode::Prompts => {
                if self.screen.borrow().has_repl() {
                    self.scroll_prompts(amount);
                } else {
                    self.scroll_pages(amount, full_page);
                }
            }
        }
    }

    fn scroll_pages(&mut self, amount: i32, full_page: bool) {
        let step = if full_page {
            self.window_lines
        } else {
            self.window_lines / 2
        };
        self.scroll_to(self.current_line() + amount * step);
    }

    /// Step line by line through the prompt anchors, `|amount|` prompts in
    /// the direction of its sign, stopping at the output boundaries.
    fn scroll_prompts(&mut self, mut amount: i32) {
        let mut line = self.current_line();
        if amount < 0 {
            let properties = self.screen.borrow().line_properties(0, self.current_line());
            while line > 0 && amount < 0 {
                line -= 1;
                if properties[line as usize].is_prompt_start() {
                    amount += 1;
                    if amount == 0 {
                        break;
                    }
                }
            }
        } else if amount > 0 {
            let current = self.current_line();
            let hist_lines = self.screen.borrow().hist_lines();
            // An anchor already below the history boundary has nothing to
            // walk through.
            if current <= hist_lines {
                let properties = self.screen.borrow().line_properties(current, hist_lines);
                while line < hist_lines && amount > 0 {
                    line += 1;
                    if properties[(line - current) as usize].is_prompt_start() {
                        amount -= 1;
                        if amount == 0 {
                            break;
                        }
                    }
                }
            }
        }
        self.scroll_to(line);
    }

    /// Whether the window shows the very end of the output.
    #[must_use]
    pub fn at_end_of_output(&self) -> bool {
        self.current_line() == self.line_count() - self.window_lines
    }

    /// Move the anchor to the global line `line`, clamped to the valid
    /// range. The signed (clamped) delta accumulates into the scroll
    /// count.
    pub fn scroll_to(&mut self, line: i32) {
        let max_current_line = self.line_count() - self.window_lines;
        let line = max(0, min(line, max_current_line));

        let delta = line - self.current_line;
        self.current_line = line;
        self.scroll_count += delta;

        self.buffer_needs_update = true;

        self.signals.emit(WindowSignal::Scrolled {
            line: self.current_line,
        });
    }

    /// Enable or disable following new output.
    pub fn set_track_output(&mut self, track_output: bool) {
        self.track_output = track_output;
    }

    /// Whether the window follows new output.
    #[must_use]
    pub fn track_output(&self) -> bool {
        self.track_output
    }

    /// Net lines scrolled since the last [`Self::reset_scroll_count`].
    #[must_use]
    pub fn scroll_count(&self) -> i32 {
        self.scroll_count
    }

    /// Zero the scroll accumulator.
    pub fn reset_scroll_count(&mut self) {
        self.scroll_count = 0;
    }

    /// The region a redraw has to cover.
    ///
    /// When the window spans the full live screen and sits at the end of
    /// output, only the band the last scroll moved needs repainting;
    /// otherwise the whole window does.
    #[must_use]
    pub fn scroll_region(&self) -> Rect {
        let (screen_lines, last_scrolled) = {
            let screen = self.screen.borrow();
            (screen.lines(), screen.last_scrolled_region())
        };
        if self.at_end_of_output() && self.window_lines == screen_lines {
            last_scrolled
        } else {
            Rect::new(0, 0, self.window_columns(), self.window_lines)
        }
    }

    /// Re-anchor after a screen resize so the same output stays visible.
    pub fn update_current_line(&mut self) {
        let (resize, old_total_lines) = {
            let screen = self.screen.borrow();
            (screen.is_resize(), screen.old_total_lines())
        };
        if !resize {
            return;
        }
        if self.current_line > 0 {
            self.current_line -= old_total_lines - self.line_count();
        }
        self.current_line = max(0, min(self.current_line, self.line_count() - self.window_lines));
        self.buffer_needs_update = true;
    }

    /// React to new output from the screen.
    ///
    /// A tracking window jumps to the bottom of the screen (overlapping
    /// into history when it is taller than the live grid) and folds the
    /// screen's own scrolling into the scroll count. A non-tracking
    /// window compensates for history lines dropped by a bounded store so
    /// its content does not appear to drift, pinned at the history/screen
    /// boundary.
    pub fn notify_output_changed(&mut self) {
        let (scrolled_lines, dropped_lines, hist_lines, screen_lines) = {
            let screen = self.screen.borrow();
            (
                screen.scrolled_lines(),
                screen.dropped_lines(),
                screen.hist_lines(),
                screen.lines(),
            )
        };

        if self.track_output {
            self.scroll_count -= scrolled_lines;
            self.current_line = max(0, hist_lines - (self.window_lines - screen_lines));
        } else {
            self.current_line = max(0, self.current_line - dropped_lines);
            self.current_line = min(self.current_line, hist_lines);
        }

        self.buffer_needs_update = true;

        self.signals.emit(WindowSignal::OutputChanged);
    }
}
