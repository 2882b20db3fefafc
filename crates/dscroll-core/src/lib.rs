//! Terminal scrollback core.
//!
//! This crate is the storage-and-viewing subsystem of a terminal
//! emulator: it keeps an append-only, cell-addressable history of output
//! lines and exposes a movable window over the combined
//! `history + live screen` line space.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐ add_cells/add_line ┌──────────────────────────────┐
//! │   Screen   │ ──────────────────▶│ HistoryScroll                │
//! │ (external) │                    │  ├─ NoneHistoryScroll        │
//! └────────────┘                    │  ├─ FileHistoryScroll        │
//!       ▲                           │  │   └─ CellFile x3 (mmap)   │
//!       │ image / properties /      │  └─ CompactHistoryScroll     │
//!       │ selection queries         │      └─ BlockList arena      │
//! ┌────────────┐                    └──────────────────────────────┘
//! │ScreenWindow│ ── signals ──▶ presentation layer
//! └────────────┘
//! ```
//!
//! The [`Screen`](screen::Screen) collaborator (parser, cursor, live
//! grid) lives above this crate; the window consumes it through a
//! capability trait. History storage is pluggable through
//! [`HistoryType`](history::HistoryType), which also migrates content
//! when a session is reconfigured.
//!
//! All of this runs single-threaded on the session's event thread; the
//! only blocking is bounded local file I/O inside the disk-backed store.

pub mod character;
pub mod history;
pub mod screen;
pub mod signal;
pub mod window;

pub use character::{Character, LineProperty, PackedColor, Rendition, CELL_BYTES};
pub use history::{
    CellFile, CompactHistoryScroll, FileHistoryScroll, HistoryScroll, HistoryType,
    NoneHistoryScroll,
};
pub use screen::{fill_with_default_char, DecodingOptions, Rect, Screen};
pub use signal::{SignalBus, SignalKind, WindowSignal};
pub use window::{RelativeScrollMode, ScreenWindow};
