//! Cell-level data model for history storage and windowing.
//!
//! ## Design
//!
//! A [`Character`] is one terminal glyph position: a UTF-16 code unit plus
//! its *format* (rendition flags and packed colors). Characters are plain
//! value objects; the history stores serialize them with a fixed 12-byte
//! little-endian layout so that the disk-backed store can read cells back
//! bitwise.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ code (2 bytes)     - UTF-16 code unit        │
//! │                      (non-BMP as surrogate   │
//! │                       pairs in two cells)    │
//! ├──────────────────────────────────────────────┤
//! │ rendition (2 bytes)- attribute flags         │
//! ├──────────────────────────────────────────────┤
//! │ foreground (4)     - packed color            │
//! ├──────────────────────────────────────────────┤
//! │ background (4)     - packed color            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The compact store compresses runs of cells that share a format, so
//! format equality ([`Character::same_format`]) deliberately ignores the
//! code unit.

bitflags::bitflags! {
    /// Visual attribute flags for a cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct Rendition: u16 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const BLINK         = 1 << 4;
        const REVERSE       = 1 << 5;
        const CONCEAL       = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
        const OVERLINE      = 1 << 8;
    }
}

bitflags::bitflags! {
    /// Per-line metadata flags.
    ///
    /// `WRAPPED` marks a soft-wrap continuation into the next line;
    /// `PROMPT_START` anchors a shell prompt for prompt-granular scrolling.
    /// Remaining bits are carried opaquely for the presentation layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct LineProperty: u8 {
        /// Line was soft-wrapped into the next one.
        const WRAPPED      = 1 << 0;
        /// First line of a shell prompt.
        const PROMPT_START = 1 << 1;
        /// First line of command output.
        const OUTPUT_START = 1 << 2;
    }
}

impl LineProperty {
    /// Check the soft-wrap continuation flag.
    #[must_use]
    #[inline]
    pub const fn is_wrapped(&self) -> bool {
        self.contains(Self::WRAPPED)
    }

    /// Check the shell-prompt anchor flag.
    #[must_use]
    #[inline]
    pub const fn is_prompt_start(&self) -> bool {
        self.contains(Self::PROMPT_START)
    }
}

/// Packed terminal color.
///
/// Format: `0xTT_RRGGBB` where `TT` is the type:
/// - `0xFF______`: default (palette decides)
/// - `0x00____II`: indexed color (`II` = index 0-255)
/// - `0x01RRGGBB`: true color RGB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PackedColor(pub u32);

impl PackedColor {
    const TYPE_SHIFT: u32 = 24;
    const TYPE_DEFAULT: u32 = 0xFF;
    const TYPE_INDEXED: u32 = 0x00;
    const TYPE_RGB: u32 = 0x01;

    /// The default (unset) color.
    pub const DEFAULT: Self = Self(Self::TYPE_DEFAULT << Self::TYPE_SHIFT);

    /// Create an indexed color (0-255 palette slot).
    #[must_use]
    #[inline]
    pub const fn indexed(index: u8) -> Self {
        Self((Self::TYPE_INDEXED << Self::TYPE_SHIFT) | index as u32)
    }

    /// Create a true-color RGB value.
    #[must_use]
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self((Self::TYPE_RGB << Self::TYPE_SHIFT) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Check whether this is the default color.
    #[must_use]
    #[inline]
    pub const fn is_default(&self) -> bool {
        (self.0 >> Self::TYPE_SHIFT) == Self::TYPE_DEFAULT
    }

    /// Check whether this is an indexed color.
    #[must_use]
    #[inline]
    pub const fn is_indexed(&self) -> bool {
        (self.0 >> Self::TYPE_SHIFT) == Self::TYPE_INDEXED
    }

    /// Check whether this is a true-color value.
    #[must_use]
    #[inline]
    pub const fn is_rgb(&self) -> bool {
        (self.0 >> Self::TYPE_SHIFT) == Self::TYPE_RGB
    }

    /// Palette index (only meaningful when `is_indexed()`).
    #[must_use]
    #[inline]
    pub const fn index(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

/// One terminal glyph position: a code unit plus its format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character {
    /// UTF-16 code unit. Supplementary-plane text occupies two adjacent
    /// cells as a surrogate pair.
    pub code: u16,
    /// Attribute flags.
    pub rendition: Rendition,
    /// Foreground color.
    pub foreground: PackedColor,
    /// Background color.
    pub background: PackedColor,
}

impl Default for Character {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Serialized size of one cell.
pub const CELL_BYTES: usize = 12;

impl Character {
    /// The blank cell used to fill window area past the end of output.
    pub const DEFAULT: Self = Self {
        code: b' ' as u16,
        rendition: Rendition::empty(),
        foreground: PackedColor::DEFAULT,
        background: PackedColor::DEFAULT,
    };

    /// Create an unstyled cell for a BMP code point.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        Self {
            code,
            ..Self::DEFAULT
        }
    }

    /// Compare formats only (rendition and colors), ignoring the code unit.
    ///
    /// This is the equality the compact store's run-length encoding is
    /// built on: a new format run starts exactly where this returns false.
    #[must_use]
    #[inline]
    pub fn same_format(&self, other: &Self) -> bool {
        self.rendition == other.rendition
            && self.foreground == other.foreground
            && self.background == other.background
    }

    /// Serialize into a fixed little-endian cell record.
    #[inline]
    pub fn write_to(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.code.to_le_bytes());
        out[2..4].copy_from_slice(&self.rendition.bits().to_le_bytes());
        out[4..8].copy_from_slice(&self.foreground.0.to_le_bytes());
        out[8..12].copy_from_slice(&self.background.0.to_le_bytes());
    }

    /// Deserialize from a fixed little-endian cell record.
    #[must_use]
    #[inline]
    pub fn read_from(data: &[u8]) -> Self {
        Self {
            code: u16::from_le_bytes([data[0], data[1]]),
            rendition: Rendition::from_bits_truncate(u16::from_le_bytes([data[2], data[3]])),
            foreground: PackedColor(u32::from_le_bytes([data[4], data[5], data[6], data[7]])),
            background: PackedColor(u32::from_le_bytes([data[8], data[9], data[10], data[11]])),
        }
    }
}

// Wire and in-memory layouts coincide; the disk-backed store sizes its
// reads from this.
const _: () = assert!(std::mem::size_of::<Character>() == CELL_BYTES);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_color_kinds() {
        assert!(PackedColor::DEFAULT.is_default());

        let indexed = PackedColor::indexed(7);
        assert!(indexed.is_indexed());
        assert!(!indexed.is_default());
        assert_eq!(indexed.index(), 7);

        let rgb = PackedColor::rgb(0x12, 0x34, 0x56);
        assert!(rgb.is_rgb());
        assert_eq!(rgb.0 & 0x00FF_FFFF, 0x0012_3456);
    }

    #[test]
    fn format_equality_ignores_code() {
        let a = Character::from_code(b'a' as u16);
        let b = Character::from_code(b'b' as u16);
        assert!(a.same_format(&b));

        let mut bold = b;
        bold.rendition = Rendition::BOLD;
        assert!(!a.same_format(&bold));

        let mut red = b;
        red.foreground = PackedColor::indexed(1);
        assert!(!a.same_format(&red));
    }

    #[test]
    fn cell_wire_roundtrip() {
        let cell = Character {
            code: 0x30C6, // テ
            rendition: Rendition::BOLD | Rendition::UNDERLINE,
            foreground: PackedColor::rgb(255, 128, 0),
            background: PackedColor::indexed(4),
        };
        let mut buf = [0u8; CELL_BYTES];
        cell.write_to(&mut buf);
        assert_eq!(Character::read_from(&buf), cell);
    }

    #[test]
    fn default_cell_is_blank() {
        let cell = Character::DEFAULT;
        assert_eq!(cell.code, b' ' as u16);
        assert!(cell.rendition.is_empty());
        assert!(cell.foreground.is_default());
        assert!(cell.background.is_default());
    }

    #[test]
    fn line_property_accessors() {
        let prop = LineProperty::WRAPPED | LineProperty::PROMPT_START;
        assert!(prop.is_wrapped());
        assert!(prop.is_prompt_start());
        assert!(!LineProperty::default().is_wrapped());
    }
}
