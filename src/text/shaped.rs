use std::{ops::Range, sync::Arc};

use crate::text::{attachment::AttachmentTable, buffer::Color};

/// Coordinate space of a [`ShapedLayout`].
///
/// **Y-axis goes up.** The origin is the bottom-left corner of the frame the
/// layout was shaped into, and line origins sit on their baselines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutSpace;

/// Coordinate space of the drawing surface.
///
/// **Y-axis goes down.** The origin is the top-left corner of the content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSpace;

pub type LayoutPoint = euclid::Point2D<f32, LayoutSpace>;
pub type LayoutRect = euclid::Rect<f32, LayoutSpace>;
pub type ScreenPoint = euclid::Point2D<f32, ScreenSpace>;
pub type ScreenRect = euclid::Rect<f32, ScreenSpace>;
/// Content, image and surface sizes.
pub type Size = euclid::Size2D<f32, ScreenSpace>;

pub const SUB_PIXEL_QUANTIZE: f32 = 256f32;

/// Rasterization key of a font glyph.
///
/// The same glyph is not guaranteed to receive the same `GlyphId` across program runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphId {
    font_id: fontdb::ID,
    glyph_index: u16,
    font_size: u32, // font size * SUB_PIXEL_QUANTIZE as u32
}

impl GlyphId {
    pub fn new(font_id: fontdb::ID, glyph_index: u16, font_size: f32) -> Self {
        Self {
            font_id,
            glyph_index,
            font_size: (font_size * SUB_PIXEL_QUANTIZE).round() as u32,
        }
    }

    pub fn font_id(&self) -> fontdb::ID {
        self.font_id
    }

    pub fn glyph_index(&self) -> u16 {
        self.glyph_index
    }

    pub fn font_size(&self) -> f32 {
        self.font_size as f32 / SUB_PIXEL_QUANTIZE
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GlyphKind {
    /// A glyph drawn from a font.
    Font(GlyphId),
    /// The sentinel standing in for attachment `index` of the layout's table.
    Sentinel { attachment: usize },
}

/// One positioned glyph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapedGlyph {
    /// Offset of the source character in the buffer.
    pub offset: usize,
    /// Pen position relative to the line origin.
    pub x: f32,
    pub advance: f32,
    pub kind: GlyphKind,
}

/// Consecutive glyphs sharing font, size and color, or a single sentinel.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphRun {
    /// Buffer offsets covered by the run.
    pub range: Range<usize>,
    /// Typographic ascent above the baseline.
    pub ascent: f32,
    /// Typographic descent below the baseline, as a positive distance.
    pub descent: f32,
    pub color: Color,
    pub glyphs: Vec<ShapedGlyph>,
}

impl GlyphRun {
    /// Returns the glyph produced for `offset`, if this run holds one.
    pub fn glyph_at(&self, offset: usize) -> Option<&ShapedGlyph> {
        if !self.range.contains(&offset) {
            return None;
        }
        self.glyphs.iter().find(|glyph| glyph.offset == offset)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShapedLine {
    /// Baseline origin in layout space.
    pub origin: LayoutPoint,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub runs: Vec<GlyphRun>,
}

/// Immutable result of shaping one prepared buffer at one width.
///
/// A new layout is produced for every content or width change; layouts are
/// never patched. The attachment table (and with it every sentinel metric)
/// lives exactly as long as the layouts that reference it.
#[derive(Clone, Debug)]
pub struct ShapedLayout {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) lines: Vec<ShapedLine>,
    pub(crate) attachments: Arc<AttachmentTable>,
}

impl ShapedLayout {
    /// Width the layout was shaped at.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Height of the frame the layout was shaped into.
    ///
    /// This is the content height, and it is the height every
    /// layout-to-screen conversion of this layout must use.
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[ShapedLine] {
        &self.lines
    }

    pub fn attachments(&self) -> &AttachmentTable {
        &self.attachments
    }

    /// Converts a layout-space y coordinate to screen space.
    pub fn screen_y(&self, layout_y: f32) -> f32 {
        self.height - layout_y
    }
}
