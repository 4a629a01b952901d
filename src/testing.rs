//! Deterministic font backend for tests that must not depend on system fonts.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::{
    font_system::{FontBackend, GlyphMetrics, LineMetrics, RasterMetrics},
    text::{GlyphId, ImageSource, TextStyle},
};

/// Monospace metrics proportional to the font size.
///
/// Every glyph advances by half the font size. Ascent is 0.8 and descent 0.2
/// of the size. Non-whitespace glyphs rasterize to a solid box standing on
/// the baseline, one advance wide and one ascent tall.
pub struct FixedMetrics;

impl FixedMetrics {
    pub const ADVANCE: f32 = 0.5;
    pub const ASCENT: f32 = 0.8;
    pub const DESCENT: f32 = 0.2;

    fn is_blank(glyph_index: u16) -> bool {
        glyph_index == ' ' as u16 || glyph_index == '\t' as u16
    }
}

impl FontBackend for FixedMetrics {
    fn line_metrics(&self, _font_id: fontdb::ID, font_size: f32) -> Option<LineMetrics> {
        Some(LineMetrics {
            ascent: font_size * Self::ASCENT,
            descent: font_size * Self::DESCENT,
            line_gap: 0.0,
        })
    }

    fn glyph_metrics(
        &self,
        _font_id: fontdb::ID,
        font_size: f32,
        ch: char,
    ) -> Option<GlyphMetrics> {
        let glyph_index = ch as u32 as u16;
        let advance = font_size * Self::ADVANCE;
        Some(GlyphMetrics {
            glyph_index,
            advance,
            ink_right: if Self::is_blank(glyph_index) {
                0.0
            } else {
                advance
            },
        })
    }

    fn raster_metrics(&self, glyph: GlyphId) -> Option<RasterMetrics> {
        if Self::is_blank(glyph.glyph_index()) {
            return Some(RasterMetrics {
                xmin: 0,
                ymin: 0,
                width: 0,
                height: 0,
            });
        }
        let size = glyph.font_size();
        Some(RasterMetrics {
            xmin: 0,
            ymin: 0,
            width: (size * Self::ADVANCE).round() as usize,
            height: (size * Self::ASCENT).round() as usize,
        })
    }

    fn rasterize(&self, glyph: GlyphId) -> Option<(RasterMetrics, Vec<u8>)> {
        let metrics = self.raster_metrics(glyph)?;
        Some((metrics, vec![255; metrics.width * metrics.height]))
    }
}

pub fn backend() -> Arc<dyn FontBackend> {
    Arc::new(FixedMetrics)
}

/// Size-20 style: 10 units per glyph, ascent 16, descent 4.
pub fn style() -> TextStyle {
    TextStyle::new(fontdb::ID::dummy(), 20.0)
}

pub fn solid_image(width: u32, height: u32, color: [u8; 4]) -> ImageSource {
    ImageSource::from_rgba(RgbaImage::from_pixel(width, height, Rgba(color)))
}
