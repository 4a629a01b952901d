use std::{path::PathBuf, sync::Arc};

use parking_lot::Mutex;

use crate::{error::LabelError, font_storage::FontStorage, text::GlyphId};

/// Vertical metrics of a font at a given size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    /// Distance below the baseline, positive.
    pub descent: f32,
    pub line_gap: f32,
}

/// Horizontal metrics of a single character.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphMetrics {
    pub glyph_index: u16,
    /// Pen advance to the next glyph.
    pub advance: f32,
    /// Right edge of the inked area relative to the pen position.
    pub ink_right: f32,
}

/// Bitmap placement of a rasterized glyph.
///
/// `xmin` is the offset from the pen position, `ymin` the offset of the
/// bitmap's bottom edge from the baseline (positive is up).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterMetrics {
    pub xmin: i32,
    pub ymin: i32,
    pub width: usize,
    pub height: usize,
}

/// Font services needed by shaping and drawing.
///
/// Implementations must be usable from the layout worker and the
/// presentation thread at the same time; every method takes `&self`.
pub trait FontBackend: Send + Sync {
    /// Returns `None` when the font is unknown or unusable.
    fn line_metrics(&self, font_id: fontdb::ID, font_size: f32) -> Option<LineMetrics>;

    fn glyph_metrics(&self, font_id: fontdb::ID, font_size: f32, ch: char)
    -> Option<GlyphMetrics>;

    /// Kerning adjustment between two glyphs of the same font and size.
    fn kerning(&self, _font_id: fontdb::ID, _font_size: f32, _left: u16, _right: u16) -> f32 {
        0.0
    }

    fn raster_metrics(&self, glyph: GlyphId) -> Option<RasterMetrics>;

    /// Rasterizes a glyph to 8-bit coverage, row-major, top row first.
    fn rasterize(&self, glyph: GlyphId) -> Option<(RasterMetrics, Vec<u8>)>;
}

/// Thread-safe entry point to the fonts known to the label.
///
/// The storage lock is only held while a face is looked up; metric queries
/// and rasterization run on the shared `Arc<fontdue::Font>` outside of it, so
/// a layout pass on the worker never blocks drawing for longer than a lookup.
pub struct FontSystem {
    /// The underlying font storage.
    pub font_storage: Mutex<FontStorage>,
}

impl Default for FontSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FontSystem {
    pub fn new() -> Self {
        Self {
            font_storage: Mutex::new(FontStorage::new()),
        }
    }

    pub fn load_system_fonts(&self) {
        self.font_storage.lock().load_system_fonts();
    }

    pub fn load_font_binary(&self, data: impl Into<Vec<u8>>) {
        self.font_storage.lock().load_font_binary(data);
    }

    pub fn load_font_file(&self, path: PathBuf) -> Result<(), LabelError> {
        self.font_storage.lock().load_font_file(path)?;
        Ok(())
    }

    pub fn load_fonts_dir(&self, dir: PathBuf) {
        self.font_storage.lock().load_fonts_dir(dir)
    }

    pub fn is_empty(&self) -> bool {
        self.font_storage.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.font_storage.lock().len()
    }

    /// Resolves a query to a face id.
    pub fn query(&self, query: &fontdb::Query) -> Option<fontdb::ID> {
        self.font_storage.lock().query(query).map(|(id, _)| id)
    }

    /// Returns the id of any loaded face.
    ///
    /// # Performance
    /// Walks the face list under the storage lock.
    pub fn first_face(&self) -> Option<fontdb::ID> {
        self.font_storage.lock().faces().next().map(|face| face.id)
    }

    fn font(&self, id: fontdb::ID) -> Option<Arc<fontdue::Font>> {
        self.font_storage.lock().font(id)
    }
}

impl FontBackend for FontSystem {
    fn line_metrics(&self, font_id: fontdb::ID, font_size: f32) -> Option<LineMetrics> {
        let metrics = self.font(font_id)?.horizontal_line_metrics(font_size)?;
        Some(LineMetrics {
            ascent: metrics.ascent,
            // fontdue reports the descent as a negative offset.
            descent: -metrics.descent,
            line_gap: metrics.line_gap,
        })
    }

    fn glyph_metrics(
        &self,
        font_id: fontdb::ID,
        font_size: f32,
        ch: char,
    ) -> Option<GlyphMetrics> {
        let font = self.font(font_id)?;
        let glyph_index = font.lookup_glyph_index(ch);
        let metrics = font.metrics_indexed(glyph_index, font_size);
        Some(GlyphMetrics {
            glyph_index,
            advance: metrics.advance_width,
            ink_right: metrics.xmin as f32 + metrics.width as f32,
        })
    }

    fn kerning(&self, font_id: fontdb::ID, font_size: f32, left: u16, right: u16) -> f32 {
        self.font(font_id)
            .and_then(|font| font.horizontal_kern_indexed(left, right, font_size))
            .unwrap_or(0.0)
    }

    fn raster_metrics(&self, glyph: GlyphId) -> Option<RasterMetrics> {
        let font = self.font(glyph.font_id())?;
        let metrics = font.metrics_indexed(glyph.glyph_index(), glyph.font_size());
        Some(raster_metrics(&metrics))
    }

    fn rasterize(&self, glyph: GlyphId) -> Option<(RasterMetrics, Vec<u8>)> {
        let font = self.font(glyph.font_id())?;
        let (metrics, coverage) = font.rasterize_indexed(glyph.glyph_index(), glyph.font_size());
        Some((raster_metrics(&metrics), coverage))
    }
}

fn raster_metrics(metrics: &fontdue::Metrics) -> RasterMetrics {
    RasterMetrics {
        xmin: metrics.xmin,
        ymin: metrics.ymin,
        width: metrics.width,
        height: metrics.height,
    }
}
