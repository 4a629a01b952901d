mod glyph_cache;

use image::{Rgba, RgbaImage, imageops::FilterType};

use crate::{
    font_system::FontBackend,
    render_state::RenderState,
    text::{Color, GlyphKind, ImageSource, ScreenRect, ShapedLayout, ShapedLine, Size},
};

pub use glyph_cache::{GlyphCache, GlyphCacheItem};

/// RGBA drawing surface in screen space.
///
/// Pixels are straight-alpha, row-major, with the origin at the top-left.
#[derive(Clone, Debug)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// A canvas large enough for content of `size`.
    pub fn for_size(size: Size) -> Self {
        Self::new(size.width.ceil() as u32, size.height.ceil() as u32)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.image.get_pixel_checked(x, y).map(|pixel| pixel.0)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn clear(&mut self, color: Color) {
        let fill = Rgba(color.to_rgba8());
        for pixel in self.image.pixels_mut() {
            *pixel = fill;
        }
    }

    /// Source-over blend of `color` scaled by `coverage`. Out-of-bounds
    /// coordinates are ignored.
    fn blend(&mut self, x: i64, y: i64, color: [u8; 4], coverage: u8) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        let src_a = (color[3] as f32 / 255.0) * (coverage as f32 / 255.0);
        if src_a <= 0.0 {
            return;
        }

        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        let dst_a = dst.0[3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        for channel in 0..3 {
            let src = color[channel] as f32;
            let old = dst.0[channel] as f32;
            let out = (src * src_a + old * dst_a * (1.0 - src_a)) / out_a;
            dst.0[channel] = out.round().clamp(0.0, 255.0) as u8;
        }
        dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    /// Draws `source` scaled into `rect`.
    fn draw_image(&mut self, source: &ImageSource, rect: &ScreenRect) {
        let width = rect.size.width.round();
        let height = rect.size.height.round();
        if width < 1.0 || height < 1.0 {
            return;
        }
        let (width, height) = (width as u32, height as u32);

        let pixels = source.pixels();
        let scaled;
        let pixels = if pixels.dimensions() == (width, height) {
            pixels
        } else {
            scaled = image::imageops::resize(pixels, width, height, FilterType::Triangle);
            &scaled
        };

        let left = rect.origin.x.round() as i64;
        let top = rect.origin.y.round() as i64;
        for (x, y, pixel) in pixels.enumerate_pixels() {
            self.blend(left + x as i64, top + y as i64, pixel.0, 255);
        }
    }
}

/// CPU implementation of the draw step.
///
/// Consumes published render states only; it never shapes.
pub struct CpuRenderer {
    cache: GlyphCache,
}

impl CpuRenderer {
    /// Creates a renderer from the provided cache.
    pub fn new(cache: GlyphCache) -> Self {
        Self { cache }
    }

    /// Clears `canvas` to `background`, then draws the glyphs of `state` and
    /// its images on top.
    ///
    /// The canvas origin is the top-left corner of the content; anything
    /// outside the canvas is clipped.
    pub fn render(
        &mut self,
        state: &RenderState,
        canvas: &mut Canvas,
        background: Color,
        backend: &dyn FontBackend,
    ) {
        canvas.clear(background);

        let Some(layout) = state.layout() else {
            return;
        };

        for line in layout.lines() {
            self.render_line(layout, line, canvas, backend);
        }

        for placement in state.placements() {
            canvas.draw_image(&placement.source, &placement.rect);
        }
    }

    fn render_line(
        &mut self,
        layout: &ShapedLayout,
        line: &ShapedLine,
        canvas: &mut Canvas,
        backend: &dyn FontBackend,
    ) {
        let baseline = layout.screen_y(line.origin.y);

        for run in &line.runs {
            let color = run.color.to_rgba8();
            for glyph in &run.glyphs {
                let GlyphKind::Font(glyph_id) = glyph.kind else {
                    continue;
                };
                let Some(cached) = self.cache.get(&glyph_id, backend) else {
                    continue;
                };
                let metrics = cached.metrics;
                if metrics.width == 0 || metrics.height == 0 {
                    continue;
                }

                let left = (line.origin.x + glyph.x + metrics.xmin as f32).round() as i64;
                let top =
                    (baseline - (metrics.ymin as f32 + metrics.height as f32)).round() as i64;

                for row in 0..metrics.height {
                    for col in 0..metrics.width {
                        let Some(&coverage) = cached.data.get(row * metrics.width + col) else {
                            continue;
                        };
                        if coverage == 0 {
                            continue;
                        }
                        canvas.blend(left + col as i64, top + row as i64, color, coverage);
                    }
                }
            }
        }
    }

    /// Returns a reference to the underlying glyph cache.
    pub fn cache(&self) -> &GlyphCache {
        &self.cache
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        label::LabelConfig,
        testing::{self, FixedMetrics},
        text::StyledBuffer,
    };

    fn renderer() -> CpuRenderer {
        CpuRenderer::new(GlyphCache::new(&[(
            NonZeroUsize::new(1024).unwrap(),
            NonZeroUsize::new(16).unwrap(),
        )]))
    }

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];

    #[test]
    fn empty_state_only_clears() {
        let mut canvas = Canvas::new(4, 4);
        renderer().render(
            &RenderState::empty(),
            &mut canvas,
            Color::WHITE,
            &FixedMetrics,
        );
        assert!(canvas.image().pixels().all(|pixel| pixel.0 == WHITE));
    }

    #[test]
    fn glyphs_and_images_land_in_screen_space() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("A", testing::style());
        buffer.push_image(testing::solid_image(40, 40, RED), None);
        buffer.push_text("B", testing::style());

        let state = RenderState::compute(buffer, 200.0, &LabelConfig::default(), &FixedMetrics);
        let mut canvas = Canvas::for_size(state.size());
        assert_eq!((canvas.width(), canvas.height()), (60, 44));

        renderer().render(&state, &mut canvas, Color::WHITE, &FixedMetrics);

        // "A" stands on the baseline, 40 units from the top.
        assert_eq!(canvas.pixel(5, 30), Some(BLACK));
        assert_eq!(canvas.pixel(5, 10), Some(WHITE));
        // Descent area below the baseline stays empty.
        assert_eq!(canvas.pixel(5, 42), Some(WHITE));
        // The image fills the top of the line between the letters.
        assert_eq!(canvas.pixel(10, 0), Some(RED));
        assert_eq!(canvas.pixel(49, 39), Some(RED));
        assert_eq!(canvas.pixel(30, 41), Some(WHITE));
        assert_eq!(canvas.pixel(55, 30), Some(BLACK));
    }

    #[test]
    fn spaces_do_not_fill_the_glyph_cache() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("a a  a", testing::style());
        let state = RenderState::compute(buffer, 200.0, &LabelConfig::default(), &FixedMetrics);
        let mut canvas = Canvas::for_size(state.size());

        let mut renderer = renderer();
        renderer.render(&state, &mut canvas, Color::WHITE, &FixedMetrics);
        assert_eq!(renderer.cache().len(), 1);
    }

    #[test]
    fn images_are_scaled_into_their_rect() {
        let mut buffer = StyledBuffer::new();
        buffer.push_image(
            testing::solid_image(2, 2, RED),
            Some(Size::new(20.0, 10.0)),
        );
        let state = RenderState::compute(buffer, 200.0, &LabelConfig::default(), &FixedMetrics);
        let mut canvas = Canvas::for_size(state.size());
        renderer().render(&state, &mut canvas, Color::WHITE, &FixedMetrics);

        assert_eq!((canvas.width(), canvas.height()), (20, 10));
        assert!(canvas.image().pixels().all(|pixel| pixel.0 == RED));
    }

    #[test]
    fn text_color_is_blended_over_background() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("x", testing::style().with_color(Color::rgba(1.0, 0.0, 0.0, 0.5)));
        let state = RenderState::compute(buffer, 200.0, &LabelConfig::default(), &FixedMetrics);
        let mut canvas = Canvas::for_size(state.size());
        renderer().render(&state, &mut canvas, Color::WHITE, &FixedMetrics);

        let [r, g, b, a] = canvas.pixel(2, 8).unwrap();
        assert_eq!((r, a), (255, 255));
        assert!(g > 120 && g < 135);
        assert_eq!(g, b);
    }
}
