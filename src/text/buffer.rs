use std::sync::Arc;

use image::RgbaImage;

use crate::{error::LabelError, text::shaped::Size};

/// Straight-alpha RGBA color with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const DARK_GRAY: Self = Self::rgba(0.33, 0.33, 0.33, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Quantizes to 8-bit channels.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Styling vocabulary carried by text segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub font_id: fontdb::ID,
    /// Font size in pixels.
    pub font_size: f32,
    pub color: Color,
    /// Extra space added below every line this style participates in.
    pub line_spacing: f32,
    /// Extra space added below a line that ends with a line break.
    pub paragraph_spacing: f32,
}

impl TextStyle {
    pub fn new(font_id: fontdb::ID, font_size: f32) -> Self {
        Self {
            font_id,
            font_size,
            color: Color::BLACK,
            line_spacing: 0.0,
            paragraph_spacing: 0.0,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_spacing(mut self, line_spacing: f32, paragraph_spacing: f32) -> Self {
        self.line_spacing = line_spacing;
        self.paragraph_spacing = paragraph_spacing;
        self
    }
}

/// Shared handle to decoded image pixels.
///
/// Cloning is cheap; every buffer snapshot that mentions the image points at
/// the same pixels.
#[derive(Clone)]
pub struct ImageSource {
    pixels: Arc<RgbaImage>,
}

impl ImageSource {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Decodes encoded image data (PNG).
    pub fn decode(bytes: &[u8]) -> Result<Self, LabelError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba(decoded.into_rgba8()))
    }

    /// Pixel size of the decoded image.
    pub fn natural_size(&self) -> Size {
        Size::new(self.pixels.width() as f32, self.pixels.height() as f32)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .finish()
    }
}

impl PartialEq for ImageSource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// An image embedded in the text flow.
#[derive(Clone, Debug, PartialEq)]
pub struct InlineImage {
    pub source: ImageSource,
    /// Explicit display size. Ignored when empty.
    pub bounds: Option<Size>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Text { content: String, style: TextStyle },
    Image(InlineImage),
}

impl Segment {
    /// Number of buffer offsets the segment occupies.
    ///
    /// Text counts one offset per `char`; an image is a single offset.
    pub fn len(&self) -> usize {
        match self {
            Segment::Text { content, .. } => content.chars().count(),
            Segment::Image(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered text and image segments.
///
/// The pipeline receives buffers by value, so a snapshot handed to
/// [`crate::RichLabel::append_content`] can never change under a running
/// layout pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyledBuffer {
    segments: Vec<Segment>,
    len: usize,
}

impl StyledBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, content: impl Into<String>, style: TextStyle) {
        self.push(Segment::Text {
            content: content.into(),
            style,
        });
    }

    pub fn push_image(&mut self, source: ImageSource, bounds: Option<Size>) {
        self.push(Segment::Image(InlineImage { source, bounds }));
    }

    /// Appends a segment. Empty text segments are dropped.
    pub fn push(&mut self, segment: Segment) {
        let len = segment.len();
        if len == 0 {
            return;
        }
        self.len += len;
        self.segments.push(segment);
    }

    /// Appends every segment of `other` after the current content.
    pub fn extend(&mut self, other: &StyledBuffer) {
        for segment in &other.segments {
            self.push(segment.clone());
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total number of offsets (characters plus images).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.len = 0;
    }

    /// Text content with every image replaced by U+FFFC.
    pub fn plain_text(&self) -> String {
        let mut out = String::with_capacity(self.len);
        for segment in &self.segments {
            match segment {
                Segment::Text { content, .. } => out.push_str(content),
                Segment::Image(_) => out.push(crate::text::OBJECT_REPLACEMENT_CHAR),
            }
        }
        out
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> TextStyle {
        TextStyle::new(fontdb::ID::dummy(), 14.0)
    }

    #[test]
    fn offsets_count_chars_and_images() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("héllo", style());
        buffer.push_image(ImageSource::from_rgba(RgbaImage::new(4, 4)), None);
        buffer.push_text("!", style());

        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.plain_text(), "héllo\u{FFFC}!");
    }

    #[test]
    fn empty_text_segments_are_dropped() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("", style());
        assert!(buffer.is_empty());
        assert!(buffer.segments().is_empty());
    }

    #[test]
    fn extend_concatenates_snapshots() {
        let mut first = StyledBuffer::new();
        first.push_text("ab", style());
        let mut second = StyledBuffer::new();
        second.push_text("cd", style());

        first.extend(&second);
        assert_eq!(first.len(), 4);
        assert_eq!(first.segments().len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            ImageSource::decode(b"not an image"),
            Err(LabelError::ImageDecode(_))
        ));
    }

    #[test]
    fn decode_round_trips_png() {
        let mut encoded = Vec::new();
        let pixels = RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]));
        pixels
            .write_to(
                &mut std::io::Cursor::new(&mut encoded),
                image::ImageFormat::Png,
            )
            .unwrap();

        let source = ImageSource::decode(&encoded).unwrap();
        assert_eq!(source.natural_size(), Size::new(3.0, 2.0));
    }
}
