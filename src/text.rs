/// Attachment preprocessing: inline images become sized sentinel glyphs.
pub mod attachment;
/// Styled input content.
pub mod buffer;
/// Image placement extraction and coordinate conversion.
pub mod geometry;
/// Line breaking, measuring and shaping.
pub mod layout;
/// Immutable shaped output and coordinate spaces.
pub mod shaped;

pub use attachment::{
    AttachmentTable, ImageAttachment, OBJECT_REPLACEMENT_CHAR, PreparedBuffer, PreparedItem,
    SentinelMetric,
};
pub use buffer::{Color, ImageSource, InlineImage, Segment, StyledBuffer, TextStyle};
pub use geometry::{ImagePlacement, extract_placements, to_presentation};
pub use layout::{HorizontalAlign, LayoutConfig, WrapStyle, measure, shape};
pub use shaped::{
    GlyphId, GlyphKind, GlyphRun, LayoutPoint, LayoutRect, LayoutSpace, ScreenPoint, ScreenRect,
    ScreenSpace, ShapedGlyph, ShapedLayout, ShapedLine, Size,
};
