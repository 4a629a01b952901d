use std::{collections::BTreeMap, ops::RangeBounds, sync::Arc};

use crate::text::{
    buffer::{ImageSource, InlineImage, Segment, StyledBuffer, TextStyle},
    shaped::Size,
};

/// Placeholder character that stands in for an inline image.
pub const OBJECT_REPLACEMENT_CHAR: char = '\u{FFFC}';

/// Footprint the line breaker reserves for a sentinel.
///
/// Images sit on the baseline: the ascent is the full image height and the
/// descent is always zero, so the sentinel behaves like a single glyph with a
/// fixed advance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SentinelMetric {
    pub ascent: f32,
    pub descent: f32,
    pub width: f32,
}

impl SentinelMetric {
    /// Metric used when an attachment cannot be measured.
    pub const ZERO: Self = Self {
        ascent: 0.0,
        descent: 0.0,
        width: 0.0,
    };

    /// Builds the metric for an image of `size`.
    ///
    /// Returns `None` for sizes the line breaker cannot work with.
    pub fn for_size(size: Size) -> Option<Self> {
        let usable = |v: f32| v.is_finite() && v >= 0.0;
        if !usable(size.width) || !usable(size.height) {
            return None;
        }
        Some(Self {
            ascent: size.height,
            descent: 0.0,
            width: size.width,
        })
    }

    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// An inline image after sizing.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageAttachment {
    pub source: ImageSource,
    /// Display size. Computed once per layout width and never changed.
    pub size: Size,
    /// Buffer offset of the sentinel.
    pub offset: usize,
}

/// Attachments of one prepared buffer, keyed by their buffer offset.
///
/// Each layout generation owns its own table, so sentinel metrics are
/// released together with the layouts that reference them.
#[derive(Clone, Debug, Default)]
pub struct AttachmentTable {
    entries: Vec<(ImageAttachment, SentinelMetric)>,
    by_offset: BTreeMap<usize, usize>,
}

impl AttachmentTable {
    fn insert(&mut self, attachment: ImageAttachment, metric: SentinelMetric) -> usize {
        let index = self.entries.len();
        self.by_offset.insert(attachment.offset, index);
        self.entries.push((attachment, metric));
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(&ImageAttachment, &SentinelMetric)> {
        self.entries
            .get(index)
            .map(|(attachment, metric)| (attachment, metric))
    }

    /// Looks up the attachment whose sentinel sits at `offset`.
    pub fn at_offset(&self, offset: usize) -> Option<usize> {
        self.by_offset.get(&offset).copied()
    }

    /// Attachment indices whose offsets fall in `range`, in offset order.
    pub fn in_range(&self, range: impl RangeBounds<usize>) -> impl Iterator<Item = usize> + '_ {
        self.by_offset.range(range).map(|(_, &index)| index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageAttachment> {
        self.entries.iter().map(|(attachment, _)| attachment)
    }
}

/// One element of a prepared buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum PreparedItem {
    Text {
        /// Offset of the first character.
        start: usize,
        content: String,
        style: TextStyle,
    },
    /// The single sentinel character replacing an image.
    Sentinel {
        offset: usize,
        attachment: usize,
        metric: SentinelMetric,
    },
}

/// A styled buffer with every image replaced by a sized sentinel.
#[derive(Clone, Debug)]
pub struct PreparedBuffer {
    items: Vec<PreparedItem>,
    attachments: Arc<AttachmentTable>,
    len: usize,
}

impl PreparedBuffer {
    /// Replaces every image of `buffer` by a sentinel sized for `layout_width`.
    ///
    /// This reads nothing but its arguments, so it is safe to run on the
    /// layout worker. Attachments never fail: an image that cannot be
    /// measured gets [`SentinelMetric::ZERO`].
    pub fn prepare(buffer: &StyledBuffer, layout_width: f32, image_margin: f32) -> Self {
        let mut items = Vec::with_capacity(buffer.segments().len());
        let mut attachments = AttachmentTable::default();
        let mut offset = 0usize;

        for segment in buffer.segments() {
            match segment {
                Segment::Text { content, style } => {
                    items.push(PreparedItem::Text {
                        start: offset,
                        content: content.clone(),
                        style: *style,
                    });
                }
                Segment::Image(image) => {
                    let size = attachment_size(image, layout_width, image_margin);
                    let metric = SentinelMetric::for_size(size).unwrap_or_else(|| {
                        log::warn!(
                            "Attachment at offset {} has unusable size {:?}; using a zero placeholder.",
                            offset,
                            size
                        );
                        SentinelMetric::ZERO
                    });
                    let attachment = attachments.insert(
                        ImageAttachment {
                            source: image.source.clone(),
                            size,
                            offset,
                        },
                        metric,
                    );
                    items.push(PreparedItem::Sentinel {
                        offset,
                        attachment,
                        metric,
                    });
                }
            }
            offset += segment.len();
        }

        Self {
            items,
            attachments: Arc::new(attachments),
            len: offset,
        }
    }

    pub fn items(&self) -> &[PreparedItem] {
        &self.items
    }

    pub fn attachments(&self) -> &Arc<AttachmentTable> {
        &self.attachments
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The text the shaper sees, sentinels included.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.len);
        for item in &self.items {
            match item {
                PreparedItem::Text { content, .. } => out.push_str(content),
                PreparedItem::Sentinel { .. } => out.push(OBJECT_REPLACEMENT_CHAR),
            }
        }
        out
    }
}

/// Display size of an inline image laid out at `layout_width`.
///
/// The natural size is replaced by non-empty explicit bounds, then clamped to
/// `layout_width - image_margin` keeping the aspect ratio. The height never
/// drops below one unit so empty images still produce a well-formed row.
pub fn attachment_size(image: &InlineImage, layout_width: f32, image_margin: f32) -> Size {
    let mut size = image.source.natural_size();

    if let Some(bounds) = image.bounds
        && bounds.width > 0.0
        && bounds.height > 0.0
    {
        size = bounds;
    }

    let max_width = (layout_width - image_margin).max(1.0);
    if size.width > max_width {
        let scale = max_width / size.width;
        size = Size::new(max_width, size.height * scale);
    }

    if size.width.is_nan() || size.width < 0.0 {
        size.width = 0.0;
    }
    if size.height.is_nan() || size.height < 1.0 {
        size.height = 1.0;
    }

    size
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn image(width: u32, height: u32) -> InlineImage {
        InlineImage {
            source: ImageSource::from_rgba(RgbaImage::new(width, height)),
            bounds: None,
        }
    }

    fn style() -> TextStyle {
        TextStyle::new(fontdb::ID::dummy(), 14.0)
    }

    #[test]
    fn natural_size_is_kept_when_it_fits() {
        let size = attachment_size(&image(40, 20), 200.0, 30.0);
        assert_eq!(size, Size::new(40.0, 20.0));
    }

    #[test]
    fn explicit_bounds_override_natural_size() {
        let mut img = image(40, 20);
        img.bounds = Some(Size::new(50.0, 50.0));
        assert_eq!(attachment_size(&img, 200.0, 30.0), Size::new(50.0, 50.0));

        img.bounds = Some(Size::new(0.0, 50.0));
        assert_eq!(attachment_size(&img, 200.0, 30.0), Size::new(40.0, 20.0));
    }

    #[test]
    fn wide_images_are_clamped_keeping_aspect_ratio() {
        let size = attachment_size(&image(2000, 1000), 300.0, 30.0);
        assert!(size.width <= 270.0);
        assert!((size.height / size.width - 0.5).abs() < 1e-4);
    }

    #[test]
    fn degenerate_images_become_min_height_placeholders() {
        let size = attachment_size(&image(0, 0), 300.0, 30.0);
        assert_eq!(size, Size::new(0.0, 1.0));

        // Clamping an extreme aspect ratio must not produce a zero-height row.
        let size = attachment_size(&image(5000, 1), 100.0, 30.0);
        assert_eq!(size.height, 1.0);
    }

    #[test]
    fn infinite_bounds_fall_back_to_zero_metric() {
        let mut buffer = StyledBuffer::new();
        buffer.push(Segment::Image(InlineImage {
            source: ImageSource::from_rgba(RgbaImage::new(1, 1)),
            bounds: Some(Size::new(10.0, f32::INFINITY)),
        }));

        let prepared = PreparedBuffer::prepare(&buffer, 300.0, 30.0);
        let (_, metric) = prepared.attachments().get(0).unwrap();
        assert_eq!(*metric, SentinelMetric::ZERO);
    }

    #[test]
    fn images_become_single_sentinels() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("ab", style());
        buffer.push_image(ImageSource::from_rgba(RgbaImage::new(10, 30)), None);
        buffer.push_text("c", style());
        buffer.push_image(ImageSource::from_rgba(RgbaImage::new(8, 8)), None);

        let prepared = PreparedBuffer::prepare(&buffer, 300.0, 30.0);
        assert_eq!(prepared.len(), buffer.len());
        assert_eq!(prepared.text(), "ab\u{FFFC}c\u{FFFC}");
        assert_eq!(prepared.attachments().len(), 2);
        assert_eq!(prepared.attachments().at_offset(2), Some(0));
        assert_eq!(prepared.attachments().at_offset(4), Some(1));
        assert_eq!(prepared.attachments().at_offset(3), None);

        let metric = match &prepared.items()[1] {
            PreparedItem::Sentinel { metric, .. } => *metric,
            other => panic!("expected sentinel, got {other:?}"),
        };
        assert_eq!(
            metric,
            SentinelMetric {
                ascent: 30.0,
                descent: 0.0,
                width: 10.0
            }
        );
    }

    #[test]
    fn range_lookup_is_offset_ordered() {
        let mut buffer = StyledBuffer::new();
        for _ in 0..3 {
            buffer.push_image(ImageSource::from_rgba(RgbaImage::new(1, 1)), None);
            buffer.push_text("x", style());
        }
        let prepared = PreparedBuffer::prepare(&buffer, 100.0, 30.0);
        let found: Vec<usize> = prepared.attachments().in_range(1..5).collect();
        assert_eq!(found, vec![1]);
        let found: Vec<usize> = prepared.attachments().in_range(0..6).collect();
        assert_eq!(found, vec![0, 1, 2]);
    }
}
