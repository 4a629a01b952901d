use crate::text::{
    buffer::ImageSource,
    shaped::{GlyphKind, LayoutPoint, LayoutRect, ScreenPoint, ScreenRect, ShapedLayout},
};

/// Where one inline image is drawn, in screen space.
#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlacement {
    /// Index into the layout's attachment table.
    pub attachment: usize,
    pub source: ImageSource,
    pub rect: ScreenRect,
    /// Position in visual order: lines top to bottom, runs left to right.
    pub sequence: usize,
}

/// Collects the screen rectangle of every image sentinel in `layout`.
///
/// Placements come out in line order, then run order. A sentinel that was
/// dropped during shaping simply yields no placement. Rectangles are relative
/// to the top-left corner of the content and are converted with the layout's
/// own content height, never with the height of whatever surface hosts it.
pub fn extract_placements(layout: &ShapedLayout) -> Vec<ImagePlacement> {
    let attachments = layout.attachments();
    if attachments.is_empty() {
        return Vec::new();
    }

    let mut placements = Vec::with_capacity(attachments.len());

    for line in layout.lines() {
        for run in &line.runs {
            for index in attachments.in_range(run.range.clone()) {
                let Some((attachment, metric)) = attachments.get(index) else {
                    continue;
                };
                let Some(glyph) = run.glyph_at(attachment.offset) else {
                    continue;
                };
                if !matches!(glyph.kind, GlyphKind::Sentinel { attachment } if attachment == index)
                {
                    continue;
                }

                let layout_rect = LayoutRect::new(
                    LayoutPoint::new(line.origin.x + glyph.x, line.origin.y - run.descent),
                    euclid::Size2D::new(metric.width, metric.height()),
                );

                placements.push(ImagePlacement {
                    attachment: index,
                    source: attachment.source.clone(),
                    rect: to_presentation(layout, &layout_rect),
                    sequence: placements.len(),
                });
            }
        }
    }

    placements
}

/// Flips a bottom-up layout rectangle into top-down screen space.
pub fn to_presentation(layout: &ShapedLayout, rect: &LayoutRect) -> ScreenRect {
    ScreenRect::new(
        ScreenPoint::new(
            rect.origin.x,
            layout.screen_y(rect.origin.y) - rect.size.height,
        ),
        euclid::Size2D::new(rect.size.width, rect.size.height),
    )
}
