use std::time::Instant;

use crate::{
    font_system::FontBackend,
    label::LabelConfig,
    text::{
        ImagePlacement, PreparedBuffer, ShapedLayout, Size, StyledBuffer, extract_placements,
        measure, shape,
    },
};

/// Everything the presentation side needs to draw one content generation.
///
/// A state is computed off the presentation thread and then published as a
/// whole; once published it is never modified, so readers can hold on to it
/// while newer states replace it.
#[derive(Clone, Debug)]
pub struct RenderState {
    buffer: StyledBuffer,
    layout: Option<ShapedLayout>,
    size: Size,
    placements: Vec<ImagePlacement>,
    width: f32,
}

impl RenderState {
    /// The state of a label without content.
    pub fn empty() -> Self {
        Self {
            buffer: StyledBuffer::new(),
            layout: None,
            size: Size::zero(),
            placements: Vec::new(),
            width: 0.0,
        }
    }

    /// Prepares, measures and shapes `buffer` at `width`, then extracts its
    /// image placements.
    ///
    /// Reads nothing but its arguments.
    pub fn compute(
        buffer: StyledBuffer,
        width: f32,
        config: &LabelConfig,
        backend: &dyn FontBackend,
    ) -> Self {
        if buffer.is_empty() {
            return Self {
                width,
                ..Self::empty()
            };
        }

        let started = Instant::now();
        let layout_width = config.layout.effective_width(width);
        let prepared = PreparedBuffer::prepare(&buffer, layout_width, config.image_margin);
        let size = measure(&prepared, layout_width, &config.layout, backend);
        let layout = shape(&prepared, layout_width, &config.layout, backend);
        let placements = extract_placements(&layout);

        log::debug!(
            "Laid out {} units at width {}: {}x{} with {} lines and {} images in {:?}.",
            buffer.len(),
            width,
            size.width,
            size.height,
            layout.line_count(),
            placements.len(),
            started.elapsed()
        );

        Self {
            buffer,
            layout: Some(layout),
            size,
            placements,
            width,
        }
    }

    pub fn buffer(&self) -> &StyledBuffer {
        &self.buffer
    }

    /// `None` when there is no content.
    pub fn layout(&self) -> Option<&ShapedLayout> {
        self.layout.as_ref()
    }

    /// Content size; `(0, 0)` without content.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn placements(&self) -> &[ImagePlacement] {
        &self.placements
    }

    /// Width this state was computed for.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Length of the content in offset units.
    pub fn content_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::empty()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FixedMetrics};

    #[test]
    fn empty_buffer_has_zero_size() {
        let state = RenderState::compute(
            StyledBuffer::new(),
            200.0,
            &LabelConfig::default(),
            &FixedMetrics,
        );
        assert_eq!(state.size(), Size::zero());
        assert!(state.layout().is_none());
        assert_eq!(state.width(), 200.0);
    }

    #[test]
    fn size_matches_layout_height() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("A", testing::style());
        buffer.push_image(testing::solid_image(40, 40, [0, 0, 0, 255]), None);
        buffer.push_text("B", testing::style());

        let state = RenderState::compute(buffer, 200.0, &LabelConfig::default(), &FixedMetrics);
        assert_eq!(state.size(), Size::new(60.0, 44.0));
        assert_eq!(state.layout().unwrap().height(), state.size().height);
        assert_eq!(state.placements().len(), 1);
        assert_eq!(state.content_len(), 3);
    }
}
