use std::collections::HashSet;

use fxhash::FxBuildHasher;

use crate::{
    font_system::FontBackend,
    text::{
        attachment::{OBJECT_REPLACEMENT_CHAR, PreparedBuffer, PreparedItem},
        buffer::Color,
        shaped::{
            GlyphId, GlyphKind, GlyphRun, LayoutPoint, ShapedGlyph, ShapedLayout, ShapedLine, Size,
        },
    },
};

/// Configuration knobs used by the line breaker.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Narrowest width a buffer is ever shaped at.
    pub min_width: f32,
    pub horizontal_align: HorizontalAlign,
    pub wrap_style: WrapStyle,
    /// Split words that are wider than a whole line.
    pub wrap_hard_break: bool,
    pub word_separators: HashSet<char, FxBuildHasher>,
    pub linebreak_chars: HashSet<char, FxBuildHasher>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let mut word_separators = HashSet::with_hasher(FxBuildHasher::default());
        word_separators.insert(' ');
        word_separators.insert('\t');

        let mut linebreak_chars = HashSet::with_hasher(FxBuildHasher::default());
        linebreak_chars.insert('\n');

        Self {
            min_width: 10.0,
            horizontal_align: HorizontalAlign::Left,
            wrap_style: WrapStyle::WordWrap,
            wrap_hard_break: true,
            word_separators,
            linebreak_chars,
        }
    }
}

impl LayoutConfig {
    /// Width actually used for shaping a request at `width`.
    pub fn effective_width(&self, width: f32) -> f32 {
        if width.is_nan() {
            self.min_width
        } else {
            width.max(self.min_width)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Horizontal justification applied after each line is assembled.
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Wrapping rules that define where line breaks may occur.
pub enum WrapStyle {
    NoWrap,
    WordWrap,
    CharWrap,
}

/// Smallest box containing every line of `prepared` at `width`.
///
/// Height is unbounded; both dimensions are rounded up to whole units.
/// Calling this twice with the same arguments yields the same size.
pub fn measure(
    prepared: &PreparedBuffer,
    width: f32,
    config: &LayoutConfig,
    backend: &dyn FontBackend,
) -> Size {
    let width = config.effective_width(width);
    let paragraph = break_lines(prepared, width, config, backend);
    Size::new(paragraph.width.ceil(), paragraph.height.ceil())
}

/// Shapes `prepared` at `width` into an immutable layout.
///
/// The layout's frame height is the measured content height, so line origins
/// (bottom-up) and later screen conversions agree on the same height.
pub fn shape(
    prepared: &PreparedBuffer,
    width: f32,
    config: &LayoutConfig,
    backend: &dyn FontBackend,
) -> ShapedLayout {
    let width = config.effective_width(width);
    let paragraph = break_lines(prepared, width, config, backend);
    let frame_height = paragraph.height.ceil();
    let target_width = if width.is_finite() {
        width
    } else {
        paragraph.width
    };

    let lines = paragraph
        .lines
        .into_iter()
        .map(|line| {
            let x = match config.horizontal_align {
                HorizontalAlign::Left => 0.0,
                HorizontalAlign::Center => (target_width - line.width) / 2.0,
                HorizontalAlign::Right => target_width - line.width,
            };
            ShapedLine {
                origin: LayoutPoint::new(x, frame_height - line.baseline),
                width: line.width,
                ascent: line.metrics.ascent,
                descent: line.metrics.descent,
                runs: build_runs(line.placed),
            }
        })
        .collect();

    ShapedLayout {
        width,
        height: frame_height,
        lines,
        attachments: prepared.attachments().clone(),
    }
}

/// Vertical extent a fragment asks of its line.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct VerticalMetrics {
    ascent: f32,
    descent: f32,
    line_gap: f32,
    line_spacing: f32,
}

impl VerticalMetrics {
    fn max(self, other: Self) -> Self {
        Self {
            ascent: self.ascent.max(other.ascent),
            descent: self.descent.max(other.descent),
            line_gap: self.line_gap.max(other.line_gap),
            line_spacing: self.line_spacing.max(other.line_spacing),
        }
    }
}

/// Identifies a font glyph for kerning with its neighbour.
#[derive(Clone, Copy, Debug, PartialEq)]
struct KernKey {
    font_id: fontdb::ID,
    font_size: f32,
    glyph_index: u16,
}

/// A measured character waiting for a line.
#[derive(Clone, Copy, Debug)]
struct Fragment {
    offset: usize,
    ch: char,
    kind: GlyphKind,
    kern: Option<KernKey>,
    advance: f32,
    ink_right: f32,
    metrics: VerticalMetrics,
    color: Color,
}

/// A fragment with its pen position relative to the line start.
#[derive(Clone, Copy, Debug)]
struct Placed {
    fragment: Fragment,
    x: f32,
}

/// Glyphs collected for one line, positioned from the line start.
///
/// Buffers are concatenated word by word, which lets wrapping decisions look
/// at the kerning-aware width before anything is committed.
struct LineBuffer {
    ink_width: f32,
    last_origin_x: f32,
    last_advance: f32,
    first_kern: Option<KernKey>,
    last_kern: Option<KernKey>,
    metrics: VerticalMetrics,
    placed: Vec<Placed>,
}

impl LineBuffer {
    fn from_fragments(fragments: &[Fragment], backend: &dyn FontBackend) -> Option<Self> {
        let (first, rest) = fragments.split_first()?;
        let mut buffer = Self {
            ink_width: first.ink_right,
            last_origin_x: 0.0,
            last_advance: first.advance,
            first_kern: first.kern,
            last_kern: first.kern,
            metrics: first.metrics,
            placed: vec![Placed {
                fragment: *first,
                x: 0.0,
            }],
        };
        for fragment in rest {
            buffer.push(fragment, backend);
        }
        Some(buffer)
    }

    /// Pen position for a glyph following the current last glyph.
    ///
    /// Kerning only applies between glyphs of the same font and size;
    /// sentinels never kern.
    fn joint_offset(&self, next: Option<KernKey>, backend: &dyn FontBackend) -> f32 {
        let kerning = match (self.last_kern, next) {
            (Some(left), Some(right))
                if left.font_id == right.font_id
                    && (left.font_size - right.font_size).abs() < f32::EPSILON =>
            {
                backend.kerning(
                    left.font_id,
                    left.font_size,
                    left.glyph_index,
                    right.glyph_index,
                )
            }
            _ => 0.0,
        };
        self.last_origin_x + self.last_advance + kerning
    }

    fn push(&mut self, fragment: &Fragment, backend: &dyn FontBackend) {
        let x = self.joint_offset(fragment.kern, backend);
        self.ink_width = x + fragment.ink_right;
        self.last_origin_x = x;
        self.last_advance = fragment.advance;
        self.last_kern = fragment.kern;
        self.metrics = self.metrics.max(fragment.metrics);
        self.placed.push(Placed {
            fragment: *fragment,
            x,
        });
    }

    fn projected_concat_width(&self, other: &LineBuffer, backend: &dyn FontBackend) -> f32 {
        self.joint_offset(other.first_kern, backend) + other.ink_width
    }

    fn concat(&mut self, other: LineBuffer, backend: &dyn FontBackend) {
        let x_offset = self.joint_offset(other.first_kern, backend);
        self.ink_width = x_offset + other.ink_width;
        self.last_origin_x = x_offset + other.last_origin_x;
        self.last_advance = other.last_advance;
        self.last_kern = other.last_kern;
        self.metrics = self.metrics.max(other.metrics);
        self.placed
            .extend(other.placed.into_iter().map(|placed| Placed {
                fragment: placed.fragment,
                x: placed.x + x_offset,
            }));
    }

    fn width(&self) -> f32 {
        self.ink_width.max(0.0)
    }
}

/// A finished line before vertical placement.
struct LineRecord {
    buffer: Option<LineBuffer>,
    /// Metrics for a line without glyphs (an empty paragraph).
    fallback: VerticalMetrics,
    paragraph_spacing: f32,
}

/// A line with its vertical position, measured top-down.
struct LineBox {
    width: f32,
    metrics: VerticalMetrics,
    baseline: f32,
    placed: Vec<Placed>,
}

struct Paragraph {
    lines: Vec<LineBox>,
    width: f32,
    height: f32,
}

struct LineBreaker<'a> {
    config: &'a LayoutConfig,
    backend: &'a dyn FontBackend,
    limit: Option<f32>,
    lines: Vec<LineRecord>,
    line_buf: Option<LineBuffer>,
    word_buf: Vec<Fragment>,
    /// The current line was opened by wrapping rather than by a line break.
    wrapped: bool,
}

fn break_lines(
    prepared: &PreparedBuffer,
    width: f32,
    config: &LayoutConfig,
    backend: &dyn FontBackend,
) -> Paragraph {
    let limit = match config.wrap_style {
        WrapStyle::NoWrap => None,
        WrapStyle::WordWrap | WrapStyle::CharWrap => Some(width),
    };
    let mut breaker = LineBreaker {
        config,
        backend,
        limit,
        lines: Vec::new(),
        line_buf: None,
        word_buf: Vec::new(),
        wrapped: false,
    };

    for item in prepared.items() {
        match item {
            PreparedItem::Text {
                start,
                content,
                style,
            } => {
                let Some(line_metrics) = backend.line_metrics(style.font_id, style.font_size)
                else {
                    log::warn!(
                        "Font {:?} is not available; skipping {} characters at offset {}.",
                        style.font_id,
                        content.chars().count(),
                        start
                    );
                    // Line breaks still apply; the lines they open have no height of their own.
                    let metrics = VerticalMetrics {
                        line_spacing: style.line_spacing,
                        ..VerticalMetrics::default()
                    };
                    for ch in content.chars() {
                        if config.linebreak_chars.contains(&ch) {
                            breaker.flush_word();
                            breaker.finalize_line(Some(metrics), style.paragraph_spacing);
                        }
                    }
                    continue;
                };
                let metrics = VerticalMetrics {
                    ascent: line_metrics.ascent,
                    descent: line_metrics.descent,
                    line_gap: line_metrics.line_gap,
                    line_spacing: style.line_spacing,
                };

                for (i, ch) in content.chars().enumerate() {
                    if config.linebreak_chars.contains(&ch) {
                        breaker.flush_word();
                        breaker.finalize_line(Some(metrics), style.paragraph_spacing);
                        continue;
                    }

                    let Some(glyph) = backend.glyph_metrics(style.font_id, style.font_size, ch)
                    else {
                        continue;
                    };
                    let fragment = Fragment {
                        offset: start + i,
                        ch,
                        kind: GlyphKind::Font(GlyphId::new(
                            style.font_id,
                            glyph.glyph_index,
                            style.font_size,
                        )),
                        kern: Some(KernKey {
                            font_id: style.font_id,
                            font_size: style.font_size,
                            glyph_index: glyph.glyph_index,
                        }),
                        advance: glyph.advance,
                        ink_right: glyph.ink_right,
                        metrics,
                        color: style.color,
                    };

                    if config.word_separators.contains(&ch) {
                        // Separators stay visible but only ever end a word.
                        breaker.flush_word();
                        breaker.append_with_rules(std::slice::from_ref(&fragment), false);
                        continue;
                    }

                    if matches!(config.wrap_style, WrapStyle::CharWrap) {
                        breaker.append_with_rules(std::slice::from_ref(&fragment), true);
                        continue;
                    }

                    breaker.word_buf.push(fragment);
                }
            }
            PreparedItem::Sentinel {
                offset,
                attachment,
                metric,
            } => {
                // A sentinel is a word of its own: lines may break on either side.
                breaker.flush_word();
                let fragment = Fragment {
                    offset: *offset,
                    ch: OBJECT_REPLACEMENT_CHAR,
                    kind: GlyphKind::Sentinel {
                        attachment: *attachment,
                    },
                    kern: None,
                    advance: metric.width,
                    ink_right: metric.width,
                    metrics: VerticalMetrics {
                        ascent: metric.ascent,
                        descent: metric.descent,
                        line_gap: 0.0,
                        line_spacing: 0.0,
                    },
                    color: Color::TRANSPARENT,
                };
                breaker.append_with_rules(std::slice::from_ref(&fragment), true);
            }
        }
    }

    breaker.flush_word();
    if breaker.line_buf.is_some() {
        breaker.finalize_line(None, 0.0);
    }

    breaker.into_paragraph()
}

impl LineBreaker<'_> {
    fn flush_word(&mut self) {
        if self.word_buf.is_empty() {
            return;
        }
        let word = std::mem::take(&mut self.word_buf);
        self.append_with_rules(&word, true);
    }

    /// Drops whitespace that would open a wrapped line, then appends.
    fn append_with_rules(&mut self, fragments: &[Fragment], allow_leading_space: bool) {
        if !allow_leading_space
            && self.wrapped
            && self.line_buf.is_none()
            && fragments.first().is_some_and(|first| first.ch.is_whitespace())
        {
            return;
        }
        self.append_to_line(fragments, allow_leading_space);
    }

    /// Appends fragments to the current line, wrapping when they do not fit.
    ///
    /// With hard breaking enabled a fragment run wider than a full line is
    /// split into the longest chunks that still fit.
    fn append_to_line(&mut self, fragments: &[Fragment], allow_leading_space: bool) {
        let Some(buffer) = LineBuffer::from_fragments(fragments, self.backend) else {
            return;
        };

        let Some(limit) = self.limit else {
            match self.line_buf.as_mut() {
                Some(current) => current.concat(buffer, self.backend),
                None => self.line_buf = Some(buffer),
            }
            return;
        };

        if let Some(current) = self.line_buf.as_mut()
            && current.projected_concat_width(&buffer, self.backend) <= limit
        {
            current.concat(buffer, self.backend);
            return;
        }

        let closed = self.line_buf.is_some();
        self.push_line();

        if closed
            && !allow_leading_space
            && fragments.first().is_some_and(|first| first.ch.is_whitespace())
        {
            return;
        }

        if buffer.width() <= limit || !self.config.wrap_hard_break || fragments.len() == 1 {
            self.line_buf = Some(buffer);
            return;
        }

        let mut start = 0usize;
        while start < fragments.len() {
            let mut end = start + 1;
            let Some(mut best) = LineBuffer::from_fragments(&fragments[start..end], self.backend)
            else {
                break;
            };

            // A single glyph wider than the line still gets a line of its own.
            if best.width() <= limit {
                while end < fragments.len() {
                    let Some(next) =
                        LineBuffer::from_fragments(&fragments[end..end + 1], self.backend)
                    else {
                        break;
                    };
                    if best.projected_concat_width(&next, self.backend) > limit {
                        break;
                    }
                    best.concat(next, self.backend);
                    end += 1;
                }
            }

            self.push_line();
            self.line_buf = Some(best);
            start = end;
        }
    }

    /// Closes the current line because the next content did not fit.
    fn push_line(&mut self) {
        if let Some(buffer) = self.line_buf.take() {
            let fallback = buffer.metrics;
            self.lines.push(LineRecord {
                buffer: Some(buffer),
                fallback,
                paragraph_spacing: 0.0,
            });
            self.wrapped = true;
        }
    }

    /// Closes the current line at a line break or at the end of the content.
    ///
    /// An empty line still takes the height of the style that broke it.
    fn finalize_line(&mut self, metrics: Option<VerticalMetrics>, paragraph_spacing: f32) {
        let buffer = self.line_buf.take();
        let fallback = match (&buffer, metrics) {
            (Some(buffer), _) => buffer.metrics,
            (None, Some(metrics)) => metrics,
            (None, None) => return,
        };
        self.lines.push(LineRecord {
            buffer,
            fallback,
            paragraph_spacing,
        });
        self.wrapped = false;
    }

    fn into_paragraph(self) -> Paragraph {
        let mut lines = Vec::with_capacity(self.lines.len());
        let mut cursor_y = 0.0f32;
        let mut max_width = 0.0f32;

        for record in self.lines {
            let (width, metrics, placed) = match record.buffer {
                Some(buffer) => (buffer.width(), buffer.metrics, buffer.placed),
                None => (0.0, record.fallback, Vec::new()),
            };

            max_width = max_width.max(width);
            let baseline = cursor_y + metrics.ascent;
            let height = metrics.ascent
                + metrics.descent
                + metrics.line_gap
                + metrics.line_spacing
                + record.paragraph_spacing;
            cursor_y += height.max(0.0);

            lines.push(LineBox {
                width,
                metrics,
                baseline,
                placed,
            });
        }

        Paragraph {
            lines,
            width: max_width,
            height: cursor_y,
        }
    }
}

/// Groups a line's glyphs into runs.
///
/// Consecutive font glyphs with the same font, size and color share a run;
/// every sentinel is a run of its own.
fn build_runs(placed: Vec<Placed>) -> Vec<GlyphRun> {
    #[derive(PartialEq)]
    enum RunKey {
        Font {
            font_id: fontdb::ID,
            font_size: f32,
            color: Color,
        },
        Sentinel(usize),
    }

    fn key_of(fragment: &Fragment) -> RunKey {
        match fragment.kind {
            GlyphKind::Font(id) => RunKey::Font {
                font_id: id.font_id(),
                font_size: id.font_size(),
                color: fragment.color,
            },
            GlyphKind::Sentinel { .. } => RunKey::Sentinel(fragment.offset),
        }
    }

    let mut runs: Vec<GlyphRun> = Vec::new();
    let mut current_key: Option<RunKey> = None;

    for Placed { fragment, x } in placed {
        let glyph = ShapedGlyph {
            offset: fragment.offset,
            x,
            advance: fragment.advance,
            kind: fragment.kind,
        };
        let key = key_of(&fragment);

        if current_key.as_ref() == Some(&key)
            && let Some(run) = runs.last_mut()
        {
            run.range.end = fragment.offset + 1;
            run.glyphs.push(glyph);
            continue;
        }

        runs.push(GlyphRun {
            range: fragment.offset..fragment.offset + 1,
            ascent: fragment.metrics.ascent,
            descent: fragment.metrics.descent,
            color: fragment.color,
            glyphs: vec![glyph],
        });
        current_key = Some(key);
    }

    runs
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        font_system::{GlyphMetrics, LineMetrics, RasterMetrics},
        testing::{self, FixedMetrics},
        text::StyledBuffer,
    };

    fn prepare(buffer: &StyledBuffer, width: f32) -> PreparedBuffer {
        PreparedBuffer::prepare(buffer, width, 30.0)
    }

    fn text(content: &str) -> StyledBuffer {
        let mut buffer = StyledBuffer::new();
        buffer.push_text(content, testing::style());
        buffer
    }

    fn line_texts(layout: &ShapedLayout) -> Vec<Vec<usize>> {
        layout
            .lines()
            .iter()
            .map(|line| {
                line.runs
                    .iter()
                    .flat_map(|run| run.glyphs.iter().map(|glyph| glyph.offset))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn measure_is_idempotent() {
        let buffer = text("hello world, this wraps around");
        let prepared = prepare(&buffer, 120.0);
        let config = LayoutConfig::default();

        let first = measure(&prepared, 120.0, &config, &FixedMetrics);
        let second = measure(&prepared, 120.0, &config, &FixedMetrics);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_buffer_has_no_lines() {
        let prepared = prepare(&StyledBuffer::new(), 100.0);
        let config = LayoutConfig::default();

        assert_eq!(
            measure(&prepared, 100.0, &config, &FixedMetrics),
            Size::zero()
        );
        assert_eq!(shape(&prepared, 100.0, &config, &FixedMetrics).line_count(), 0);
    }

    #[test]
    fn inline_image_reserves_its_footprint() {
        let mut buffer = text("A");
        buffer.push_image(testing::solid_image(40, 40, [255, 0, 0, 255]), None);
        buffer.push_text("B", testing::style());
        let prepared = prepare(&buffer, 200.0);
        let config = LayoutConfig::default();

        let size = measure(&prepared, 200.0, &config, &FixedMetrics);
        // "A" (10) + image (40) + "B" (10); ascent 40, descent 4.
        assert_eq!(size, Size::new(60.0, 44.0));

        let layout = shape(&prepared, 200.0, &config, &FixedMetrics);
        assert_eq!(layout.line_count(), 1);
        let line = &layout.lines()[0];
        assert_eq!(line.origin, LayoutPoint::new(0.0, 4.0));
        assert_eq!(line.runs.len(), 3);
        assert_eq!(line.runs[1].range, 1..2);
        assert_eq!(line.runs[1].ascent, 40.0);
        assert_eq!(line.runs[1].descent, 0.0);
        assert_eq!(line.runs[1].glyphs[0].x, 10.0);
        assert_eq!(line.runs[2].glyphs[0].x, 50.0);
    }

    #[test]
    fn word_wrap_breaks_between_words() {
        let prepared = prepare(&text("aaa bbb"), 50.0);
        let layout = shape(&prepared, 50.0, &LayoutConfig::default(), &FixedMetrics);

        // The separator hangs at the end of the first line.
        assert_eq!(line_texts(&layout), vec![vec![0, 1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(layout.height(), 40.0);
    }

    #[test]
    fn long_words_are_hard_broken() {
        let prepared = prepare(&text("aaaaaaaaaa"), 35.0);
        let layout = shape(&prepared, 35.0, &LayoutConfig::default(), &FixedMetrics);
        let lengths: Vec<usize> = line_texts(&layout).iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![3, 3, 3, 1]);
    }

    #[test]
    fn no_wrap_keeps_a_single_line() {
        let config = LayoutConfig {
            wrap_style: WrapStyle::NoWrap,
            ..LayoutConfig::default()
        };
        let prepared = prepare(&text("aaa bbb ccc"), 20.0);
        let size = measure(&prepared, 20.0, &config, &FixedMetrics);
        assert_eq!(size, Size::new(110.0, 20.0));
    }

    #[test]
    fn images_wrap_like_words() {
        let mut buffer = text("aaaa");
        buffer.push_image(testing::solid_image(70, 30, [0, 0, 0, 255]), None);
        let prepared = prepare(&buffer, 100.0);
        let layout = shape(&prepared, 100.0, &LayoutConfig::default(), &FixedMetrics);

        assert_eq!(line_texts(&layout), vec![vec![0, 1, 2, 3], vec![4]]);
        // Second line is the image alone: ascent 30, no descent.
        assert_eq!(layout.height(), 20.0 + 30.0);
        assert_eq!(layout.lines()[1].origin.y, 0.0);
    }

    #[test]
    fn line_breaks_apply_paragraph_spacing() {
        let mut buffer = StyledBuffer::new();
        buffer.push_text("ab\ncd", testing::style().with_spacing(3.0, 6.0));
        let prepared = prepare(&buffer, 200.0);
        let config = LayoutConfig::default();

        let layout = shape(&prepared, 200.0, &config, &FixedMetrics);
        assert_eq!(line_texts(&layout), vec![vec![0, 1], vec![3, 4]]);
        // 20 + 3 + 6 for the first line, 20 + 3 for the second.
        assert_eq!(layout.height(), 52.0);
        assert_eq!(layout.lines()[0].origin.y, 52.0 - 16.0);
        assert_eq!(layout.lines()[1].origin.y, 52.0 - 29.0 - 16.0);
    }

    #[test]
    fn blank_lines_keep_their_height() {
        let prepared = prepare(&text("a\n\nb"), 200.0);
        let layout = shape(&prepared, 200.0, &LayoutConfig::default(), &FixedMetrics);
        assert_eq!(layout.line_count(), 3);
        assert!(layout.lines()[1].runs.is_empty());
        assert_eq!(layout.height(), 60.0);
    }

    #[test]
    fn leading_space_of_a_wrapped_line_is_dropped() {
        let config = LayoutConfig {
            wrap_style: WrapStyle::CharWrap,
            ..LayoutConfig::default()
        };
        let prepared = prepare(&text("abc  d"), 30.0);
        let layout = shape(&prepared, 30.0, &config, &FixedMetrics);
        // The first space hangs after "abc"; the second would open a line.
        assert_eq!(line_texts(&layout), vec![vec![0, 1, 2, 3], vec![5]]);
    }

    #[test]
    fn paragraph_indentation_is_kept() {
        let prepared = prepare(&text("  ab\n  cd"), 200.0);
        let layout = shape(&prepared, 200.0, &LayoutConfig::default(), &FixedMetrics);

        assert_eq!(line_texts(&layout), vec![vec![0, 1, 2, 3], vec![5, 6, 7, 8]]);
        assert_eq!(layout.lines()[0].runs[0].glyphs[2].x, 20.0);
        assert_eq!(layout.lines()[1].runs[0].glyphs[2].x, 20.0);
    }

    #[test]
    fn width_is_floored() {
        let prepared = prepare(&text("a"), 0.0);
        let layout = shape(&prepared, 0.0, &LayoutConfig::default(), &FixedMetrics);
        assert_eq!(layout.width(), 10.0);
    }

    #[test]
    fn center_alignment_offsets_line_origins() {
        let config = LayoutConfig {
            horizontal_align: HorizontalAlign::Center,
            ..LayoutConfig::default()
        };
        let prepared = prepare(&text("ab"), 100.0);
        let layout = shape(&prepared, 100.0, &config, &FixedMetrics);
        assert_eq!(layout.lines()[0].origin.x, 40.0);
    }

    #[test]
    fn kerning_moves_following_glyphs() {
        struct Kerned;

        impl FontBackend for Kerned {
            fn line_metrics(&self, font_id: fontdb::ID, font_size: f32) -> Option<LineMetrics> {
                FixedMetrics.line_metrics(font_id, font_size)
            }
            fn glyph_metrics(
                &self,
                font_id: fontdb::ID,
                font_size: f32,
                ch: char,
            ) -> Option<GlyphMetrics> {
                FixedMetrics.glyph_metrics(font_id, font_size, ch)
            }
            fn kerning(&self, _: fontdb::ID, _: f32, left: u16, right: u16) -> f32 {
                if left == 'A' as u16 && right == 'V' as u16 {
                    -2.0
                } else {
                    0.0
                }
            }
            fn raster_metrics(&self, glyph: GlyphId) -> Option<RasterMetrics> {
                FixedMetrics.raster_metrics(glyph)
            }
            fn rasterize(&self, glyph: GlyphId) -> Option<(RasterMetrics, Vec<u8>)> {
                FixedMetrics.rasterize(glyph)
            }
        }

        let prepared = prepare(&text("AVA"), 200.0);
        let layout = shape(&prepared, 200.0, &LayoutConfig::default(), &Kerned);
        let xs: Vec<f32> = layout.lines()[0].runs[0]
            .glyphs
            .iter()
            .map(|glyph| glyph.x)
            .collect();
        assert_eq!(xs, vec![0.0, 8.0, 18.0]);
    }

    #[test]
    fn missing_fonts_skip_text_but_keep_images() {
        struct NoFonts;

        impl FontBackend for NoFonts {
            fn line_metrics(&self, _: fontdb::ID, _: f32) -> Option<LineMetrics> {
                None
            }
            fn glyph_metrics(&self, _: fontdb::ID, _: f32, _: char) -> Option<GlyphMetrics> {
                None
            }
            fn raster_metrics(&self, _: GlyphId) -> Option<RasterMetrics> {
                None
            }
            fn rasterize(&self, _: GlyphId) -> Option<(RasterMetrics, Vec<u8>)> {
                None
            }
        }

        let mut buffer = text("lost");
        buffer.push_image(testing::solid_image(20, 20, [0, 0, 0, 255]), None);
        let prepared = prepare(&buffer, 200.0);
        let layout = shape(&prepared, 200.0, &LayoutConfig::default(), &NoFonts);

        assert_eq!(line_texts(&layout), vec![vec![4]]);
        assert_eq!(layout.height(), 20.0);
    }

    #[test]
    fn missing_fonts_still_break_lines() {
        struct NoFonts;

        impl FontBackend for NoFonts {
            fn line_metrics(&self, _: fontdb::ID, _: f32) -> Option<LineMetrics> {
                None
            }
            fn glyph_metrics(&self, _: fontdb::ID, _: f32, _: char) -> Option<GlyphMetrics> {
                None
            }
            fn raster_metrics(&self, _: GlyphId) -> Option<RasterMetrics> {
                None
            }
            fn rasterize(&self, _: GlyphId) -> Option<(RasterMetrics, Vec<u8>)> {
                None
            }
        }

        let mut buffer = StyledBuffer::new();
        buffer.push_image(testing::solid_image(10, 10, [0, 0, 0, 255]), None);
        buffer.push_text("x\ny", testing::style());
        buffer.push_image(testing::solid_image(10, 10, [0, 0, 0, 255]), None);
        let prepared = prepare(&buffer, 200.0);
        let layout = shape(&prepared, 200.0, &LayoutConfig::default(), &NoFonts);

        assert_eq!(line_texts(&layout), vec![vec![0], vec![4]]);
        assert_eq!(layout.height(), 20.0);
    }
}
