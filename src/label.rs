use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use crate::{
    error::LabelError,
    font_system::FontBackend,
    pipeline::{Computed, ContentAppender, Pipeline},
    render_state::RenderState,
    renderer::{Canvas, CpuRenderer, GlyphCache},
    text::{Color, LayoutConfig, Size, StyledBuffer},
};

/// Configuration for a [`RichLabel`].
#[derive(Clone, Debug)]
pub struct LabelConfig {
    pub layout: LayoutConfig,
    /// Images are clamped to the layout width minus this margin.
    pub image_margin: f32,
    /// Width changes at or below this are ignored by [`RichLabel::resize`].
    pub resize_epsilon: f32,
    pub background: Color,
    /// `(block_size, capacity)` buckets of the glyph cache. Entries with a
    /// zero value are skipped.
    pub glyph_cache: Vec<(usize, usize)>,
    /// Name of the layout worker thread.
    pub worker_name: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            image_margin: 30.0,
            resize_epsilon: 0.1,
            background: Color::TRANSPARENT,
            glyph_cache: vec![(32 * 32, 1024), (64 * 64, 512), (128 * 128, 128)],
            worker_name: "inkline-layout".to_string(),
        }
    }
}

/// A rich-text label with inline images.
///
/// The label lives on the presentation thread. Content appended through
/// [`RichLabel::append_content`] or a [`ContentAppender`] is laid out on a
/// worker thread, one snapshot at a time, and becomes visible once
/// [`RichLabel::pump`] publishes it. [`RichLabel::set_content`],
/// [`RichLabel::clear`] and [`RichLabel::resize`] take effect immediately.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use inkline::{FontSystem, LabelConfig, RichLabel, text::{StyledBuffer, TextStyle}};
///
/// let fonts = Arc::new(FontSystem::new());
/// fonts.load_system_fonts();
/// let font_id = fonts.first_face().unwrap();
///
/// let mut label = RichLabel::new(fonts, LabelConfig::default()).unwrap();
/// label.resize(320.0);
///
/// let mut content = StyledBuffer::new();
/// content.push_text("Hello", TextStyle::new(font_id, 14.0));
/// label.append_content(content, |size| println!("now {size:?}"));
/// ```
pub struct RichLabel {
    config: Arc<LabelConfig>,
    backend: Arc<dyn FontBackend>,
    pipeline: Pipeline,
    state: Arc<RenderState>,
    width: f32,
    renderer: CpuRenderer,
}

impl RichLabel {
    /// Creates an empty label and starts its layout worker.
    pub fn new(backend: Arc<dyn FontBackend>, config: LabelConfig) -> Result<Self, LabelError> {
        let buckets: Vec<(NonZeroUsize, NonZeroUsize)> = config
            .glyph_cache
            .iter()
            .filter_map(|&(block_size, capacity)| {
                NonZeroUsize::new(block_size).zip(NonZeroUsize::new(capacity))
            })
            .collect();
        let renderer = CpuRenderer::new(GlyphCache::new(&buckets));

        let config = Arc::new(config);
        let width = config.layout.min_width;
        let pipeline = Pipeline::spawn(config.clone(), backend.clone(), width)?;

        Ok(Self {
            config,
            backend,
            pipeline,
            state: Arc::new(RenderState::empty()),
            width,
            renderer,
        })
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    /// Replaces the content synchronously.
    ///
    /// Requests still in the pipeline are unaffected and will be published
    /// after this content.
    pub fn set_content(&mut self, buffer: StyledBuffer) {
        self.state = Arc::new(RenderState::compute(
            buffer,
            self.width,
            &self.config,
            self.backend.as_ref(),
        ));
    }

    /// Lays out `buffer` in the background.
    ///
    /// `buffer` is the whole content, not a delta. `on_complete` receives the
    /// new content size from [`RichLabel::pump`] once the snapshot has been
    /// published. Snapshots are published in the order they were appended.
    pub fn append_content(
        &self,
        buffer: StyledBuffer,
        on_complete: impl FnOnce(Size) + Send + 'static,
    ) {
        self.pipeline.submit(buffer, Box::new(on_complete));
    }

    /// A handle for appending from other threads.
    pub fn appender(&self) -> ContentAppender {
        self.pipeline.appender()
    }

    /// Resets to empty content.
    ///
    /// Pending appends are not cancelled.
    pub fn clear(&mut self) {
        self.state = Arc::new(RenderState::empty());
    }

    /// Size of the last published content; `(0, 0)` when empty.
    pub fn current_content_size(&self) -> Size {
        self.state.size()
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Re-lays out the current content when the width changed by more than
    /// the configured epsilon. Returns whether a re-layout happened.
    pub fn resize(&mut self, width: f32) -> bool {
        if (width - self.width).abs() <= self.config.resize_epsilon {
            return false;
        }

        log::debug!("Resizing label from {} to {}.", self.width, width);
        self.width = width;
        self.pipeline.set_width(width);
        self.state = Arc::new(RenderState::compute(
            self.state.buffer().clone(),
            width,
            &self.config,
            self.backend.as_ref(),
        ));
        true
    }

    /// The currently published state.
    pub fn render_state(&self) -> Arc<RenderState> {
        self.state.clone()
    }

    /// Publishes every computation that has finished, without blocking.
    ///
    /// Returns how many states were published.
    pub fn pump(&mut self) -> Result<usize, LabelError> {
        let mut published = 0;
        while let Some(computed) = self.pipeline.try_recv()? {
            self.publish(computed);
            published += 1;
        }
        Ok(published)
    }

    /// Like [`RichLabel::pump`], but waits up to `timeout` for the first
    /// result when none is ready.
    pub fn pump_timeout(&mut self, timeout: Duration) -> Result<usize, LabelError> {
        match self.pipeline.recv_timeout(timeout)? {
            Some(computed) => {
                self.publish(computed);
                Ok(1 + self.pump()?)
            }
            None => Ok(0),
        }
    }

    /// `true` when nothing is computing and nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.pipeline.is_idle()
    }

    fn publish(&mut self, computed: Computed) {
        let Computed { state, completion } = computed;

        // Resized while the worker was busy.
        let state = if (state.width() - self.width).abs() > self.config.resize_epsilon {
            log::debug!(
                "Result computed at width {} is stale; re-laying out at {}.",
                state.width(),
                self.width
            );
            RenderState::compute(
                state.buffer().clone(),
                self.width,
                &self.config,
                self.backend.as_ref(),
            )
        } else {
            state
        };

        self.state = Arc::new(state);
        completion(self.state.size());
        self.pipeline.finish();
    }

    /// Draws the published state into `canvas`.
    pub fn draw(&mut self, canvas: &mut Canvas) {
        if self.state.layout().is_none() && !self.pipeline.is_idle() {
            log::warn!("Drawing before any content has been published.");
        }
        self.renderer.render(
            &self.state,
            canvas,
            self.config.background,
            self.backend.as_ref(),
        );
    }
}
