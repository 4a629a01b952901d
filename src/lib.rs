//! # Inkline
//!
//! A rich-text label engine with inline images, built for content that grows
//! many times per second (chat transcripts, streamed model output, logs).
//!
//! ## Overview
//!
//! Content is a [`StyledBuffer`](text::StyledBuffer): styled text segments
//! interleaved with images. Each content snapshot goes through the same
//! steps:
//!
//! 1. every image is replaced by a single sentinel glyph sized for the
//!    current width ([`text::PreparedBuffer`]),
//! 2. the prepared buffer is measured and shaped into an immutable
//!    [`ShapedLayout`](text::ShapedLayout),
//! 3. the screen rectangle of every image is extracted from the layout
//!    ([`text::extract_placements`]).
//!
//! [`RichLabel`] runs these steps on a background worker, one snapshot at a
//! time, and publishes the results in append order on the presentation
//! thread. Drawing is done on the CPU into a [`Canvas`](renderer::Canvas).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use inkline::{FontSystem, LabelConfig, RichLabel, renderer::Canvas, text::{StyledBuffer, TextStyle}};
//!
//! // 1. Load fonts
//! let fonts = Arc::new(FontSystem::new());
//! fonts.load_system_fonts();
//! let font_id = fonts.first_face().unwrap();
//!
//! // 2. Create a label and give it a width
//! let mut label = RichLabel::new(fonts, LabelConfig::default()).unwrap();
//! label.resize(320.0);
//!
//! // 3. Append content snapshots, from any thread
//! let mut content = StyledBuffer::new();
//! content.push_text("Hello, world", TextStyle::new(font_id, 14.0));
//! label.appender().append_content(content, |size| println!("content is now {size:?}"));
//!
//! // 4. Publish results and draw on the presentation thread
//! label.pump_timeout(Duration::from_millis(100)).unwrap();
//! let mut canvas = Canvas::for_size(label.current_content_size());
//! label.draw(&mut canvas);
//! ```

pub mod error;
pub mod font_storage;
pub mod font_system;
pub mod label;
pub mod pipeline;
pub mod render_state;
pub mod renderer;
pub mod text;

#[cfg(test)]
mod testing;

// common re-exports
pub use error::LabelError;
pub use font_storage::FontStorage;
pub use font_system::{FontBackend, FontSystem};
pub use label::{LabelConfig, RichLabel};
pub use pipeline::ContentAppender;
pub use render_state::RenderState;

// re-export dependencies
pub use fontdb;
pub use fontdue;
pub use image;
pub use parking_lot;
